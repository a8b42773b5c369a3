//! Backend API surface: the HTTP client and its wire models.

mod client;
pub mod models;

pub use client::{BackendClient, RegisterResult};
pub use models::{
    MoodAnalysis, NewSavedSong, ProfileUpdate, Recommendation, RecommendationBundle,
    RecommendationSet, RegisterOutcome, SavedSong, Token, User, UserProfile, VideoSearchResponse,
    VideoSearchResult,
};
