//! Models for the Aivi backend API responses.
//!
//! These types match the JSON structures returned by the backend service.
//! All of them are consumed read-only; the backend owns their semantics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Mood Analysis
// =============================================================================

/// Result of analyzing an uploaded photo or video.
///
/// The four numeric attributes are normalized to roughly [0, 1].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MoodAnalysis {
    /// Primary mood label (e.g., "melancholic", "euphoric").
    pub mood: String,
    /// Free-text description of the detected mood.
    pub description: String,
    /// Emotion tags.
    #[serde(default)]
    pub emotions: Vec<String>,
    pub energy_level: f64,
    pub valence: f64,
    pub danceability: f64,
    pub tempo: f64,
    /// Suggested genres.
    #[serde(default)]
    pub genres: Vec<String>,
}

impl MoodAnalysis {
    /// Build the generation prompt the way the studio flow does: mood,
    /// description, then the emotion tags separated by spaces.
    pub fn generation_prompt(&self) -> String {
        format!(
            "{} {} {}",
            self.mood,
            self.description,
            self.emotions.join(" ")
        )
        .trim_end()
        .to_string()
    }
}

// =============================================================================
// Recommendations
// =============================================================================

/// A single recommended track.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Recommendation {
    pub name: String,
    pub artist: String,
    /// Why this track fits the analyzed mood.
    pub reason: String,
}

/// One set of recommendations with its explanation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RecommendationSet {
    #[serde(default)]
    pub recommended_tracks: Vec<Recommendation>,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub alternative_genres: Vec<String>,
}

/// Personal and global recommendation sets, returned together.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RecommendationBundle {
    pub personal: RecommendationSet,
    pub global: RecommendationSet,
}

// =============================================================================
// Saved Songs (favorites)
// =============================================================================

/// A song saved to the user's favorites.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SavedSong {
    pub id: i64,
    pub user_id: i64,
    pub youtube_video_id: String,
    pub title: String,
    pub artist: Option<String>,
    pub date_saved: DateTime<Utc>,
}

/// Payload for saving a song.
#[derive(Clone, Debug, Serialize)]
pub struct NewSavedSong {
    pub youtube_video_id: String,
    pub title: String,
    pub artist: Option<String>,
}

// =============================================================================
// Users & Sessions
// =============================================================================

/// Account record embedded in auth responses.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub username: String,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub is_verified: bool,
}

/// Bearer token issued on login or email verification.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    pub token_type: String,
    pub user: User,
}

/// Profile returned by `GET /users/me`.
///
/// `remaining_analyses == -1` means unlimited (PRO accounts).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub account_type: String,
    #[serde(default)]
    pub daily_usage: i64,
    pub remaining_analyses: i64,
    #[serde(default)]
    pub is_verified: bool,
    pub provider: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl UserProfile {
    /// Whether this account may run another media analysis today.
    pub fn can_analyze(&self) -> bool {
        self.account_type == "pro" || self.remaining_analyses > 0
    }
}

/// Fields accepted by `PUT /users/update-profile`.
#[derive(Clone, Debug, Default, Serialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

/// Outcome of `POST /users/register`.
///
/// The backend answers 201 with a `detail` object when the account needs
/// email verification before it can sign in.
#[derive(Clone, Debug, Deserialize)]
pub struct RegisterOutcome {
    #[serde(default)]
    pub requires_verification: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub email: String,
}

// =============================================================================
// Video Search
// =============================================================================

/// One hit from the YouTube search proxy.
#[derive(Clone, Debug, Deserialize)]
pub struct VideoSearchResult {
    pub video_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub channel: String,
    #[serde(default)]
    pub thumbnail: String,
}

/// Envelope of the search proxy; a 200 response may still carry `error`.
#[derive(Clone, Debug, Deserialize)]
pub struct VideoSearchResponse {
    #[serde(default)]
    pub results: Vec<VideoSearchResult>,
    #[serde(default)]
    pub error: Option<String>,
}
