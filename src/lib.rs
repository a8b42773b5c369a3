//! Aivi Studio Library
//!
//! This library exposes the internal modules for testing and potential reuse.

pub mod api;
pub mod config;
pub mod error;
pub mod generation;
pub mod media_cache;
pub mod sqlite_persistence;
pub mod state;
pub mod studio;

// Re-export commonly used types for convenience
pub use api::{BackendClient, RegisterResult};
pub use error::{AiviError, Result};
pub use media_cache::{CacheFirstLoader, MediaCacheStore, SqliteMediaCacheStore};
pub use state::{SqliteStateStore, StateStore};
pub use studio::{StudioSession, StudioState};
