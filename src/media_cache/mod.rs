//! Cache-first audio loading backed by a local SQLite blob store.

mod loader;
mod store;

pub use loader::{CacheFirstLoader, LoadedMedia, MediaSource};
pub use store::{CacheStats, CachedMedia, MediaCacheStore, SqliteMediaCacheStore};
