//! Cache-first media loading.
//!
//! Contract: given a resource URL, return playable bytes. The local store is
//! consulted first; on a miss the blob is fetched over HTTP, validated (a
//! JSON payload disguised as a blob is an error message, not media), stored
//! under the same key, and returned. No retry and no concurrent-request
//! de-duplication: two callers racing on the same key both fetch.

use std::sync::Arc;

use reqwest::header::CONTENT_TYPE;
use tracing::{debug, warn};

use crate::error::{AiviError, Result};

use super::store::MediaCacheStore;

/// Where a loaded blob came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaSource {
    Cache,
    Network,
}

/// A playable blob plus enough metadata to name a file for it.
#[derive(Debug, Clone)]
pub struct LoadedMedia {
    pub data: Vec<u8>,
    pub content_type: Option<String>,
    pub source: MediaSource,
}

impl LoadedMedia {
    /// File extension for the blob, derived from its content type.
    pub fn extension(&self) -> &'static str {
        match self.content_type.as_deref() {
            Some("audio/mp4") => "m4a",
            Some("audio/webm") => "webm",
            Some("audio/ogg") => "opus",
            Some("audio/mpeg") => "mp3",
            Some("audio/flac") | Some("audio/x-flac") => "flac",
            Some("audio/wav") | Some("audio/x-wav") => "wav",
            _ => "bin",
        }
    }
}

/// Cache-first loader over a [`MediaCacheStore`].
pub struct CacheFirstLoader {
    store: Arc<dyn MediaCacheStore>,
    http: reqwest::Client,
}

impl CacheFirstLoader {
    pub fn new(store: Arc<dyn MediaCacheStore>, http: reqwest::Client) -> Self {
        Self { store, http }
    }

    /// Load a resource, preferring the local copy.
    ///
    /// A cached non-empty blob is returned without any network I/O. On a
    /// miss, the blob is fetched, stored best-effort (a store failure is
    /// logged and the fetched bytes are still returned), and handed back.
    pub async fn load(&self, url: &str) -> Result<LoadedMedia> {
        if let Some(hit) = self.store.get(url)? {
            if !hit.data.is_empty() {
                debug!(key = url, size = hit.data.len(), "media cache hit");
                return Ok(LoadedMedia {
                    data: hit.data,
                    content_type: hit.content_type,
                    source: MediaSource::Cache,
                });
            }
        }

        debug!(key = url, "media cache miss, fetching");
        let response = self.http.get(url).send().await?;

        if !response.status().is_success() {
            if let Ok(value) = response.json::<serde_json::Value>().await {
                if let Some(message) = value.get("error").and_then(|v| v.as_str()) {
                    return Err(AiviError::Server(message.to_string()));
                }
            }
            return Err(AiviError::Server("network error".to_string()));
        }

        let header_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let data = response.bytes().await?.to_vec();

        // An error payload disguised as a blob.
        if header_type
            .as_deref()
            .is_some_and(|ct| ct.starts_with("application/json"))
        {
            let message = serde_json::from_slice::<serde_json::Value>(&data)
                .ok()
                .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(String::from))
                .unwrap_or_else(|| "failed to load audio".to_string());
            return Err(AiviError::Server(message));
        }

        // Sniff the type when the server did not say.
        let content_type =
            header_type.or_else(|| infer::get(&data).map(|kind| kind.mime_type().to_string()));

        if let Err(e) = self.store.put(url, content_type.as_deref(), &data) {
            warn!(key = url, "failed to cache fetched media: {}", e);
        }

        Ok(LoadedMedia {
            data,
            content_type,
            source: MediaSource::Network,
        })
    }
}
