//! HTTP client for the Aivi backend service.
//!
//! Every remote surface the client consumes lives here: account flows, media
//! analysis, recommendations, beat generation, saved songs, and the YouTube
//! search/audio proxy. The backend reports failures as `{"detail": …}` (or
//! `{"error": …}` on the recommend routes); messages are passed through
//! verbatim, a 401 maps to [`AiviError::AuthRequired`].

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Response, StatusCode};
use serde_json::json;
use tracing::debug;

use crate::error::{AiviError, Result};
use crate::generation::{BeatStatusSource, BeatSubmission, StatusEnvelope};

use super::models::*;

/// Outcome of a registration attempt.
#[derive(Debug, Clone)]
pub enum RegisterResult {
    /// Account created; an emailed code must be confirmed before login.
    VerificationRequired(RegisterOutcome),
    /// Backend issued a session immediately.
    LoggedIn(Token),
}

/// Client for the Aivi backend REST API.
#[derive(Clone)]
pub struct BackendClient {
    client: reqwest::Client,
    base_url: String,
}

impl BackendClient {
    /// Create a new backend client.
    ///
    /// # Arguments
    /// * `base_url` - Base URL of the backend (e.g., "http://localhost:8000")
    /// * `timeout_sec` - Request timeout in seconds
    pub fn new(base_url: &str, timeout_sec: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_sec))
            .build()?;

        // Ensure base_url doesn't have a trailing slash
        let base_url = base_url.trim_end_matches('/').to_string();

        Ok(Self { client, base_url })
    }

    /// Base URL of the backend service.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The underlying HTTP client, shared with the media loader.
    pub fn http(&self) -> reqwest::Client {
        self.client.clone()
    }

    // =========================================================================
    // Accounts & Sessions
    // =========================================================================

    /// Register a new account.
    pub async fn register(&self, email: &str, username: &str, password: &str) -> Result<RegisterResult> {
        let url = format!("{}/users/register", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&json!({ "email": email, "username": username, "password": password }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        // A 201 carries a `detail` object when email verification is pending.
        let value: serde_json::Value = response.json().await?;
        if let Some(detail) = value.get("detail") {
            let outcome: RegisterOutcome = serde_json::from_value(detail.clone())
                .map_err(|_| AiviError::Server("unexpected register response".to_string()))?;
            return Ok(RegisterResult::VerificationRequired(outcome));
        }
        let token: Token = serde_json::from_value(value)
            .map_err(|_| AiviError::Server("unexpected register response".to_string()))?;
        Ok(RegisterResult::LoggedIn(token))
    }

    /// Confirm an emailed verification code; returns a session token.
    pub async fn verify_email(&self, email: &str, code: &str) -> Result<Token> {
        let url = format!("{}/users/verify-email", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&json!({ "email": email, "verification_code": code }))
            .send()
            .await?;
        ok_json(response).await
    }

    /// Ask for a fresh verification code.
    pub async fn resend_verification(&self, email: &str) -> Result<()> {
        let url = format!("{}/users/resend-verification", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&json!({ "email": email }))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        Ok(())
    }

    /// Sign in with email and password.
    pub async fn login(&self, email: &str, password: &str) -> Result<Token> {
        let url = format!("{}/users/login", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;
        ok_json(response).await
    }

    /// Fetch the signed-in profile, including today's remaining analyses.
    pub async fn profile(&self, token: &str) -> Result<UserProfile> {
        let url = format!("{}/users/me", self.base_url);
        let response = self.client.get(&url).bearer_auth(token).send().await?;
        ok_json(response).await
    }

    /// Update profile fields.
    pub async fn update_profile(&self, token: &str, update: &ProfileUpdate) -> Result<UserProfile> {
        let url = format!("{}/users/update-profile", self.base_url);
        let response = self
            .client
            .put(&url)
            .bearer_auth(token)
            .json(update)
            .send()
            .await?;
        ok_json(response).await
    }

    // =========================================================================
    // Analysis & Recommendations
    // =========================================================================

    /// Upload a photo/video for mood analysis.
    ///
    /// # Arguments
    /// * `token` - Bearer token
    /// * `path` - Local media file
    /// * `language` - Response language code (e.g., "en")
    pub async fn analyze_media(
        &self,
        token: &str,
        path: &Path,
        language: &str,
    ) -> Result<MoodAnalysis> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| AiviError::Server(format!("could not read {}: {}", path.display(), e)))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());

        let form = Form::new()
            .part("file", Part::bytes(bytes).file_name(file_name))
            .text("language", language.to_string());

        let url = format!("{}/chat/analyze-media", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .multipart(form)
            .send()
            .await?;
        ok_json(response).await
    }

    /// Fetch mood-matched recommendations for an analysis.
    pub async fn get_recommendations(
        &self,
        token: &str,
        analysis: &MoodAnalysis,
        language: &str,
    ) -> Result<RecommendationBundle> {
        // Body is the analysis record with the language appended.
        let mut body = serde_json::to_value(analysis)
            .map_err(|e| AiviError::Server(format!("could not encode analysis: {}", e)))?;
        body["language"] = json!(language);

        let url = format!("{}/chat/get-recommendations", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;
        ok_json(response).await
    }

    // =========================================================================
    // Beat Generation
    // =========================================================================

    /// Submit a generation job.
    pub async fn generate_beat(
        &self,
        prompt: &str,
        analysis: &MoodAnalysis,
    ) -> Result<BeatSubmission> {
        let url = format!("{}/chat/generate-beat", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&json!({ "prompt": prompt, "mood_analysis": analysis }))
            .send()
            .await?;
        ok_json(response).await
    }

    // =========================================================================
    // Saved Songs
    // =========================================================================

    /// List the user's favorites, newest first.
    pub async fn saved_songs(&self, token: &str) -> Result<Vec<SavedSong>> {
        let url = format!("{}/media/saved-songs", self.base_url);
        let response = self.client.get(&url).bearer_auth(token).send().await?;
        ok_json(response).await
    }

    /// Save a song. A duplicate maps to [`AiviError::AlreadySaved`].
    pub async fn add_saved_song(&self, token: &str, song: &NewSavedSong) -> Result<SavedSong> {
        let url = format!("{}/media/saved-songs", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(song)
            .send()
            .await?;
        if response.status() == StatusCode::CONFLICT {
            return Err(AiviError::AlreadySaved);
        }
        ok_json(response).await
    }

    /// Remove a favorite by its video id.
    pub async fn remove_saved_song(&self, token: &str, youtube_video_id: &str) -> Result<()> {
        let url = format!("{}/media/saved-songs/{}", self.base_url, youtube_video_id);
        let response = self.client.delete(&url).bearer_auth(token).send().await?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        Ok(())
    }

    // =========================================================================
    // YouTube proxy
    // =========================================================================

    /// Search the YouTube proxy. A 200 may still carry an `error` field.
    pub async fn youtube_search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<VideoSearchResponse> {
        let url = format!(
            "{}/recommend/youtube-search?q={}&max_results={}",
            self.base_url,
            urlencoding::encode(query),
            max_results
        );
        let response = self.client.get(&url).send().await?;
        ok_json(response).await
    }

    /// URL of the audio proxy for a video id; also the media cache key.
    pub fn youtube_audio_url(&self, video_id: &str) -> String {
        format!(
            "{}/recommend/youtube-audio?video_id={}",
            self.base_url,
            urlencoding::encode(video_id)
        )
    }
}

#[async_trait]
impl BeatStatusSource for BackendClient {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn beat_status(&self, request_id: &str) -> Result<StatusEnvelope> {
        let url = format!("{}/chat/generate-beat/status", self.base_url);
        debug!(request_id, "requesting generation status");
        let response = self
            .client
            .post(&url)
            .json(&json!({ "request_id": request_id }))
            .send()
            .await?;
        ok_json(response).await
    }
}

/// Decode a success body, or map the failure to an [`AiviError`].
async fn ok_json<T: serde::de::DeserializeOwned>(response: Response) -> Result<T> {
    if !response.status().is_success() {
        return Err(error_from_response(response).await);
    }
    Ok(response.json().await?)
}

/// Turn a non-success response into the matching error category.
async fn error_from_response(response: Response) -> AiviError {
    let status = response.status();
    if status == StatusCode::UNAUTHORIZED {
        return AiviError::AuthRequired;
    }
    let message = response
        .json::<serde_json::Value>()
        .await
        .ok()
        .and_then(|value| extract_message(&value))
        .unwrap_or_else(|| format!("server error: HTTP {}", status));
    AiviError::Server(message)
}

/// Pull the human-readable message out of an error body.
///
/// `detail` may be a string or an object with a `message`; the recommend
/// routes use a flat `error` field instead.
fn extract_message(value: &serde_json::Value) -> Option<String> {
    if let Some(detail) = value.get("detail") {
        if let Some(s) = detail.as_str() {
            return Some(s.to_string());
        }
        if let Some(s) = detail.get("message").and_then(|m| m.as_str()) {
            return Some(s.to_string());
        }
    }
    value
        .get("error")
        .and_then(|e| e.as_str())
        .map(String::from)
}
