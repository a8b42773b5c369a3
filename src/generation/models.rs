//! Models for the beat generation endpoints.
//!
//! The status payload is loosely typed on the backend side: the resulting
//! audio locator can appear in one of several alternate fields depending on
//! which stage of the pipeline produced it. Extraction follows a fixed
//! precedence order, first match wins.

use serde::Deserialize;

/// Server-side state of a generation job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationState {
    Pending,
    Complete, // terminal
    Failed,   // terminal
    /// Any status string this client does not know; treated as still pending.
    #[serde(other)]
    Unknown,
}

impl GenerationState {
    /// Returns true if this is a terminal state (Complete or Failed).
    pub fn is_terminal(&self) -> bool {
        matches!(self, GenerationState::Complete | GenerationState::Failed)
    }
}

/// Response to a generation submission.
///
/// Either `request_id` (poll for completion) or `audio_url` (immediate
/// result) is present on success; `message`/`error` carry server text
/// otherwise.
#[derive(Debug, Clone, Deserialize)]
pub struct BeatSubmission {
    #[serde(default)]
    pub success: Option<bool>,
    pub request_id: Option<String>,
    pub audio_url: Option<String>,
    pub message: Option<String>,
    pub error: Option<String>,
}

/// Envelope of the status endpoint.
///
/// An envelope without `success` or without a `status` object does not count
/// as an answer at all; the poll loop keeps going.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatusEnvelope {
    #[serde(default)]
    pub success: bool,
    pub status: Option<BeatStatus>,
}

/// The nested, loosely-typed status payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BeatStatus {
    pub status: Option<GenerationState>,
    pub local_audio_url: Option<String>,
    pub stream_audio_url: Option<String>,
    pub data: Option<StatusData>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatusData {
    #[serde(default)]
    pub data: Vec<StatusDataEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatusDataEntry {
    pub stream_audio_url: Option<String>,
}

impl BeatStatus {
    /// Extract the result audio locator, in fixed precedence order:
    ///
    /// 1. `local_audio_url`, joined to the backend base URL
    /// 2. `data.data[0].stream_audio_url`
    /// 3. `stream_audio_url`
    pub fn resolve_audio_url(&self, base_url: &str) -> Option<String> {
        if let Some(local) = &self.local_audio_url {
            return Some(format!("{}{}", base_url, local));
        }
        if let Some(url) = self
            .data
            .as_ref()
            .and_then(|d| d.data.first())
            .and_then(|entry| entry.stream_audio_url.as_ref())
        {
            return Some(url.clone());
        }
        self.stream_audio_url.clone()
    }
}

/// Terminal outcome of a polled generation job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationOutcome {
    /// The job completed and produced a playable locator.
    Complete { audio_url: String },
    /// The job reported a terminal `failed` status.
    Failed,
    /// No terminal status arrived within the polling window.
    TimedOut,
    /// The caller cancelled before a terminal status arrived.
    Cancelled,
}
