//! Fixed-interval status poller for generation jobs.
//!
//! State machine: `submitted → pending ⇄ (poll) → {complete, failed,
//! timeout}`. Each tick issues one status request; polling is bounded by an
//! overall wall-clock timeout. Cancellation is cooperative through a shared
//! token: an abandoned poll simply stops scheduling further ticks, and an
//! in-flight request's response is dropped at the `select!`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{AiviError, Result};

use super::models::{GenerationOutcome, GenerationState, StatusEnvelope};
use super::progress::ProgressHandle;

/// Default interval between status requests.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Default overall wall-clock timeout for one generation job.
pub const DEFAULT_MAX_POLL_DURATION: Duration = Duration::from_secs(15 * 60);

/// Source of generation status responses.
///
/// Implemented by [`crate::api::BackendClient`]; tests substitute scripted
/// sources.
#[async_trait]
pub trait BeatStatusSource: Send + Sync {
    /// Base URL of the backend, used to join relative audio locators.
    fn base_url(&self) -> &str;

    /// Issue one status request for a job id.
    async fn beat_status(&self, request_id: &str) -> Result<StatusEnvelope>;
}

/// Timing knobs for the poll loop.
#[derive(Debug, Clone)]
pub struct PollerSettings {
    /// Interval between status requests.
    pub poll_interval: Duration,
    /// Overall wall-clock budget before giving up.
    pub max_duration: Duration,
}

impl Default for PollerSettings {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_duration: DEFAULT_MAX_POLL_DURATION,
        }
    }
}

/// Polls a generation job until a terminal outcome.
pub struct GenerationPoller {
    source: Arc<dyn BeatStatusSource>,
    settings: PollerSettings,
}

impl GenerationPoller {
    pub fn new(source: Arc<dyn BeatStatusSource>, settings: PollerSettings) -> Self {
        Self { source, settings }
    }

    /// Poll until the job completes, fails, times out, or is cancelled.
    ///
    /// A terminal status terminates the loop immediately: no further tick is
    /// scheduled after `complete` or `failed`. A transport or server error on
    /// a status request also terminates the loop. A well-formed `complete`
    /// without any audio locator is a server error.
    ///
    /// # Arguments
    /// * `request_id` - Server-issued job id
    /// * `cancel` - Shared cancellation token
    /// * `progress` - Cosmetic indicator, bumped to 100% only on completion
    pub async fn run(
        &self,
        request_id: &str,
        cancel: &CancellationToken,
        progress: &ProgressHandle,
    ) -> Result<GenerationOutcome> {
        let started = Instant::now();

        loop {
            if cancel.is_cancelled() {
                debug!("polling stopped, generation no longer active");
                return Ok(GenerationOutcome::Cancelled);
            }

            if started.elapsed() > self.settings.max_duration {
                warn!(request_id, "generation polling window elapsed");
                return Ok(GenerationOutcome::TimedOut);
            }

            debug!(request_id, "polling generation status");
            let envelope = tokio::select! {
                result = self.source.beat_status(request_id) => result?,
                _ = cancel.cancelled() => return Ok(GenerationOutcome::Cancelled),
            };

            if let Some(outcome) = self.classify(request_id, &envelope)? {
                if matches!(outcome, GenerationOutcome::Complete { .. }) {
                    progress.mark_complete();
                }
                return Ok(outcome);
            }

            tokio::select! {
                _ = tokio::time::sleep(self.settings.poll_interval) => {}
                _ = cancel.cancelled() => return Ok(GenerationOutcome::Cancelled),
            }
        }
    }

    /// Classify one envelope. `None` means keep polling.
    fn classify(
        &self,
        request_id: &str,
        envelope: &StatusEnvelope,
    ) -> Result<Option<GenerationOutcome>> {
        if !envelope.success {
            return Ok(None);
        }
        let Some(status) = &envelope.status else {
            return Ok(None);
        };

        match status.status {
            Some(GenerationState::Complete) => {
                match status.resolve_audio_url(self.source.base_url()) {
                    Some(audio_url) => {
                        debug!(request_id, %audio_url, "generation complete");
                        Ok(Some(GenerationOutcome::Complete { audio_url }))
                    }
                    None => {
                        warn!(request_id, "complete status carried no audio locator");
                        Err(AiviError::Server(
                            "audio URL not found in response".to_string(),
                        ))
                    }
                }
            }
            Some(GenerationState::Failed) => Ok(Some(GenerationOutcome::Failed)),
            _ => Ok(None),
        }
    }
}
