//! Session orchestration: the analyze / recommend / generate / favorites
//! workflow, with its working state persisted between invocations.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::{
    BackendClient, MoodAnalysis, NewSavedSong, Recommendation, RecommendationBundle, SavedSong,
    Token, UserProfile,
};
use crate::error::{AiviError, Result};
use crate::generation::{
    GenerationOutcome, GenerationPoller, PollerSettings, ProgressHandle, spawn_ticker,
};
use crate::state::{KEY_SESSION, KEY_STUDIO, StateStore};

/// Stand-in video ids used when the search proxy returns nothing usable.
const FALLBACK_VIDEO_IDS: [&str; 3] = ["dQw4w9WgXcQ", "fJ9rUzIMcZQ", "kJQP7kiw5Fk"];

/// Working state of a discovery session, persisted across invocations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StudioState {
    pub mood_analysis: Option<MoodAnalysis>,
    pub recommendations: Option<RecommendationBundle>,
    /// Resolved video ids, keyed by "{track}-{artist}".
    #[serde(default)]
    pub video_ids: HashMap<String, String>,
    pub generated_beat_url: Option<String>,
}

/// Cache key for a recommendation's resolved video id.
pub fn recommendation_key(recommendation: &Recommendation) -> String {
    format!("{}-{}", recommendation.name, recommendation.artist)
}

/// Deterministic fallback id for a recommendation the proxy could not resolve.
///
/// Hashes the track name and artist name concatenated back to back with the
/// classic djb2-style rolling hash over wrapping i32 arithmetic and indexes
/// into [`FALLBACK_VIDEO_IDS`], so the same song always lands on the same
/// stand-in.
fn fallback_video_id(track: &str, artist: &str) -> &'static str {
    let seed = format!("{}{}", track, artist);
    let mut hash: i32 = 0;
    for c in seed.chars() {
        hash = hash.wrapping_shl(5).wrapping_sub(hash).wrapping_add(c as i32);
    }
    let index = (hash.unsigned_abs() as usize) % FALLBACK_VIDEO_IDS.len();
    FALLBACK_VIDEO_IDS[index]
}

/// Orchestrates the backend client, persisted state, and generation pipeline.
pub struct StudioSession {
    client: BackendClient,
    store: Arc<dyn StateStore>,
    language: String,
    poller_settings: PollerSettings,
}

impl StudioSession {
    pub fn new(
        client: BackendClient,
        store: Arc<dyn StateStore>,
        language: String,
        poller_settings: PollerSettings,
    ) -> Self {
        Self {
            client,
            store,
            language,
            poller_settings,
        }
    }

    pub fn client(&self) -> &BackendClient {
        &self.client
    }

    // =========================================================================
    // Session
    // =========================================================================

    /// The persisted session token, if any.
    pub fn session(&self) -> Result<Option<Token>> {
        Ok(self.store.get_json(KEY_SESSION)?)
    }

    /// Sign in and persist the session.
    pub async fn login(&self, email: &str, password: &str) -> Result<Token> {
        let token = self.client.login(email, password).await?;
        self.store.put_json(KEY_SESSION, &token)?;
        info!(username = %token.user.username, "signed in");
        Ok(token)
    }

    /// Store a session obtained out of band (register, verify-email).
    pub fn store_session(&self, token: &Token) -> Result<()> {
        Ok(self.store.put_json(KEY_SESSION, token)?)
    }

    /// Drop the persisted session.
    pub fn logout(&self) -> Result<()> {
        self.store.remove(KEY_SESSION)?;
        Ok(())
    }

    /// Bearer token of the persisted session, or [`AiviError::AuthRequired`].
    fn access_token(&self) -> Result<String> {
        match self.session()? {
            Some(token) => Ok(token.access_token),
            None => Err(AiviError::AuthRequired),
        }
    }

    /// Fetch the signed-in profile. A rejected token drops the session.
    pub async fn profile(&self) -> Result<UserProfile> {
        let token = self.access_token()?;
        match self.client.profile(&token).await {
            Err(AiviError::AuthRequired) => {
                warn!("session rejected by backend, signing out");
                self.store.remove(KEY_SESSION)?;
                Err(AiviError::AuthRequired)
            }
            other => other,
        }
    }

    // =========================================================================
    // Studio state
    // =========================================================================

    pub fn state(&self) -> Result<StudioState> {
        Ok(self.store.get_json(KEY_STUDIO)?.unwrap_or_default())
    }

    fn save_state(&self, state: &StudioState) -> Result<()> {
        Ok(self.store.put_json(KEY_STUDIO, state)?)
    }

    /// Clear the session's working state, keeping the login.
    pub fn reset(&self) -> Result<()> {
        self.store.remove(KEY_STUDIO)?;
        Ok(())
    }

    // =========================================================================
    // Analysis & Recommendations
    // =========================================================================

    /// Upload a media file for mood analysis.
    ///
    /// Free accounts with no analyses left today are rejected locally before
    /// any upload happens.
    pub async fn analyze(&self, path: &Path) -> Result<MoodAnalysis> {
        let profile = self.profile().await?;
        if !profile.can_analyze() {
            return Err(AiviError::AnalysisLimitReached);
        }

        let token = self.access_token()?;
        let analysis = self.client.analyze_media(&token, path, &self.language).await?;
        info!(mood = %analysis.mood, "media analyzed");

        // A fresh analysis invalidates the rest of the session's results.
        let state = StudioState {
            mood_analysis: Some(analysis.clone()),
            ..StudioState::default()
        };
        self.save_state(&state)?;
        Ok(analysis)
    }

    /// Fetch recommendations for the stored analysis and persist them.
    pub async fn recommendations(&self) -> Result<RecommendationBundle> {
        let mut state = self.state()?;
        let analysis = state
            .mood_analysis
            .clone()
            .ok_or_else(|| AiviError::Server("no analysis yet, run analyze first".to_string()))?;

        let token = self.access_token()?;
        let bundle = self
            .client
            .get_recommendations(&token, &analysis, &self.language)
            .await?;
        state.recommendations = Some(bundle.clone());
        self.save_state(&state)?;
        Ok(bundle)
    }

    // =========================================================================
    // Beat generation
    // =========================================================================

    /// Generate a beat for the stored analysis.
    ///
    /// Submits the job, then polls until it completes, fails, times out, or
    /// `cancel` fires. `progress` is advanced by a cosmetic ticker for the
    /// duration of the poll.
    pub async fn generate_beat(
        &self,
        cancel: &CancellationToken,
        progress: &ProgressHandle,
    ) -> Result<String> {
        let mut state = self.state()?;
        let analysis = state
            .mood_analysis
            .clone()
            .ok_or_else(|| AiviError::Server("no analysis yet, run analyze first".to_string()))?;

        let prompt = analysis.generation_prompt();
        debug!(%prompt, "submitting generation job");
        let submission = self.client.generate_beat(&prompt, &analysis).await?;

        if submission.success == Some(false) {
            let message = submission
                .message
                .or(submission.error)
                .unwrap_or_else(|| "beat generation failed".to_string());
            return Err(AiviError::Server(message));
        }

        let audio_url = if let Some(url) = submission.audio_url {
            // Some backends answer synchronously, with a locator relative
            // to their base URL.
            progress.mark_complete();
            format!("{}{}", self.client.base_url(), url)
        } else if let Some(request_id) = submission.request_id {
            let ticker_cancel = cancel.child_token();
            let ticker = spawn_ticker(
                progress.clone(),
                ticker_cancel.clone(),
                std::time::Duration::from_secs(1),
            );

            let poller = GenerationPoller::new(
                Arc::new(self.client.clone()),
                self.poller_settings.clone(),
            );
            let outcome = poller.run(&request_id, cancel, progress).await;
            ticker_cancel.cancel();
            let _ = ticker.await;

            match outcome? {
                GenerationOutcome::Complete { audio_url } => audio_url,
                GenerationOutcome::Failed => return Err(AiviError::GenerationFailed),
                GenerationOutcome::TimedOut => return Err(AiviError::GenerationTimedOut),
                GenerationOutcome::Cancelled => {
                    return Err(AiviError::Server("generation cancelled".to_string()));
                }
            }
        } else {
            let message = submission
                .message
                .or(submission.error)
                .unwrap_or_else(|| "beat generation failed".to_string());
            return Err(AiviError::Server(message));
        };

        info!(%audio_url, "beat ready");
        state.generated_beat_url = Some(audio_url.clone());
        self.save_state(&state)?;
        Ok(audio_url)
    }

    // =========================================================================
    // Playback resolution & favorites
    // =========================================================================

    /// Resolve the playable video id for a recommendation.
    ///
    /// Resolved ids are memoized in the session state. A search that yields
    /// nothing usable falls back to a deterministic stand-in id.
    pub async fn video_id_for(&self, recommendation: &Recommendation) -> Result<String> {
        let key = recommendation_key(recommendation);
        let mut state = self.state()?;
        if let Some(id) = state.video_ids.get(&key) {
            return Ok(id.clone());
        }

        let query = format!("{} {}", recommendation.name, recommendation.artist);
        let video_id = match self.client.youtube_search(&query, 1).await {
            Ok(response) => {
                if let Some(error) = response.error {
                    warn!(%error, "search proxy reported an error, using fallback id");
                    fallback_video_id(&recommendation.name, &recommendation.artist).to_string()
                } else {
                    match response.results.into_iter().next() {
                        Some(result) => result.video_id,
                        None => {
                            debug!(%query, "no search results, using fallback id");
                            fallback_video_id(&recommendation.name, &recommendation.artist)
                                .to_string()
                        }
                    }
                }
            }
            Err(e) if e.is_remote() => {
                warn!(error = %e, "search failed, using fallback id");
                fallback_video_id(&recommendation.name, &recommendation.artist).to_string()
            }
            Err(e) => return Err(e),
        };

        state.video_ids.insert(key, video_id.clone());
        self.save_state(&state)?;
        Ok(video_id)
    }

    /// List the user's favorites.
    pub async fn favorites(&self) -> Result<Vec<SavedSong>> {
        let token = self.access_token()?;
        self.client.saved_songs(&token).await
    }

    /// Save a recommendation to favorites.
    ///
    /// Uses the memoized video id when one was resolved; otherwise a
    /// synthetic "search:{track}-{artist}" id keeps the favorite addressable.
    pub async fn like(&self, recommendation: &Recommendation) -> Result<SavedSong> {
        let key = recommendation_key(recommendation);
        let state = self.state()?;
        let video_id = state
            .video_ids
            .get(&key)
            .cloned()
            .unwrap_or_else(|| format!("search:{}", key));

        let token = self.access_token()?;
        let song = NewSavedSong {
            youtube_video_id: video_id,
            title: recommendation.name.clone(),
            artist: Some(recommendation.artist.clone()),
        };
        self.client.add_saved_song(&token, &song).await
    }

    /// Remove a favorite by its video id.
    pub async fn unlike(&self, youtube_video_id: &str) -> Result<()> {
        let token = self.access_token()?;
        self.client.remove_saved_song(&token, youtube_video_id).await
    }
}
