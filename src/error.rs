//! Error categories surfaced to the user.
//!
//! The backend reports errors as plain text (`detail` or `error` fields);
//! they are passed through verbatim. Nothing here carries structured codes.

use thiserror::Error;

/// Errors produced while talking to the Aivi backend or local stores.
#[derive(Debug, Error)]
pub enum AiviError {
    /// Network/connectivity failure reaching the backend.
    #[error("could not reach the Aivi backend: {0}")]
    Network(#[from] reqwest::Error),

    /// The operation requires a signed-in session.
    #[error("authentication required, sign in first")]
    AuthRequired,

    /// Server-reported error, message passed through as-is.
    #[error("{0}")]
    Server(String),

    /// The generation job reported a terminal `failed` status.
    #[error("beat generation failed")]
    GenerationFailed,

    /// No terminal status arrived within the polling window.
    #[error("beat generation timed out")]
    GenerationTimedOut,

    /// The song is already in the user's favorites (HTTP 409).
    #[error("this song is already saved to favorites")]
    AlreadySaved,

    /// Free-tier daily analysis quota is exhausted.
    #[error("daily analysis limit reached, upgrade to PRO for unlimited analyses")]
    AnalysisLimitReached,

    /// Local persistence failure (SQLite stores).
    #[error("local storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl AiviError {
    /// True for errors caused by the remote service rather than this client.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            AiviError::Network(_)
                | AiviError::Server(_)
                | AiviError::GenerationFailed
                | AiviError::GenerationTimedOut
        )
    }
}

pub type Result<T> = std::result::Result<T, AiviError>;
