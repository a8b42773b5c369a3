//! Beat generation: job submission models, the status poll loop, and the
//! cosmetic progress indicator.

mod models;
mod poller;
mod progress;

pub use models::{
    BeatStatus, BeatSubmission, GenerationOutcome, GenerationState, StatusData, StatusDataEntry,
    StatusEnvelope,
};
pub use poller::{
    BeatStatusSource, GenerationPoller, PollerSettings, DEFAULT_MAX_POLL_DURATION,
    DEFAULT_POLL_INTERVAL,
};
pub use progress::{spawn_ticker, ProgressHandle, ProgressSnapshot, GENERATION_MESSAGES};
