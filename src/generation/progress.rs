//! Cosmetic progress indicator for beat generation.
//!
//! Purely presentational and decoupled from real progress: a 1-second ticker
//! advances a percentage by one point per tick, capped at 90 until the job
//! actually completes, and rotates through a fixed list of status messages.
//! The indicator never shows 100% before a terminal complete.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Rotating status messages shown while a beat is being generated.
pub const GENERATION_MESSAGES: [&str; 8] = [
    "Starting work on your song...",
    "Analyzing your mood...",
    "Composing the melody...",
    "Laying down the rhythm...",
    "Tuning the instruments...",
    "Mixing the sound...",
    "Almost there...",
    "Final touches...",
];

/// Percentage ceiling while the job is still running.
const PROGRESS_CAP: u8 = 90;

/// Ticks between message rotations.
const TICKS_PER_MESSAGE: u64 = 8;

/// The mutable indicator state. Pure state machine, driven by [`ProgressHandle`].
#[derive(Debug)]
struct ProgressState {
    percent: u8,
    message_index: usize,
    ticks: u64,
    complete: bool,
}

impl ProgressState {
    fn new() -> Self {
        Self {
            percent: 0,
            message_index: 0,
            ticks: 0,
            complete: false,
        }
    }

    /// Advance one cosmetic tick. No-op once complete.
    fn tick(&mut self) {
        if self.complete {
            return;
        }
        self.ticks += 1;
        if self.percent < PROGRESS_CAP {
            self.percent += 1;
        }
        if self.ticks % TICKS_PER_MESSAGE == 0 && self.message_index < GENERATION_MESSAGES.len() - 1
        {
            self.message_index += 1;
        }
    }

    fn mark_complete(&mut self) {
        self.complete = true;
        self.percent = 100;
    }
}

/// A point-in-time view of the indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub percent: u8,
    pub message: &'static str,
    pub complete: bool,
}

/// Shared handle to the indicator, cloneable across the poll loop, the
/// ticker task, and whatever renders it.
#[derive(Clone)]
pub struct ProgressHandle {
    inner: Arc<Mutex<ProgressState>>,
}

impl Default for ProgressHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressHandle {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(ProgressState::new())),
        }
    }

    /// Advance one cosmetic tick.
    pub fn tick(&self) {
        self.inner.lock().unwrap().tick();
    }

    /// Jump to 100% after a terminal complete status.
    pub fn mark_complete(&self) {
        self.inner.lock().unwrap().mark_complete();
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        let state = self.inner.lock().unwrap();
        ProgressSnapshot {
            percent: state.percent,
            message: GENERATION_MESSAGES[state.message_index],
            complete: state.complete,
        }
    }
}

/// Spawn the 1-second ticker task.
///
/// Stops when the token is cancelled or the indicator is marked complete.
///
/// # Arguments
/// * `handle` - Shared indicator handle
/// * `cancel` - Token shared with the poll loop
/// * `period` - Tick period (1 second in production, shorter in tests)
pub fn spawn_ticker(
    handle: ProgressHandle,
    cancel: CancellationToken,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        // Skip the immediate first tick, wait for the first period
        interval.tick().await;
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    handle.tick();
                    if handle.snapshot().complete {
                        break;
                    }
                }
                _ = cancel.cancelled() => break,
            }
        }
    })
}
