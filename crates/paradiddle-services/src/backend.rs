//! Audio backend capability surface consumed by the scheduler

use paradiddle_core::{InstrumentId, Velocity};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum BackendError {
    #[error("no audio output devices found")]
    NoDevices,
    #[error("failed to get default output config: {0}")]
    Config(String),
    #[error("failed to build output stream: {0}")]
    Stream(String),
    #[error("audio backend worker terminated")]
    WorkerGone,
}

/// Sample-accurate trigger sink plus the monotonic clock all scheduling
/// decisions are made against. The clock belongs to the backend, not the
/// poll timer, so timer jitter never reaches playback timing.
pub trait AudioBackend: Send + Sync {
    /// Block until the output stream is live. `play()` awaits this before
    /// scheduling anything; repeated calls are cheap once running.
    fn ensure_running(&self) -> Result<(), BackendError>;

    /// Current time on the backend's clock, in seconds
    fn now(&self) -> f64;

    /// Start the instrument's sample at exactly `when` (backend clock
    /// seconds). An instrument with no loaded sample is skipped, never an
    /// error.
    fn trigger_sample(&self, instrument: InstrumentId, when: f64, velocity: Velocity);
}
