//! paradiddle-services: Playback scheduler and audio output service layer

pub mod backend;
pub mod clock;
pub mod output;
pub mod samples;
pub mod scheduler;

pub use backend::{AudioBackend, BackendError};
pub use clock::{ThreadTicker, Ticker};
pub use output::CpalBackend;
pub use samples::{SampleBank, SampleError};
pub use scheduler::{
    PlaybackScheduler, SchedulerConfig, SchedulerError, SnapshotFn, TransportState,
};
