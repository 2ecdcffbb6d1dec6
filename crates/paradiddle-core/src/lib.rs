//! paradiddle-core: Domain types for the paradiddle drum transcriber

pub mod beam;
mod error;
mod grid;
mod instrument;
mod meter;
pub mod notation;
mod remap;
mod score;

pub use beam::{group_beams, BeamGroup};
pub use error::{GridError, Result};
pub use grid::{Grid, GridSnapshot, Velocity, VELOCITY_CYCLE};
pub use instrument::{Instrument, InstrumentId, CATALOG};
pub use meter::{Resolution, TimeSignature};
pub use notation::{transcribe, MergeOptions, NotationEvent, NoteValue, StemDirection};
pub use remap::remap_grid;
pub use score::{render_score, BarRender, Score};
