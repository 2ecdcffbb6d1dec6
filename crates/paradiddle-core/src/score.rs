//! Render model assembly for the notation backend
//!
//! The backend receives the whole model at once: per-bar events plus beam
//! membership. It owns clefs, barlines, and layout.

use serde::Serialize;

use crate::beam::{group_beams, BeamGroup};
use crate::grid::Grid;
use crate::meter::{Resolution, TimeSignature};
use crate::notation::{transcribe, MergeOptions, NotationEvent};

/// One bar of the render model
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BarRender {
    pub events: Vec<NotationEvent>,
    pub beams: Vec<BeamGroup>,
}

/// The full notation render model for the current grid
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Score {
    pub signature: TimeSignature,
    pub resolution: Resolution,
    pub bars: Vec<BarRender>,
}

/// Transcribe every bar and attach its beam groups
pub fn render_score(
    grid: &Grid,
    resolution: Resolution,
    bars: usize,
    signature: TimeSignature,
    merge: MergeOptions,
) -> Score {
    let bars = transcribe(grid, resolution, bars, signature, merge)
        .into_iter()
        .map(|events| {
            let beams = group_beams(&events, signature, resolution);
            BarRender { events, beams }
        })
        .collect();

    Score {
        signature,
        resolution,
        bars,
    }
}
