//! Step grid model: one velocity lane per catalog instrument
//!
//! The grid is session-only state. It is mutated exclusively through the
//! named operations here (toggle, resize, lane install) plus the remap in
//! [`crate::remap`]; everything downstream reads it through accessors or a
//! [`GridSnapshot`].

use serde::{Deserialize, Serialize};

use crate::error::{GridError, Result};
use crate::instrument::{Instrument, InstrumentId, CATALOG};

/// Hit intensity for one cell; 0 = inactive
pub type Velocity = u8;

/// Values stepped through by [`Grid::toggle_cell`], in order. Extending the
/// grid to finer dynamics means extending this list.
pub const VELOCITY_CYCLE: &[Velocity] = &[0, 100];

/// One instrument's step row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct Lane {
    instrument: InstrumentId,
    steps: Vec<Velocity>,
}

/// Velocity lanes for the whole kit. Invariant: every lane is exactly
/// `columns` long.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid {
    lanes: Vec<Lane>,
    columns: usize,
}

impl Grid {
    /// A silent grid with one lane per catalog instrument
    pub fn zeroed(columns: usize) -> Self {
        Self {
            lanes: CATALOG
                .iter()
                .map(|inst| Lane {
                    instrument: inst.id,
                    steps: vec![0; columns],
                })
                .collect(),
            columns,
        }
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    /// Velocity at a cell; unknown instruments and out-of-range steps read
    /// as silence.
    pub fn velocity_at(&self, instrument: InstrumentId, step: usize) -> Velocity {
        self.lane(instrument)
            .and_then(|lane| lane.steps.get(step).copied())
            .unwrap_or(0)
    }

    pub fn set_velocity(&mut self, instrument: InstrumentId, step: usize, velocity: Velocity) {
        if let Some(lane) = self.lane_mut(instrument) {
            if let Some(cell) = lane.steps.get_mut(step) {
                *cell = velocity;
            }
        }
    }

    /// Advance a cell through [`VELOCITY_CYCLE`] and return the new value.
    /// Values outside the cycle clear to silence.
    pub fn toggle_cell(&mut self, instrument: InstrumentId, step: usize) -> Velocity {
        let current = self.velocity_at(instrument, step);
        let next = match VELOCITY_CYCLE.iter().position(|&v| v == current) {
            Some(i) => VELOCITY_CYCLE[(i + 1) % VELOCITY_CYCLE.len()],
            None => VELOCITY_CYCLE[0],
        };
        self.set_velocity(instrument, step, next);
        next
    }

    /// True if any instrument is active at the step
    pub fn active_at(&self, step: usize) -> bool {
        self.lanes
            .iter()
            .any(|lane| lane.steps.get(step).is_some_and(|&v| v > 0))
    }

    /// Active `(instrument, velocity)` pairs at the step, in catalog order
    pub fn hits_at(&self, step: usize) -> Vec<(InstrumentId, Velocity)> {
        self.lanes
            .iter()
            .filter_map(|lane| match lane.steps.get(step) {
                Some(&v) if v > 0 => Some((lane.instrument, v)),
                _ => None,
            })
            .collect()
    }

    /// Iterate lanes as `(instrument, steps)`, in catalog order
    pub fn lanes(&self) -> impl Iterator<Item = (InstrumentId, &[Velocity])> {
        self.lanes
            .iter()
            .map(|lane| (lane.instrument, lane.steps.as_slice()))
    }

    /// Positional resize: truncate or zero-pad every lane. Hits keep their
    /// raw indices; use [`crate::remap_grid`] to keep their musical timing
    /// instead.
    pub fn resize(&mut self, columns: usize) {
        for lane in &mut self.lanes {
            lane.steps.resize(columns, 0);
        }
        self.columns = columns;
    }

    /// Silence every cell
    pub fn clear(&mut self) {
        for lane in &mut self.lanes {
            lane.steps.fill(0);
        }
    }

    /// Replace one instrument's whole lane (preset install, tests)
    pub fn install_lane(&mut self, instrument: InstrumentId, steps: Vec<Velocity>) -> Result<()> {
        if steps.len() != self.columns {
            return Err(GridError::LaneLength {
                expected: self.columns,
                got: steps.len(),
            });
        }
        let lane = self
            .lane_mut(instrument)
            .ok_or(GridError::UnknownInstrument(instrument.0))?;
        lane.steps = steps;
        Ok(())
    }

    fn lane(&self, instrument: InstrumentId) -> Option<&Lane> {
        self.lanes.iter().find(|lane| lane.instrument == instrument)
    }

    fn lane_mut(&mut self, instrument: InstrumentId) -> Option<&mut Lane> {
        self.lanes
            .iter_mut()
            .find(|lane| lane.instrument == instrument)
    }
}

/// Point-in-time view handed to the playback scheduler at `play()` time
#[derive(Debug, Clone)]
pub struct GridSnapshot {
    pub grid: Grid,
    pub instruments: &'static [Instrument],
    pub columns: usize,
}

impl GridSnapshot {
    pub fn capture(grid: &Grid) -> Self {
        Self {
            grid: grid.clone(),
            instruments: CATALOG,
            columns: grid.columns(),
        }
    }
}
