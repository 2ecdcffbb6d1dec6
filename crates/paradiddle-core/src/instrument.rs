//! Fixed percussion catalog

use serde::{Deserialize, Serialize};

/// Unique identifier for catalog instruments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstrumentId(pub u16);

/// A percussion voice in the fixed kit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Instrument {
    pub id: InstrumentId,
    /// Display name ("Kick", "Snare", ...)
    pub label: &'static str,
    /// Staff position key consumed by the notation backend (e.g. "f/4")
    pub pitch_key: &'static str,
}

/// The kit, in display order (top staff voices first). Not user-editable at
/// runtime; grids carry one lane per entry.
pub const CATALOG: &[Instrument] = &[
    Instrument { id: InstrumentId(0), label: "Crash", pitch_key: "a/5" },
    Instrument { id: InstrumentId(1), label: "Ride", pitch_key: "f/5" },
    Instrument { id: InstrumentId(2), label: "Hi-Hat", pitch_key: "g/5" },
    Instrument { id: InstrumentId(3), label: "Open Hat", pitch_key: "g/5" },
    Instrument { id: InstrumentId(4), label: "High Tom", pitch_key: "e/5" },
    Instrument { id: InstrumentId(5), label: "Snare", pitch_key: "c/5" },
    Instrument { id: InstrumentId(6), label: "Low Tom", pitch_key: "a/4" },
    Instrument { id: InstrumentId(7), label: "Kick", pitch_key: "f/4" },
];

impl Instrument {
    /// Find a catalog entry by id
    pub fn lookup(id: InstrumentId) -> Option<&'static Instrument> {
        CATALOG.iter().find(|inst| inst.id == id)
    }

    /// Find a catalog entry by display name
    pub fn by_label(label: &str) -> Option<&'static Instrument> {
        CATALOG.iter().find(|inst| inst.label == label)
    }
}
