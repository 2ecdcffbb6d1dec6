//! Meter arithmetic: subdivision resolution, time signature, bar geometry

use serde::{Deserialize, Serialize};

/// Grid subdivision unit: how many steps one whole note splits into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    Quarter,
    Eighth,
    #[default]
    Sixteenth,
}

impl Resolution {
    /// Steps per whole note (4, 8 or 16)
    pub fn per_whole(self) -> u32 {
        match self {
            Self::Quarter => 4,
            Self::Eighth => 8,
            Self::Sixteenth => 16,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Quarter => "1/4",
            Self::Eighth => "1/8",
            Self::Sixteenth => "1/16",
        }
    }
}

/// Musical time signature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSignature {
    pub numerator: u8,
    pub denominator: u8,
}

impl Default for TimeSignature {
    fn default() -> Self {
        Self::COMMON
    }
}

impl TimeSignature {
    pub const COMMON: Self = Self { numerator: 4, denominator: 4 };

    /// Both parts are kept at least 1
    pub fn new(numerator: u8, denominator: u8) -> Self {
        Self {
            numerator: numerator.max(1),
            denominator: denominator.max(1),
        }
    }

    /// Grid columns in one bar at the given resolution. Combinations that
    /// round below one step are clamped to a single step, never an error.
    pub fn steps_per_bar(&self, resolution: Resolution) -> usize {
        let exact =
            self.numerator as f64 * resolution.per_whole() as f64 / self.denominator as f64;
        (exact.round() as usize).max(1)
    }

    /// Steps in one beat (one `1/denominator` unit) at the given resolution
    pub fn steps_per_beat(&self, resolution: Resolution) -> usize {
        let exact = resolution.per_whole() as f64 / self.denominator as f64;
        (exact.round() as usize).max(1)
    }

    /// Beam grouping window as a fraction of a whole note. One beat unit,
    /// except 6/8 which groups by dotted quarter per compound-meter
    /// convention.
    pub fn beam_window(&self) -> (u32, u32) {
        if self.numerator == 6 && self.denominator == 8 {
            (3, 8)
        } else {
            (1, self.denominator as u32)
        }
    }
}
