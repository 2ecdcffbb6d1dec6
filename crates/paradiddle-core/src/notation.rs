//! Grid-to-notation transcription with duration merging
//!
//! Each bar of the step grid becomes an ordered list of [`NotationEvent`]s.
//! With merging enabled, runs of silence after a hit (or runs of silence on
//! their own) collapse into coarser durations according to a fixed ordered
//! rule table; otherwise every step emits one atomic event at the native
//! resolution duration.

use serde::Serialize;

use crate::grid::Grid;
use crate::instrument::Instrument;
use crate::meter::{Resolution, TimeSignature};

/// Duration class of a notation event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteValue {
    Quarter,
    Eighth,
    Sixteenth,
}

impl NoteValue {
    /// How many of this value fit in a whole note
    pub fn per_whole(self) -> u32 {
        match self {
            Self::Quarter => 4,
            Self::Eighth => 8,
            Self::Sixteenth => 16,
        }
    }

    /// Length in grid steps at the given resolution. Only called for
    /// values at or above the resolution's native value, so never zero.
    pub fn steps(self, resolution: Resolution) -> usize {
        (resolution.per_whole() / self.per_whole()) as usize
    }

    /// The one-step value at a resolution
    pub fn native(resolution: Resolution) -> Self {
        match resolution {
            Resolution::Quarter => Self::Quarter,
            Resolution::Eighth => Self::Eighth,
            Resolution::Sixteenth => Self::Sixteenth,
        }
    }
}

/// Stem orientation carried on each note event. Percussion transcription
/// always renders stems up; the field exists so the rendering backend
/// never has to re-derive it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StemDirection {
    #[default]
    Up,
    Down,
}

/// One note or rest in a bar's transcription. Produced per render, never
/// persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotationEvent {
    /// Staff position keys of the sounding instruments; empty for rests
    pub pitches: Vec<&'static str>,
    pub value: NoteValue,
    pub is_rest: bool,
    pub stem: StemDirection,
}

impl NotationEvent {
    fn note(pitches: Vec<&'static str>, value: NoteValue) -> Self {
        Self {
            pitches,
            value,
            is_rest: false,
            stem: StemDirection::Up,
        }
    }

    fn rest(value: NoteValue) -> Self {
        Self {
            pitches: Vec::new(),
            value,
            is_rest: true,
            stem: StemDirection::Up,
        }
    }
}

/// Which duration merges are applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeOptions {
    pub notes: bool,
    pub rests: bool,
}

impl MergeOptions {
    pub const ALL: Self = Self { notes: true, rests: true };
    pub const NONE: Self = Self { notes: false, rests: false };
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self::ALL
    }
}

/// One duration-merge pattern. The rule table is ordered; the first rule
/// whose predicate holds at the cursor wins. Each entry is a plain datum
/// so rules stay independently testable and new resolutions extend the
/// table without touching the cursor loop.
#[derive(Debug, Clone, Copy)]
pub(crate) struct MergeRule {
    /// Grid resolution the rule applies at
    pub resolution: Resolution,
    /// Required steps-per-beat of the active meter
    pub steps_per_beat: usize,
    /// Beat-relative cursor positions the rule may fire on
    pub at_subdivisions: &'static [usize],
    /// Steps after the cursor that must be silent
    pub quiet_after: usize,
    /// Emitted duration
    pub value: NoteValue,
}

impl MergeRule {
    /// Steps consumed: the cursor step plus the quiet span it swallows
    pub fn advance(&self) -> usize {
        self.quiet_after + 1
    }

    /// Whether the rule fires at `cursor` (bar-local). `quiet` reports
    /// silence at a bar-local step; the bar-length check keeps rules from
    /// reaching across a barline.
    pub fn matches(
        &self,
        resolution: Resolution,
        steps_per_beat: usize,
        cursor: usize,
        bar_len: usize,
        quiet: impl Fn(usize) -> bool,
    ) -> bool {
        self.resolution == resolution
            && self.steps_per_beat == steps_per_beat
            && self.at_subdivisions.contains(&(cursor % steps_per_beat))
            && cursor + self.advance() <= bar_len
            && (1..=self.quiet_after).all(|offset| quiet(cursor + offset))
    }
}

pub(crate) const MERGE_RULES: &[MergeRule] = &[
    // sixteenth grid, quarter beats: beat-aligned hit with an empty beat
    MergeRule {
        resolution: Resolution::Sixteenth,
        steps_per_beat: 4,
        at_subdivisions: &[0],
        quiet_after: 3,
        value: NoteValue::Quarter,
    },
    // sixteenth grid, quarter beats: on-eighth hit with an empty sixteenth
    MergeRule {
        resolution: Resolution::Sixteenth,
        steps_per_beat: 4,
        at_subdivisions: &[0, 2],
        quiet_after: 1,
        value: NoteValue::Eighth,
    },
    // eighth grid, eighth-pair beats: beat-aligned hit with an empty eighth
    MergeRule {
        resolution: Resolution::Eighth,
        steps_per_beat: 2,
        at_subdivisions: &[0],
        quiet_after: 1,
        value: NoteValue::Quarter,
    },
    // sixteenth grid in x/8 meters: beat-aligned hit with an empty sixteenth
    MergeRule {
        resolution: Resolution::Sixteenth,
        steps_per_beat: 2,
        at_subdivisions: &[0],
        quiet_after: 1,
        value: NoteValue::Eighth,
    },
];

/// Transcribe the grid into per-bar event lists. Every bar's emitted
/// durations sum to exactly the bar's step count; merge rules never look
/// across a bar boundary.
pub fn transcribe(
    grid: &Grid,
    resolution: Resolution,
    bars: usize,
    signature: TimeSignature,
    merge: MergeOptions,
) -> Vec<Vec<NotationEvent>> {
    let steps_per_bar = signature.steps_per_bar(resolution);
    let steps_per_beat = signature.steps_per_beat(resolution);

    (0..bars)
        .map(|bar| {
            let base = bar * steps_per_bar;
            let mut events = Vec::new();
            let mut cursor = 0;

            while cursor < steps_per_bar {
                let pitches = pitches_at(grid, base + cursor);
                let is_rest = pitches.is_empty();
                let merging = if is_rest { merge.rests } else { merge.notes };

                let rule = merging
                    .then(|| {
                        MERGE_RULES.iter().find(|rule| {
                            rule.matches(resolution, steps_per_beat, cursor, steps_per_bar, |s| {
                                !grid.active_at(base + s)
                            })
                        })
                    })
                    .flatten();

                let (value, advance) = match rule {
                    Some(rule) => (rule.value, rule.advance()),
                    None => (NoteValue::native(resolution), 1),
                };

                events.push(if is_rest {
                    NotationEvent::rest(value)
                } else {
                    NotationEvent::note(pitches, value)
                });
                cursor += advance;
            }

            events
        })
        .collect()
}

/// Staff keys sounding at a global step, in catalog order. Voices sharing
/// a staff position (the hats) collapse to one key.
fn pitches_at(grid: &Grid, step: usize) -> Vec<&'static str> {
    let mut pitches: Vec<&'static str> = Vec::new();
    for (instrument, _) in grid.hits_at(step) {
        if let Some(inst) = Instrument::lookup(instrument) {
            if !pitches.contains(&inst.pitch_key) {
                pitches.push(inst.pitch_key);
            }
        }
    }
    pitches
}
