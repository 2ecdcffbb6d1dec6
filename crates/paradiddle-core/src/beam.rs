//! Beat-aligned beam grouping over transcribed events
//!
//! Groups carry membership only; the rendering backend draws the actual
//! beam geometry. Stems are already fixed upward on the events themselves.

use serde::Serialize;

use crate::meter::{Resolution, TimeSignature};
use crate::notation::NotationEvent;

/// Indices (into a bar's event list) of notes beamed together
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BeamGroup {
    pub events: Vec<usize>,
}

/// Partition a bar's non-rest events into beam groups. The grouping window
/// is one beat, or a dotted quarter in 6/8; a rest ends the current run,
/// and crossing a window boundary starts a new group. Window membership is
/// decided by an event's start step, in integer arithmetic.
pub fn group_beams(
    events: &[NotationEvent],
    signature: TimeSignature,
    resolution: Resolution,
) -> Vec<BeamGroup> {
    let (window_num, window_denom) = signature.beam_window();
    // steps per window = window fraction of a whole note, in grid steps;
    // window_of(step) avoids the division's rounding by cross-multiplying
    let window_of = |step: usize| -> usize {
        step * window_denom as usize / (window_num as usize * resolution.per_whole() as usize)
    };

    let mut groups: Vec<BeamGroup> = Vec::new();
    let mut run: Vec<usize> = Vec::new();
    let mut run_window = usize::MAX;
    let mut step = 0usize;

    for (index, event) in events.iter().enumerate() {
        if event.is_rest {
            flush(&mut groups, &mut run);
        } else {
            let window = window_of(step);
            if window != run_window {
                flush(&mut groups, &mut run);
            }
            run.push(index);
            run_window = window;
        }
        step += event.value.steps(resolution);
    }
    flush(&mut groups, &mut run);

    groups
}

fn flush(groups: &mut Vec<BeamGroup>, run: &mut Vec<usize>) {
    if !run.is_empty() {
        groups.push(BeamGroup {
            events: std::mem::take(run),
        });
    }
}
