//! Hit-preserving remapping across resolution and meter changes
//!
//! When the host changes subdivision or time signature with "keep timing"
//! enabled, existing hits are relocated to the nearest step of the new bar
//! geometry instead of keeping their raw indices.

use crate::grid::Grid;

/// Relocate every hit of `prev` onto a grid with `new_steps_per_bar`
/// columns per bar. Pure and deterministic.
///
/// Per bar, an old step `s` lands on `round(s * new / old)`, clamped into
/// the bar. When shrinking the resolution, two old steps may land on the
/// same new step; the louder hit wins so an accent is never dropped in
/// favor of a quieter overlapping one.
pub fn remap_grid(
    prev: &Grid,
    old_steps_per_bar: usize,
    new_steps_per_bar: usize,
    bars: usize,
) -> Grid {
    let new_steps_per_bar = new_steps_per_bar.max(1);
    let mut next = Grid::zeroed(bars * new_steps_per_bar);
    if old_steps_per_bar == 0 {
        return next;
    }

    for (instrument, steps) in prev.lanes() {
        for bar in 0..bars {
            for s in 0..old_steps_per_bar {
                let Some(&velocity) = steps.get(bar * old_steps_per_bar + s) else {
                    continue;
                };
                if velocity == 0 {
                    continue;
                }

                let scaled =
                    (s as f64 * new_steps_per_bar as f64 / old_steps_per_bar as f64).round();
                let new_local = (scaled as usize).min(new_steps_per_bar - 1);
                let new_index = bar * new_steps_per_bar + new_local;

                if velocity > next.velocity_at(instrument, new_index) {
                    next.set_velocity(instrument, new_index, velocity);
                }
            }
        }
    }

    next
}
