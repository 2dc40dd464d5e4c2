use wardmap_shared::{ColorBreakpoints, ColorScale};

use crate::layers::LayerSet;

/// Slider range for the simulated green-cover increase, in percent.
pub const MAX_REDUCTION_PERCENT: f64 = 30.0;

/// Recolor the top-priority collection as if green cover rose by `percent`.
///
/// Only derived fill colors change: the "all" collection, the dataset, and
/// the load-time breakpoints are untouched, so the legend stays a stable
/// reference frame while the user experiments. Order-independent and
/// idempotent; `percent = 0` restores the post-load coloring exactly.
pub fn apply_reduction(
    layers: &mut LayerSet,
    percent: f64,
    scale: &ColorScale,
    breakpoints: Option<&ColorBreakpoints>,
) {
    let percent = percent.clamp(0.0, MAX_REDUCTION_PERCENT);
    for shape in &mut layers.top {
        let simulated = (shape.score - percent * 0.01).max(0.0);
        shape.fill = scale.color_for(simulated, breakpoints);
    }
}
