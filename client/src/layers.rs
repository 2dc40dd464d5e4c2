use std::collections::HashMap;

use wardmap_shared::{ColorBreakpoints, ColorScale, WardDataset, WardFeature, top_priority};

use crate::geo;

/// Which renderable collection a shape belongs to. The same ward is drawn
/// once per collection it appears in — dual representation by design, not
/// deduplication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerKind {
    All,
    Top,
}

/// Border/fill treatment per collection, after the original Leaflet styles:
/// the "all" pass is thin and translucent, the "top" pass heavier and more
/// opaque so priority wards read at a glance.
pub const ALL_STROKE: &str = "#444";
pub const TOP_STROKE: &str = "#000";
pub const ALL_WEIGHT: f64 = 0.8;
pub const TOP_WEIGHT: f64 = 1.6;
pub const ALL_FILL_OPACITY: f64 = 0.75;
pub const TOP_FILL_OPACITY: f64 = 0.9;

/// One styled, projected ward polygon ready for the canvas.
#[derive(Debug, Clone, PartialEq)]
pub struct WardShape {
    pub ward: String,
    pub kind: LayerKind,
    /// Rings in zoom-0 world pixels.
    pub rings: Vec<Vec<(f64, f64)>>,
    /// World-space bbox `(min_x, min_y, max_x, max_y)`.
    pub bbox: (f64, f64, f64, f64),
    pub label_anchor: (f64, f64),
    /// The ward's load-time score, kept on the shape so what-if recoloring
    /// never has to reach back into the dataset.
    pub score: f64,
    pub stroke: &'static str,
    pub stroke_weight: f64,
    pub fill: (u8, u8, u8),
    pub fill_opacity: f64,
}

/// The two renderable collections plus the build-time stroke-weight record.
///
/// `default_weights` is populated for every shape when the set is built, so
/// selection emphasis can always be reverted to the exact original weight —
/// no lazy capture on first touch.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LayerSet {
    pub all: Vec<WardShape>,
    pub top: Vec<WardShape>,
    default_weights: HashMap<(String, LayerKind), f64>,
    /// World-space extent of the "all" collection, for viewport fitting.
    pub bounds: Option<(f64, f64, f64, f64)>,
}

fn project_rings(feature: &WardFeature) -> Vec<Vec<(f64, f64)>> {
    feature
        .geometry
        .rings
        .iter()
        .map(|ring| {
            ring.iter()
                .map(|&[lon, lat]| geo::project(lon, lat))
                .collect()
        })
        .collect()
}

fn shape_for(
    feature: &WardFeature,
    kind: LayerKind,
    rings: Vec<Vec<(f64, f64)>>,
    scale: &ColorScale,
    breakpoints: Option<&ColorBreakpoints>,
) -> WardShape {
    let bbox = geo::project_bounds(feature.bbox);
    let (stroke, stroke_weight, fill_opacity) = match kind {
        LayerKind::All => (ALL_STROKE, ALL_WEIGHT, ALL_FILL_OPACITY),
        LayerKind::Top => (TOP_STROKE, TOP_WEIGHT, TOP_FILL_OPACITY),
    };
    let score = feature.score();
    WardShape {
        ward: feature.name().to_string(),
        kind,
        rings,
        bbox,
        label_anchor: ((bbox.0 + bbox.2) / 2.0, (bbox.1 + bbox.3) / 2.0),
        score,
        stroke,
        stroke_weight,
        fill: scale.color_for(score, breakpoints),
        fill_opacity,
    }
}

/// Build both collections from one dataset snapshot.
///
/// Every ward lands in `all`; the `min(top_n, len)` highest-scoring wards
/// are additionally rendered in `top`, in descending score order.
pub fn build_layers(
    dataset: &WardDataset,
    scale: &ColorScale,
    breakpoints: Option<&ColorBreakpoints>,
    top_n: usize,
) -> LayerSet {
    let mut set = LayerSet::default();

    for feature in dataset.features() {
        let shape = shape_for(
            feature,
            LayerKind::All,
            project_rings(feature),
            scale,
            breakpoints,
        );
        set.bounds = Some(match set.bounds {
            Some((x0, y0, x1, y1)) => (
                x0.min(shape.bbox.0),
                y0.min(shape.bbox.1),
                x1.max(shape.bbox.2),
                y1.max(shape.bbox.3),
            ),
            None => shape.bbox,
        });
        set.default_weights
            .insert((shape.ward.clone(), LayerKind::All), shape.stroke_weight);
        set.all.push(shape);
    }

    for &index in &top_priority(dataset, top_n) {
        let feature = &dataset.features()[index];
        let shape = shape_for(
            feature,
            LayerKind::Top,
            project_rings(feature),
            scale,
            breakpoints,
        );
        set.default_weights
            .insert((shape.ward.clone(), LayerKind::Top), shape.stroke_weight);
        set.top.push(shape);
    }

    set
}

impl LayerSet {
    pub fn contains(&self, ward: &str) -> bool {
        self.default_weights
            .contains_key(&(ward.to_string(), LayerKind::All))
            || self
                .default_weights
                .contains_key(&(ward.to_string(), LayerKind::Top))
    }

    pub fn default_weight(&self, ward: &str, kind: LayerKind) -> Option<f64> {
        self.default_weights.get(&(ward.to_string(), kind)).copied()
    }

    fn shapes_of_mut(&mut self, ward: &str) -> impl Iterator<Item = &mut WardShape> {
        self.all
            .iter_mut()
            .chain(self.top.iter_mut())
            .filter(move |s| s.ward == ward)
    }

    /// Reset every rendering of `ward` to its build-time stroke weight.
    pub fn restore_weight(&mut self, ward: &str) {
        let all = self.default_weight(ward, LayerKind::All);
        let top = self.default_weight(ward, LayerKind::Top);
        for shape in self.shapes_of_mut(ward) {
            let default = match shape.kind {
                LayerKind::All => all,
                LayerKind::Top => top,
            };
            if let Some(weight) = default {
                shape.stroke_weight = weight;
            }
        }
    }

    /// Set every rendering of `ward` to its build-time weight plus `delta`.
    /// Always computed from the recorded default, so repeated emphasis
    /// cannot accumulate.
    pub fn emphasize(&mut self, ward: &str, delta: f64) {
        let all = self.default_weight(ward, LayerKind::All);
        let top = self.default_weight(ward, LayerKind::Top);
        for shape in self.shapes_of_mut(ward) {
            let default = match shape.kind {
                LayerKind::All => all,
                LayerKind::Top => top,
            };
            if let Some(weight) = default {
                shape.stroke_weight = weight + delta;
            }
        }
    }

    /// Move `ward`'s shapes to the end of their collections so they draw
    /// above their neighbors.
    pub fn bring_to_front(&mut self, ward: &str) {
        for shapes in [&mut self.all, &mut self.top] {
            if let Some(pos) = shapes.iter().position(|s| s.ward == ward) {
                let shape = shapes.remove(pos);
                shapes.push(shape);
            }
        }
    }

    /// Draw-order iteration for hit-testing: topmost shape first.
    pub fn hit_order(&self) -> impl Iterator<Item = &WardShape> {
        self.top.iter().rev().chain(self.all.iter().rev())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use wardmap_shared::parse_ward_collection;

    fn dataset(entries: &[(&str, f64)]) -> WardDataset {
        let features: Vec<String> = entries
            .iter()
            .enumerate()
            .map(|(i, (name, p75))| {
                let lat = 23.0 + i as f64 * 0.02;
                format!(
                    r#"{{"geometry":{{"type":"Polygon","coordinates":[[[72.5,{lat}],[72.51,{lat}],[72.51,{}],[72.5,{}],[72.5,{lat}]]]}},"properties":{{"ward_name":"{name}","p75":{p75}}}}}"#,
                    lat + 0.01,
                    lat + 0.01,
                )
            })
            .collect();
        parse_ward_collection(
            &format!(r#"{{"features":[{}]}}"#, features.join(",")),
            Utc::now(),
        )
        .expect("valid payload")
        .dataset
    }

    fn twelve() -> WardDataset {
        let entries: Vec<(String, f64)> = (0..12)
            .map(|i| (format!("W{i}"), 0.1 + 0.1 * i as f64))
            .collect();
        let refs: Vec<(&str, f64)> = entries.iter().map(|(n, s)| (n.as_str(), *s)).collect();
        dataset(&refs)
    }

    #[test]
    fn every_ward_renders_in_all_and_top_is_truncated() {
        let ds = twelve();
        let set = build_layers(&ds, &ColorScale::default(), None, 10);
        assert_eq!(set.all.len(), 12);
        assert_eq!(set.top.len(), 10);
        assert_eq!(set.top[0].ward, "W11");
        assert!(!set.top.iter().any(|s| s.ward == "W0" || s.ward == "W1"));
    }

    #[test]
    fn dual_representation_styles_differ() {
        let ds = twelve();
        let set = build_layers(&ds, &ColorScale::default(), None, 10);
        let all = set.all.iter().find(|s| s.ward == "W11").expect("in all");
        let top = set.top.iter().find(|s| s.ward == "W11").expect("in top");
        assert_eq!(all.stroke_weight, ALL_WEIGHT);
        assert_eq!(top.stroke_weight, TOP_WEIGHT);
        assert!(top.fill_opacity > all.fill_opacity);
        // Same score, same scale: same fill in both collections.
        assert_eq!(all.fill, top.fill);
    }

    #[test]
    fn default_weights_recorded_at_build_time_for_every_shape() {
        let ds = dataset(&[("A", 0.9), ("B", 0.1)]);
        let set = build_layers(&ds, &ColorScale::default(), None, 1);
        assert_eq!(set.default_weight("A", LayerKind::All), Some(ALL_WEIGHT));
        assert_eq!(set.default_weight("A", LayerKind::Top), Some(TOP_WEIGHT));
        assert_eq!(set.default_weight("B", LayerKind::All), Some(ALL_WEIGHT));
        assert_eq!(set.default_weight("B", LayerKind::Top), None);
    }

    #[test]
    fn emphasis_is_computed_from_defaults_not_current_weight() {
        let ds = dataset(&[("A", 0.9)]);
        let mut set = build_layers(&ds, &ColorScale::default(), None, 1);
        set.emphasize("A", 2.0);
        set.emphasize("A", 2.0);
        assert_eq!(set.all[0].stroke_weight, ALL_WEIGHT + 2.0);
        assert_eq!(set.top[0].stroke_weight, TOP_WEIGHT + 2.0);
        set.restore_weight("A");
        assert_eq!(set.all[0].stroke_weight, ALL_WEIGHT);
        assert_eq!(set.top[0].stroke_weight, TOP_WEIGHT);
    }

    #[test]
    fn bring_to_front_moves_shapes_last() {
        let ds = dataset(&[("A", 0.9), ("B", 0.5), ("C", 0.1)]);
        let mut set = build_layers(&ds, &ColorScale::default(), None, 2);
        set.bring_to_front("A");
        assert_eq!(set.all.last().map(|s| s.ward.as_str()), Some("A"));
        assert_eq!(set.top.last().map(|s| s.ward.as_str()), Some("A"));
    }

    #[test]
    fn bounds_cover_the_all_collection() {
        let ds = twelve();
        let set = build_layers(&ds, &ColorScale::default(), None, 10);
        let (min_x, min_y, max_x, max_y) = set.bounds.expect("non-empty");
        for shape in &set.all {
            assert!(shape.bbox.0 >= min_x && shape.bbox.2 <= max_x);
            assert!(shape.bbox.1 >= min_y && shape.bbox.3 <= max_y);
        }
    }

    #[test]
    fn empty_dataset_builds_empty_layers() {
        let set = build_layers(&WardDataset::default(), &ColorScale::default(), None, 10);
        assert!(set.all.is_empty());
        assert!(set.top.is_empty());
        assert_eq!(set.bounds, None);
        assert!(!set.contains("anything"));
    }

    #[test]
    fn quantile_fill_uses_the_provided_breakpoints() {
        use wardmap_shared::{ColorBreakpoints, ScaleMode};
        let ds = twelve();
        let bp = ColorBreakpoints::from_scores(ds.scores()).expect("scores");
        let scale = ColorScale {
            mode: ScaleMode::Quantile,
            exponent: 1.0,
        };
        let set = build_layers(&ds, &scale, Some(&bp), 10);
        let hottest = set.all.iter().find(|s| s.ward == "W11").expect("present");
        let coolest = set.all.iter().find(|s| s.ward == "W0").expect("present");
        assert_eq!(hottest.fill, ColorScale::tier_color(4));
        assert_eq!(coolest.fill, ColorScale::tier_color(0));
    }
}
