use chrono::{DateTime, Utc};

use wardmap_shared::{ColorBreakpoints, ColorScale, WardDataset, top_priority};

use crate::config::MapOptions;
use crate::layers::{LayerSet, build_layers};
use crate::loader::LoadOutcome;
use crate::selection::SelectionController;
use crate::whatif::apply_reduction;

/// Everything derived from one ward-priority load, swapped atomically.
///
/// A reload builds a whole new session from its outcome and replaces the
/// old one in a single signal write, so layers, breakpoints, selection and
/// the what-if state can never mix data from two loads. `generation` ties
/// the session back to the request that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct MapSession {
    pub dataset: WardDataset,
    pub layers: LayerSet,
    pub scale: ColorScale,
    pub breakpoints: Option<ColorBreakpoints>,
    pub selection: SelectionController,
    pub reduction_percent: f64,
    pub skipped: usize,
    pub fetched_at: Option<DateTime<Utc>>,
    pub top_n: usize,
    pub generation: u64,
}

impl MapSession {
    /// The pre-load placeholder: nothing to draw, nothing selected.
    pub fn empty() -> MapSession {
        MapSession {
            dataset: WardDataset::default(),
            layers: LayerSet::default(),
            scale: ColorScale::default(),
            breakpoints: None,
            selection: SelectionController::default(),
            reduction_percent: 0.0,
            skipped: 0,
            fetched_at: None,
            top_n: 0,
            generation: 0,
        }
    }

    /// Build a fresh session from a load. Selection and the what-if slider
    /// start from their baselines; nothing carries over from a previous
    /// session.
    pub fn from_outcome(outcome: LoadOutcome, options: &MapOptions, generation: u64) -> MapSession {
        let scale = options.color_scale();
        let layers = build_layers(
            &outcome.dataset,
            &scale,
            outcome.breakpoints.as_ref(),
            options.top_n,
        );
        MapSession {
            dataset: outcome.dataset,
            layers,
            scale,
            breakpoints: outcome.breakpoints,
            selection: SelectionController::default(),
            reduction_percent: 0.0,
            skipped: outcome.skipped,
            fetched_at: Some(outcome.fetched_at),
            top_n: options.top_n,
            generation,
        }
    }

    /// Rebuild the derived state from the held dataset after an options
    /// change (scale mode, exponent, top-N) without refetching.
    pub fn rebuilt_with(&self, options: &MapOptions, generation: u64) -> MapSession {
        MapSession::from_outcome(
            LoadOutcome {
                dataset: self.dataset.clone(),
                breakpoints: self.breakpoints.clone(),
                skipped: self.skipped,
                fetched_at: self.fetched_at.unwrap_or_else(Utc::now),
            },
            options,
            generation,
        )
    }

    /// Click transition; `false` means the ward is not in this session
    /// (a stale click across a reload) and nothing changed.
    pub fn select_ward(&mut self, ward: &str) -> bool {
        self.selection.select(&mut self.layers, ward)
    }

    pub fn selected(&self) -> Option<&str> {
        self.selection.selected()
    }

    /// Move the what-if slider. Clamping and recoloring live in
    /// `whatif::apply_reduction`; the session just remembers the position.
    pub fn set_reduction(&mut self, percent: f64) {
        apply_reduction(
            &mut self.layers,
            percent,
            &self.scale,
            self.breakpoints.as_ref(),
        );
        self.reduction_percent = percent.clamp(0.0, crate::whatif::MAX_REDUCTION_PERCENT);
    }

    /// `(name, score)` pairs for the ranked panel list, hottest first.
    pub fn top_ranking(&self) -> Vec<(String, f64)> {
        top_priority(&self.dataset, self.top_n)
            .into_iter()
            .map(|index| {
                let feature = &self.dataset.features()[index];
                (feature.name().to_string(), feature.score())
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use wardmap_shared::ScaleMode;

    fn outcome() -> LoadOutcome {
        let features: Vec<String> = (0..12)
            .map(|i| {
                let lat = 23.0 + i as f64 * 0.02;
                format!(
                    r#"{{"geometry":{{"type":"Polygon","coordinates":[[[72.5,{lat}],[72.51,{lat}],[72.51,{}],[72.5,{}],[72.5,{lat}]]]}},"properties":{{"ward_name":"W{i}","p75":{}}}}}"#,
                    lat + 0.01,
                    lat + 0.01,
                    0.1 + 0.1 * i as f64,
                )
            })
            .collect();
        crate::loader::outcome_from_body(
            &format!(r#"{{"features":[{}]}}"#, features.join(",")),
            Utc::now(),
        )
        .expect("valid payload")
    }

    #[test]
    fn fresh_session_starts_at_baseline() {
        let session = MapSession::from_outcome(outcome(), &MapOptions::default(), 1);
        assert_eq!(session.selected(), None);
        assert_eq!(session.reduction_percent, 0.0);
        assert_eq!(session.layers.all.len(), 12);
        assert_eq!(session.layers.top.len(), 10);
        assert_eq!(session.generation, 1);
    }

    #[test]
    fn reload_resets_selection_and_slider() {
        let options = MapOptions::default();
        let mut session = MapSession::from_outcome(outcome(), &options, 1);
        session.select_ward("W11");
        session.set_reduction(20.0);

        let reloaded = MapSession::from_outcome(outcome(), &options, 2);
        assert_eq!(reloaded.selected(), None);
        assert_eq!(reloaded.reduction_percent, 0.0);
        // Baseline colors, not the what-if colors of the old session.
        let fresh = MapSession::from_outcome(outcome(), &options, 3);
        let a: Vec<_> = reloaded.layers.top.iter().map(|s| s.fill).collect();
        let b: Vec<_> = fresh.layers.top.iter().map(|s| s.fill).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn top_ranking_is_descending_and_truncated() {
        let session = MapSession::from_outcome(outcome(), &MapOptions::default(), 1);
        let ranking = session.top_ranking();
        assert_eq!(ranking.len(), 10);
        assert_eq!(ranking[0].0, "W11");
        assert!(ranking.windows(2).all(|w| w[0].1 >= w[1].1));
    }

    #[test]
    fn rebuilt_with_keeps_the_dataset_and_reapplies_options() {
        let mut options = MapOptions::default();
        let session = MapSession::from_outcome(outcome(), &options, 1);

        options.scale_mode = ScaleMode::Quantile;
        options.top_n = 5;
        let rebuilt = session.rebuilt_with(&options, 2);
        assert_eq!(rebuilt.dataset, session.dataset);
        assert_eq!(rebuilt.breakpoints, session.breakpoints);
        assert_eq!(rebuilt.layers.top.len(), 5);
        assert_eq!(rebuilt.selected(), None);
        assert_eq!(rebuilt.generation, 2);
        assert_eq!(rebuilt.scale.mode, ScaleMode::Quantile);
    }

    #[test]
    fn stale_click_leaves_the_session_untouched() {
        let mut session = MapSession::from_outcome(outcome(), &MapOptions::default(), 1);
        let snapshot = session.clone();
        assert!(!session.select_ward("GoneWard"));
        assert_eq!(session, snapshot);
    }

    #[test]
    fn slider_position_is_remembered_and_clamped() {
        let mut session = MapSession::from_outcome(outcome(), &MapOptions::default(), 1);
        session.set_reduction(45.0);
        assert_eq!(session.reduction_percent, 30.0);
        session.set_reduction(12.5);
        assert_eq!(session.reduction_percent, 12.5);
    }

    #[test]
    fn empty_session_renders_nothing() {
        let session = MapSession::empty();
        assert!(session.layers.all.is_empty());
        assert!(session.top_ranking().is_empty());
        assert_eq!(session.fetched_at, None);
    }
}
