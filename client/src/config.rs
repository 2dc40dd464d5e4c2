use gloo_storage::{LocalStorage, Storage};
use serde::{Deserialize, Serialize};

use wardmap_shared::{ColorScale, ScaleMode};

const STORAGE_KEY: &str = "wardmap-options";

pub const DEFAULT_TOP_N: usize = 10;
pub const DEFAULT_LABEL_ZOOM: f64 = 12.0;

/// User-tunable knobs, persisted in local storage so a returning visitor
/// gets the map back the way they left it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapOptions {
    pub scale_mode: ScaleMode,
    /// Perceptual tweak for the continuous ramp; 1.0 is linear.
    pub exponent: f64,
    /// How many wards the priority collection holds.
    pub top_n: usize,
    /// Basemap provider id, resolved through `tiles::provider_by_id`.
    pub provider: String,
    /// Minimum zoom at which ward name labels draw.
    pub label_zoom_threshold: f64,
    /// Layer-group visibility, after the original map's layer control.
    pub show_all_wards: bool,
    pub show_top_wards: bool,
}

impl Default for MapOptions {
    fn default() -> Self {
        MapOptions {
            scale_mode: ScaleMode::Continuous,
            exponent: 1.0,
            top_n: DEFAULT_TOP_N,
            provider: "street".to_owned(),
            label_zoom_threshold: DEFAULT_LABEL_ZOOM,
            show_all_wards: true,
            show_top_wards: true,
        }
    }
}

impl MapOptions {
    pub fn load() -> Self {
        LocalStorage::get(STORAGE_KEY).unwrap_or_default()
    }

    pub fn save(&self) {
        let _ = LocalStorage::set(STORAGE_KEY, self);
    }

    pub fn color_scale(&self) -> ColorScale {
        ColorScale {
            mode: self.scale_mode,
            exponent: self.exponent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_baseline_map() {
        let opts = MapOptions::default();
        assert_eq!(opts.scale_mode, ScaleMode::Continuous);
        assert_eq!(opts.exponent, 1.0);
        assert_eq!(opts.top_n, 10);
        assert_eq!(opts.provider, "street");
        assert_eq!(opts.label_zoom_threshold, 12.0);
        assert!(opts.show_all_wards);
        assert!(opts.show_top_wards);
    }

    #[test]
    fn partial_stored_payloads_fall_back_per_field() {
        let opts: MapOptions =
            serde_json::from_str(r#"{"scale_mode":"quantile","top_n":5}"#).expect("valid");
        assert_eq!(opts.scale_mode, ScaleMode::Quantile);
        assert_eq!(opts.top_n, 5);
        assert_eq!(opts.provider, "street");
        assert_eq!(opts.exponent, 1.0);
    }

    #[test]
    fn options_round_trip_through_json() {
        let opts = MapOptions {
            scale_mode: ScaleMode::Quantile,
            exponent: 0.7,
            top_n: 15,
            provider: "satellite".to_owned(),
            label_zoom_threshold: 13.0,
            show_all_wards: true,
            show_top_wards: false,
        };
        let json = serde_json::to_string(&opts).expect("serialize");
        let back: MapOptions = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, opts);
    }
}
