use serde::{Deserialize, Serialize};

/// Number of discrete tiers in quantile mode (and legend rows in both modes).
pub const TIER_COUNT: usize = 5;

/// Discrete green-to-red ramp for quantile tiers, ordered coolest first.
/// Fixed hue/lightness pairs so tier ordering reads as increasing urgency.
const TIER_COLORS: [(u8, u8, u8); TIER_COUNT] = [
    (46, 160, 67),   // green
    (154, 190, 58),  // yellow-green
    (233, 196, 15),  // yellow
    (230, 126, 34),  // orange
    (211, 47, 47),   // red
];

/// Format RGB as a CSS color string.
pub fn rgb_css((r, g, b): (u8, u8, u8)) -> String {
    format!("rgb({r},{g},{b})")
}

/// Format RGBA as a CSS color string.
pub fn rgba_css((r, g, b): (u8, u8, u8), a: f64) -> String {
    format!("rgba({r},{g},{b},{a})")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaleMode {
    /// Clamp to [0,1], optionally reshape with a power curve, blend through
    /// a fixed green-to-red gradient. Pure in the input value.
    Continuous,
    /// Bin against the dataset's own quantile breakpoints into one of
    /// `TIER_COUNT` fixed colors, so the ramp always spans the data shown.
    Quantile,
}

/// Quantile thresholds at the 20/40/60/80/100th percentiles of one load's
/// non-NaN score distribution. Only meaningful for the load that produced
/// them; a reload recomputes from scratch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorBreakpoints {
    thresholds: [f64; TIER_COUNT],
}

impl ColorBreakpoints {
    /// Compute breakpoints from a score distribution, ignoring NaNs.
    /// Returns `None` for an empty (or all-NaN) distribution — the scale
    /// then fails soft to the lowest tier instead of guessing.
    pub fn from_scores(scores: impl Iterator<Item = f64>) -> Option<ColorBreakpoints> {
        let mut values: Vec<f64> = scores.filter(|v| !v.is_nan()).collect();
        if values.is_empty() {
            return None;
        }
        values.sort_by(f64::total_cmp);

        // Nearest-rank percentile over the sorted values.
        let pick = |fraction: f64| {
            let rank = (fraction * values.len() as f64).ceil() as usize;
            values[rank.clamp(1, values.len()) - 1]
        };
        Some(ColorBreakpoints {
            thresholds: [pick(0.2), pick(0.4), pick(0.6), pick(0.8), pick(1.0)],
        })
    }

    pub fn thresholds(&self) -> [f64; TIER_COUNT] {
        self.thresholds
    }

    /// Tier index for a value: the first bin whose threshold covers it.
    /// NaN and below-range values land in the lowest tier; above-range
    /// values (possible only across datasets) land in the highest.
    pub fn tier_for(&self, value: f64) -> usize {
        if value.is_nan() {
            return 0;
        }
        self.thresholds
            .iter()
            .position(|&t| value <= t)
            .unwrap_or(TIER_COUNT - 1)
    }
}

/// The color scale engine: maps a priority score to a fill color.
///
/// Stateless — quantile mode takes its breakpoints as an argument so the
/// caller controls which load's distribution backs the coloring.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorScale {
    pub mode: ScaleMode,
    /// Monotonic reshaping exponent for continuous mode. Values below 1.0
    /// boost mid-range contrast; 1.0 is the plain linear ramp.
    pub exponent: f64,
}

impl Default for ColorScale {
    fn default() -> Self {
        Self {
            mode: ScaleMode::Continuous,
            exponent: 1.0,
        }
    }
}

impl ColorScale {
    pub fn quantile() -> Self {
        Self {
            mode: ScaleMode::Quantile,
            exponent: 1.0,
        }
    }

    /// Fill color for a score. Same input, same output; NaN and negative
    /// inputs are treated as the coolest end, never propagated into the
    /// color math.
    pub fn color_for(&self, value: f64, breakpoints: Option<&ColorBreakpoints>) -> (u8, u8, u8) {
        match self.mode {
            ScaleMode::Continuous => continuous_color(value, self.exponent),
            ScaleMode::Quantile => {
                let tier = breakpoints.map(|b| b.tier_for(value)).unwrap_or(0);
                TIER_COLORS[tier]
            }
        }
    }

    /// Color of a discrete tier (quantile ramp entry).
    pub fn tier_color(tier: usize) -> (u8, u8, u8) {
        TIER_COLORS[tier.min(TIER_COUNT - 1)]
    }
}

fn continuous_color(value: f64, exponent: f64) -> (u8, u8, u8) {
    let v = if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    };
    let v = if exponent > 0.0 && exponent != 1.0 {
        v.powf(exponent)
    } else {
        v
    };
    (
        (255.0 * v).round() as u8,
        (255.0 * (1.0 - v) * 0.6).round() as u8,
        (150.0 * (1.0 - v)).round() as u8,
    )
}
