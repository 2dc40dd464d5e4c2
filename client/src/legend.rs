use leptos::prelude::*;

use wardmap_shared::{ColorBreakpoints, ColorScale, ScaleMode, rgb_css, scale::TIER_COUNT};

/// One swatch in the legend ramp.
#[derive(Debug, Clone, PartialEq)]
pub struct LegendStop {
    pub color: (u8, u8, u8),
    pub label: String,
}

/// The legend artifact: an ordered cool-to-hot ramp derived from the same
/// scale (and the same load's breakpoints) that colors the map.
///
/// The app holds exactly one `RwSignal<Legend>` and overwrites it on every
/// reload, so a new legend always replaces the old one and stale legends
/// cannot stack.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Legend {
    pub stops: Vec<LegendStop>,
}

impl Legend {
    pub fn for_scale(scale: &ColorScale, breakpoints: Option<&ColorBreakpoints>) -> Legend {
        let stops = match scale.mode {
            ScaleMode::Quantile => match breakpoints {
                Some(bp) => bp
                    .thresholds()
                    .iter()
                    .enumerate()
                    .map(|(tier, &threshold)| LegendStop {
                        color: ColorScale::tier_color(tier),
                        label: format!("≤ {threshold:.2}"),
                    })
                    .collect(),
                // No data yet (or an empty dataset): show the ramp itself
                // with no thresholds to promise.
                None => (0..TIER_COUNT)
                    .map(|tier| LegendStop {
                        color: ColorScale::tier_color(tier),
                        label: String::new(),
                    })
                    .collect(),
            },
            ScaleMode::Continuous => (0..TIER_COUNT)
                .map(|step| {
                    let value = step as f64 / (TIER_COUNT - 1) as f64;
                    LegendStop {
                        color: scale.color_for(value, None),
                        label: format!("{value:.2}"),
                    }
                })
                .collect(),
        };
        Legend { stops }
    }
}

/// Gradient bar with Low/High end labels.
#[component]
pub fn LegendBar(legend: RwSignal<Legend>) -> impl IntoView {
    view! {
        <div style="margin-top: 10px;">
            <div style="display: flex; height: 14px; border-radius: 3px; overflow: hidden;">
                <For
                    each=move || legend.get().stops.into_iter().enumerate()
                    key=|(i, stop)| (*i, stop.color)
                    children=|(_, stop)| {
                        let swatch = format!("flex: 1; background: {};", rgb_css(stop.color));
                        view! { <div style=swatch title=stop.label></div> }
                    }
                />
            </div>
            <div style="display: flex; justify-content: space-between; font-size: 0.75rem; color: #555;">
                <span>"Low"</span>
                <span>"High"</span>
            </div>
        </div>
    }
}
