use leptos::prelude::*;
use wasm_bindgen_futures::spawn_local;

use wardmap_shared::ScaleMode;

use crate::app::{LoadError, Loading, MarkerSites, Options, Session};
use crate::legend::{Legend, LegendBar};
use crate::markers;
use crate::tiles::PROVIDERS;
use crate::whatif::MAX_REDUCTION_PERCENT;

/// Event fired when plantation recommendations become visible, for anything
/// embedding the map that wants to react (the original page scrolled a
/// recommendations section into view).
const SHOW_RECOMMENDATIONS_EVENT: &str = "wardmap:show-recommendations";

fn dispatch_show_recommendations() {
    let Some(window) = web_sys::window() else {
        return;
    };
    if let Ok(event) = web_sys::CustomEvent::new(SHOW_RECOMMENDATIONS_EVENT) {
        let _ = window.dispatch_event(&event);
    }
}

/// Sidebar with everything that is not the map itself: reload, the error
/// banner, layer and scale knobs, the what-if slider, the legend, the
/// ranked ward list, and the plantation-site toggle.
#[component]
pub fn ControlPanel(reload: impl Fn() + Copy + 'static) -> impl IntoView {
    let Session(session) = expect_context();
    let Options(options) = expect_context();
    let MarkerSites(marker_sites) = expect_context();
    let LoadError(load_error) = expect_context();
    let Loading(loading) = expect_context();
    let legend: RwSignal<Legend> = expect_context();

    let on_slider = move |e: leptos::ev::Event| {
        let percent = event_target_value(&e).parse::<f64>().unwrap_or(0.0);
        session.update(|s| s.set_reduction(percent));
    };

    let on_scale_mode = move |e: leptos::ev::Event| {
        let mode = match event_target_value(&e).as_str() {
            "quantile" => ScaleMode::Quantile,
            _ => ScaleMode::Continuous,
        };
        options.update(|o| o.scale_mode = mode);
    };

    let on_provider = move |e: leptos::ev::Event| {
        let id = event_target_value(&e);
        options.update(|o| o.provider = id);
    };

    let on_top_n = move |e: leptos::ev::Event| {
        if let Ok(n) = event_target_value(&e).parse::<usize>() {
            options.update(|o| o.top_n = n.clamp(1, 50));
        }
    };

    let toggle_markers = move |_| {
        if marker_sites.get_untracked().is_some() {
            marker_sites.set(None);
            return;
        }
        spawn_local(async move {
            match markers::fetch_plantation_sites().await {
                Ok(sites) => {
                    marker_sites.set(Some(sites));
                    dispatch_show_recommendations();
                }
                // Missing recommendations degrade to an empty marker layer.
                Err(e) => {
                    web_sys::console::warn_1(
                        &format!("plantation sites unavailable: {e}").into(),
                    );
                    marker_sites.set(Some(Vec::new()));
                }
            }
        });
    };

    let select_from_list = move |ward: String| {
        session.update(|s| {
            s.select_ward(&ward);
        })
    };

    let selected_details = Memo::new(move |_| {
        session.with(|s| {
            let name = s.selected()?.to_string();
            let feature = s.dataset.features().iter().find(|f| f.name() == name)?;
            let population = feature
                .properties
                .extra
                .get("population")
                .and_then(|v| v.as_f64());
            Some((name, feature.score(), population))
        })
    });

    view! {
        <div style="width: 320px; flex-shrink: 0; overflow-y: auto; padding: 14px 16px; background: #fafaf7; border-left: 1px solid #ddd; box-sizing: border-box;">
            <div style="display: flex; justify-content: space-between; align-items: center;">
                <h2 style="margin: 0; font-size: 1.05rem; color: #1b5e20;">"Ward Heat Priority"</h2>
                <button
                    style="padding: 4px 10px; border: 1px solid #bbb; border-radius: 4px; background: #fff; cursor: pointer;"
                    disabled=move || loading.get()
                    on:click=move |_| reload()
                >
                    {move || if loading.get() { "Loading\u{2026}" } else { "Reload" }}
                </button>
            </div>

            {move || load_error.get().map(|e| view! {
                <div style="margin-top: 10px; padding: 8px 10px; background: #fdecea; border: 1px solid #f5c6cb; border-radius: 4px; color: #842029; font-size: 0.8rem;">
                    {format!("Failed to load ward data: {e}")}
                </div>
            })}

            {move || {
                let skipped = session.with(|s| s.skipped);
                (skipped > 0).then(|| view! {
                    <div style="margin-top: 10px; padding: 6px 10px; background: #fff3cd; border: 1px solid #ffe69c; border-radius: 4px; color: #664d03; font-size: 0.78rem;">
                        {format!("{skipped} ward(s) had broken geometry and were skipped")}
                    </div>
                })
            }}

            <div style="margin-top: 14px; display: flex; flex-direction: column; gap: 8px; font-size: 0.82rem; color: #333;">
                <label style="display: flex; align-items: center; gap: 6px;">
                    <input
                        type="checkbox"
                        prop:checked=move || options.with(|o| o.show_all_wards)
                        on:change=move |_| options.update(|o| o.show_all_wards = !o.show_all_wards)
                    />
                    "All wards"
                </label>
                <label style="display: flex; align-items: center; gap: 6px;">
                    <input
                        type="checkbox"
                        prop:checked=move || options.with(|o| o.show_top_wards)
                        on:change=move |_| options.update(|o| o.show_top_wards = !o.show_top_wards)
                    />
                    "Priority wards"
                </label>
                <label style="display: flex; justify-content: space-between; align-items: center; gap: 8px;">
                    "Basemap"
                    <select
                        on:change=on_provider
                        prop:value=move || options.with(|o| o.provider.clone())
                        style="flex: 1; max-width: 160px;"
                    >
                        {PROVIDERS.iter().map(|p| view! {
                            <option value=p.id>{p.label}</option>
                        }).collect_view()}
                    </select>
                </label>
                <label style="display: flex; justify-content: space-between; align-items: center; gap: 8px;">
                    "Color scale"
                    <select
                        on:change=on_scale_mode
                        prop:value=move || options.with(|o| match o.scale_mode {
                            ScaleMode::Continuous => "continuous",
                            ScaleMode::Quantile => "quantile",
                        })
                        style="flex: 1; max-width: 160px;"
                    >
                        <option value="continuous">"Continuous"</option>
                        <option value="quantile">"Quantile"</option>
                    </select>
                </label>
                <label style="display: flex; justify-content: space-between; align-items: center; gap: 8px;">
                    "Priority count"
                    <input
                        type="number"
                        min="1"
                        max="50"
                        prop:value=move || options.with(|o| o.top_n.to_string())
                        on:change=on_top_n
                        style="width: 60px;"
                    />
                </label>
            </div>

            <div style="margin-top: 16px;">
                <div style="display: flex; justify-content: space-between; font-size: 0.82rem; color: #333;">
                    <span>"Simulated green cover increase"</span>
                    <span style="font-variant-numeric: tabular-nums;">
                        {move || session.with(|s| format!("{:.0}%", s.reduction_percent))}
                    </span>
                </div>
                <input
                    type="range"
                    min="0"
                    max=MAX_REDUCTION_PERCENT
                    step="1"
                    prop:value=move || session.with(|s| s.reduction_percent.to_string())
                    on:input=on_slider
                    style="width: 100%;"
                />
            </div>

            <LegendBar legend=legend />

            {move || selected_details.get().map(|(name, score, population)| view! {
                <div style="margin-top: 14px; padding: 10px; background: #fff; border: 1px solid #ddd; border-radius: 6px; font-size: 0.82rem;">
                    <div style="font-weight: 600; color: #1b5e20;">{name}</div>
                    <div style="margin-top: 4px; display: flex; justify-content: space-between;">
                        <span style="color: #666;">"Heat priority (p75)"</span>
                        <span>{format!("{score:.2}")}</span>
                    </div>
                    {population.map(|pop| view! {
                        <div style="margin-top: 2px; display: flex; justify-content: space-between;">
                            <span style="color: #666;">"Population"</span>
                            <span>{format!("{pop:.0}")}</span>
                        </div>
                    })}
                </div>
            })}

            <div style="margin-top: 16px;">
                <h3 style="margin: 0 0 6px; font-size: 0.88rem; color: #333;">"Top priority wards"</h3>
                <ol style="margin: 0; padding-left: 1.4em; font-size: 0.8rem; color: #444;">
                    <For
                        each=move || session.with(|s| s.top_ranking())
                        key=|(name, _)| name.clone()
                        children=move |(name, score)| {
                            let ward = name.clone();
                            view! {
                                <li
                                    style="cursor: pointer; padding: 1px 0;"
                                    on:click=move |_| select_from_list(ward.clone())
                                >
                                    {format!("{name} - {score:.2}")}
                                </li>
                            }
                        }
                    />
                </ol>
            </div>

            <button
                style="margin-top: 16px; width: 100%; padding: 8px; border: none; border-radius: 5px; background: #2e7d32; color: #fff; cursor: pointer; font-size: 0.85rem;"
                on:click=toggle_markers
            >
                {move || if marker_sites.with(|m| m.is_some()) {
                    "Hide plantation sites"
                } else {
                    "Show plantation sites"
                }}
            </button>

            {move || session.with(|s| s.fetched_at).map(|at| view! {
                <div style="margin-top: 10px; font-size: 0.72rem; color: #999;">
                    {format!("Data loaded {}", at.format("%H:%M:%S UTC"))}
                </div>
            })}
        </div>
    }
}
