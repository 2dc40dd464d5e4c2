use leptos::prelude::*;
use wasm_bindgen_futures::spawn_local;

use wardmap_shared::PlantationSite;

use crate::canvas::MapCanvas;
use crate::config::MapOptions;
use crate::legend::Legend;
use crate::loader;
use crate::panel::ControlPanel;
use crate::session::MapSession;
use crate::tiles::LoadedTile;
use crate::viewport::Viewport;

/// Newtype wrappers so each signal gets a distinct context type.
#[derive(Clone, Copy)]
pub(crate) struct Session(pub RwSignal<MapSession>);
#[derive(Clone, Copy)]
pub(crate) struct Options(pub RwSignal<MapOptions>);
#[derive(Clone, Copy)]
pub(crate) struct MarkerSites(pub RwSignal<Option<Vec<PlantationSite>>>);
#[derive(Clone, Copy)]
pub(crate) struct LoadError(pub RwSignal<Option<String>>);
#[derive(Clone, Copy)]
pub(crate) struct Loading(pub RwSignal<bool>);

/// Root application component. Provides global reactive signals via context.
#[component]
pub fn App() -> impl IntoView {
    let session: RwSignal<MapSession> = RwSignal::new(MapSession::empty());
    let options: RwSignal<MapOptions> = RwSignal::new(MapOptions::load());
    let viewport: RwSignal<Viewport> = RwSignal::new(Viewport::default());
    let loaded_tiles: RwSignal<Vec<LoadedTile>> = RwSignal::new(Vec::new());
    let marker_sites: RwSignal<Option<Vec<PlantationSite>>> = RwSignal::new(None);
    let legend: RwSignal<Legend> = RwSignal::new(Legend::default());
    let load_error: RwSignal<Option<String>> = RwSignal::new(None);
    let loading: RwSignal<bool> = RwSignal::new(false);
    // Highest request number handed out; a resolving load applies only if
    // it is still the latest, so racing reloads settle on the newest one.
    let issued: RwSignal<u64> = RwSignal::new(0);

    provide_context(Session(session));
    provide_context(Options(options));
    provide_context(MarkerSites(marker_sites));
    provide_context(LoadError(load_error));
    provide_context(Loading(loading));
    provide_context(viewport);
    provide_context(loaded_tiles);
    provide_context(legend);

    let start_load = move || {
        let my_gen = issued.get_untracked() + 1;
        issued.set(my_gen);
        loading.set(true);
        spawn_local(async move {
            let result = loader::load_ward_priority().await;
            if issued.get_untracked() != my_gen {
                return;
            }
            loading.set(false);
            match result {
                Ok(outcome) => {
                    load_error.set(None);
                    session.set(MapSession::from_outcome(
                        outcome,
                        &options.get_untracked(),
                        my_gen,
                    ));
                }
                Err(e) => load_error.set(Some(e)),
            }
        });
    };

    // First load on mount.
    Effect::new(move || {
        start_load();
    });

    // Persist options on any change.
    Effect::new(move || {
        options.with(|o| o.save());
    });

    // Scale/top-N knob changes rebuild the derived state from the held
    // dataset; the generation is kept so the viewport does not re-fit.
    Effect::new(move || {
        let (mode, exponent, top_n) = options.with(|o| (o.scale_mode, o.exponent, o.top_n));
        let needs_rebuild = session.with_untracked(|s| {
            s.fetched_at.is_some()
                && (s.scale.mode != mode || s.scale.exponent != exponent || s.top_n != top_n)
        });
        if needs_rebuild {
            let rebuilt = session
                .with_untracked(|s| s.rebuilt_with(&options.get_untracked(), s.generation));
            session.set(rebuilt);
        }
    });

    // The legend is always overwritten from the live session, never stacked.
    Effect::new(move || {
        session.with(|s| legend.set(Legend::for_scale(&s.scale, s.breakpoints.as_ref())));
    });

    view! {
        <div style="display: flex; width: 100vw; height: 100vh; overflow: hidden; font-family: 'Inter', system-ui, sans-serif;">
            <div style="flex: 1; position: relative; min-width: 0;">
                <MapCanvas />
            </div>
            <ControlPanel reload=start_load />
        </div>
    }
}
