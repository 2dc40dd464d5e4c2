#![cfg_attr(not(target_arch = "wasm32"), allow(dead_code))]

use std::cell::{Cell, RefCell};
use std::collections::{HashSet, VecDeque};
use std::rc::Rc;

use js_sys::Reflect;
use leptos::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen::JsValue;
use wasm_bindgen::prelude::*;
use web_sys::HtmlImageElement;

use crate::geo::WORLD_SIZE;
use crate::viewport::Viewport;

const CONCURRENCY: usize = 6;
const CACHE_SOFT_CAP: usize = 384;
const MAX_TILE_ZOOM: u8 = 19;
const ONLOAD_HANDLE_KEY: &str = "__wardmapTileOnload";
const ONERROR_HANDLE_KEY: &str = "__wardmapTileOnerror";

/// A raster base-map source. The layer manager never sees these: swapping
/// providers only swaps which URLs the tile loader fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileProvider {
    pub id: &'static str,
    pub label: &'static str,
    template: &'static str,
    subdomains: &'static [&'static str],
}

pub const PROVIDERS: &[TileProvider] = &[
    TileProvider {
        id: "street",
        label: "Street",
        template: "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png",
        subdomains: &["a", "b", "c"],
    },
    TileProvider {
        id: "satellite",
        label: "Satellite",
        template: "https://{s}.google.com/vt/lyrs=s&x={x}&y={y}&z={z}",
        subdomains: &["mt0", "mt1", "mt2", "mt3"],
    },
    TileProvider {
        id: "terrain",
        label: "Terrain",
        template: "https://{s}.tile.opentopomap.org/{z}/{x}/{y}.png",
        subdomains: &["a", "b", "c"],
    },
    TileProvider {
        id: "dark",
        label: "Dark",
        template: "https://{s}.basemaps.cartocdn.com/dark_all/{z}/{x}/{y}.png",
        subdomains: &["a", "b", "c", "d"],
    },
];

pub fn provider_by_id(id: &str) -> &'static TileProvider {
    PROVIDERS
        .iter()
        .find(|p| p.id == id)
        .unwrap_or(&PROVIDERS[0])
}

impl TileProvider {
    /// Expand the URL template for one tile. The subdomain rotates
    /// deterministically so repeated renders hit the same hostname.
    pub fn url(&self, key: TileKey) -> String {
        let s = if self.subdomains.is_empty() {
            ""
        } else {
            self.subdomains[(key.x as usize + key.y as usize) % self.subdomains.len()]
        };
        self.template
            .replace("{s}", s)
            .replace("{z}", &key.z.to_string())
            .replace("{x}", &key.x.to_string())
            .replace("{y}", &key.y.to_string())
    }
}

/// Slippy tile address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileKey {
    pub z: u8,
    pub x: u32,
    pub y: u32,
}

/// A decoded tile image ready to draw.
#[derive(Clone)]
pub struct LoadedTile {
    pub key: TileKey,
    pub image: HtmlImageElement,
}

/// World-space rect of a tile: `(min_x, min_y, span)` in zoom-0 pixels.
pub fn tile_world_rect(key: TileKey) -> (f64, f64, f64) {
    let span = WORLD_SIZE / (1u64 << key.z) as f64;
    (key.x as f64 * span, key.y as f64 * span, span)
}

/// Tile zoom closest to the viewport's continuous zoom, so tiles render
/// near their native 256px.
pub fn tile_zoom_for(viewport_zoom: f64) -> u8 {
    viewport_zoom.round().clamp(0.0, MAX_TILE_ZOOM as f64) as u8
}

/// Tiles covering the current canvas, in reading order.
pub fn visible_tiles(vp: &Viewport, canvas_w: f64, canvas_h: f64) -> Vec<TileKey> {
    if canvas_w <= 0.0 || canvas_h <= 0.0 {
        return Vec::new();
    }
    let z = tile_zoom_for(vp.zoom());
    let max_index = (1u64 << z) - 1;
    let span = WORLD_SIZE / (1u64 << z) as f64;

    let (wx0, wy0) = vp.screen_to_world(0.0, 0.0);
    let (wx1, wy1) = vp.screen_to_world(canvas_w, canvas_h);

    let x0 = (wx0 / span).floor().max(0.0) as u64;
    let x1 = (wx1 / span).floor().clamp(0.0, max_index as f64) as u64;
    let y0 = (wy0 / span).floor().max(0.0) as u64;
    let y1 = (wy1 / span).floor().clamp(0.0, max_index as f64) as u64;

    let mut keys = Vec::new();
    for y in y0..=y1 {
        for x in x0..=x1 {
            keys.push(TileKey {
                z,
                x: x as u32,
                y: y as u32,
            });
            if keys.len() >= 256 {
                return keys;
            }
        }
    }
    keys
}

/// Concurrency-limited tile fetcher with an in-memory cache behind a signal.
///
/// Changing provider bumps an epoch: in-flight completions from the old
/// provider are discarded instead of upserted under the new imagery.
pub struct TileLoader {
    tiles: RwSignal<Vec<LoadedTile>>,
    provider: Rc<Cell<&'static TileProvider>>,
    epoch: Rc<Cell<u64>>,
    requested: Rc<RefCell<HashSet<TileKey>>>,
    queue: Rc<RefCell<VecDeque<TileKey>>>,
    in_flight: Rc<Cell<usize>>,
}

impl TileLoader {
    pub fn new(tiles: RwSignal<Vec<LoadedTile>>, provider: &'static TileProvider) -> Self {
        Self {
            tiles,
            provider: Rc::new(Cell::new(provider)),
            epoch: Rc::new(Cell::new(0)),
            requested: Rc::new(RefCell::new(HashSet::new())),
            queue: Rc::new(RefCell::new(VecDeque::new())),
            in_flight: Rc::new(Cell::new(0)),
        }
    }

    pub fn set_provider(&self, provider: &'static TileProvider) {
        if self.provider.get() == provider {
            return;
        }
        self.provider.set(provider);
        self.epoch.set(self.epoch.get() + 1);
        self.requested.borrow_mut().clear();
        self.queue.borrow_mut().clear();
        self.tiles.set(Vec::new());
    }

    /// Queue every visible tile that has not been requested yet.
    pub fn request_visible(&self, vp: &Viewport, canvas_w: f64, canvas_h: f64) {
        {
            let mut requested = self.requested.borrow_mut();
            let mut queue = self.queue.borrow_mut();
            for key in visible_tiles(vp, canvas_w, canvas_h) {
                if requested.insert(key) {
                    queue.push_back(key);
                }
            }
        }
        pump_queue(
            self.tiles,
            self.provider.clone(),
            self.epoch.clone(),
            self.queue.clone(),
            self.in_flight.clone(),
        );
    }
}

fn pump_queue(
    tiles: RwSignal<Vec<LoadedTile>>,
    provider: Rc<Cell<&'static TileProvider>>,
    epoch: Rc<Cell<u64>>,
    queue: Rc<RefCell<VecDeque<TileKey>>>,
    in_flight: Rc<Cell<usize>>,
) {
    while in_flight.get() < CONCURRENCY {
        let Some(key) = queue.borrow_mut().pop_front() else {
            break;
        };
        in_flight.set(in_flight.get() + 1);

        let queue_next = queue.clone();
        let in_flight_next = in_flight.clone();
        let provider_next = provider.clone();
        let epoch_next = epoch.clone();
        let on_done: Rc<dyn Fn()> = Rc::new(move || {
            in_flight_next.set(in_flight_next.get().saturating_sub(1));
            pump_queue(
                tiles,
                provider_next.clone(),
                epoch_next.clone(),
                queue_next.clone(),
                in_flight_next.clone(),
            );
        });

        load_tile(tiles, provider.get(), epoch.clone(), key, on_done);
    }
}

fn load_tile(
    tiles: RwSignal<Vec<LoadedTile>>,
    provider: &'static TileProvider,
    epoch: Rc<Cell<u64>>,
    key: TileKey,
    on_done: Rc<dyn Fn()>,
) {
    let img = match HtmlImageElement::new() {
        Ok(img) => img,
        Err(_) => {
            on_done();
            return;
        }
    };
    let issue_epoch = epoch.get();
    img.set_cross_origin(Some("anonymous"));

    let img_for_load = img.clone();
    let on_done_load = on_done.clone();
    let onload = Closure::<dyn FnMut()>::new(move || {
        clear_image_handlers(&img_for_load);
        if epoch.get() == issue_epoch {
            upsert_tile(
                tiles,
                LoadedTile {
                    key,
                    image: img_for_load.clone(),
                },
            );
        }
        on_done_load();
    });

    let img_for_error = img.clone();
    let on_done_error = on_done.clone();
    let onerror = Closure::<dyn FnMut()>::new(move || {
        clear_image_handlers(&img_for_error);
        on_done_error();
    });

    let onload_js = onload.into_js_value();
    let onerror_js = onerror.into_js_value();
    img.set_onload(Some(onload_js.unchecked_ref()));
    img.set_onerror(Some(onerror_js.unchecked_ref()));
    let _ = Reflect::set(
        img.as_ref(),
        &JsValue::from_str(ONLOAD_HANDLE_KEY),
        &onload_js,
    );
    let _ = Reflect::set(
        img.as_ref(),
        &JsValue::from_str(ONERROR_HANDLE_KEY),
        &onerror_js,
    );
    img.set_src(&provider.url(key));
}

fn clear_image_handlers(img: &HtmlImageElement) {
    img.set_onload(None);
    img.set_onerror(None);
    let _ = Reflect::delete_property(img.as_ref(), &JsValue::from_str(ONLOAD_HANDLE_KEY));
    let _ = Reflect::delete_property(img.as_ref(), &JsValue::from_str(ONERROR_HANDLE_KEY));
}

fn upsert_tile(tiles: RwSignal<Vec<LoadedTile>>, incoming: LoadedTile) {
    tiles.update(|loaded| {
        if let Some(existing) = loaded.iter_mut().find(|t| t.key == incoming.key) {
            *existing = incoming;
            return;
        }
        // Crossing a zoom level leaves stale resolutions behind; once the
        // cache grows past the cap, keep only the active zoom.
        if loaded.len() >= CACHE_SOFT_CAP {
            loaded.retain(|t| t.key.z == incoming.key.z);
        }
        loaded.push(incoming);
        loaded.sort_by_key(|t| t.key);
    });
}
