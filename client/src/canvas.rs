use std::cell::{Cell, RefCell};
use std::rc::Rc;

use leptos::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement, MouseEvent, PointerEvent, WheelEvent};

use wardmap_shared::{PlantationSite, rgb_css, rgba_css};

use crate::app::{MarkerSites, Options, Session};
use crate::hit::hit_test_visible;
use crate::layers::WardShape;
use crate::render_loop::RenderScheduler;
use crate::session::MapSession;
use crate::tiles::{LoadedTile, TileLoader, provider_by_id, tile_world_rect};
use crate::viewport::{INITIAL_CENTER, INITIAL_ZOOM, Viewport};

const BACKGROUND: &str = "#dfe8df";
const LABEL_FONT: &str = "600 12px system-ui, sans-serif";
const MARKER_RADIUS: f64 = 5.0;
/// A press that travels less than this (in CSS px) still counts as a click.
const CLICK_SLOP_PX: f64 = 5.0;

/// Single-canvas 2D map renderer: base tiles, the "all" ward pass, the
/// top-priority pass, name labels, plantation markers. Repaints go through
/// the rAF scheduler so pointer-event bursts coalesce into one frame.
#[component]
pub fn MapCanvas() -> impl IntoView {
    let Session(session) = expect_context();
    let Options(options) = expect_context();
    let MarkerSites(marker_sites) = expect_context();
    let viewport: RwSignal<Viewport> = expect_context();
    let loaded_tiles: RwSignal<Vec<LoadedTile>> = expect_context();

    let canvas_ref = NodeRef::<leptos::html::Canvas>::new();

    // Drag state
    let is_dragging = Rc::new(Cell::new(false));
    let drag_start_x = Rc::new(Cell::new(0.0f64));
    let drag_start_y = Rc::new(Cell::new(0.0f64));
    let last_x = Rc::new(Cell::new(0.0f64));
    let last_y = Rc::new(Cell::new(0.0f64));

    // Pinch state
    let pinch_dist = Rc::new(Cell::new(0.0f64));

    // Viewport fits the dataset once per load, keyed by session generation.
    let fitted_generation: Rc<Cell<u64>> = Rc::new(Cell::new(0));
    let fitted_render = fitted_generation.clone();
    let centered_once = Rc::new(Cell::new(false));
    let centered_render = centered_once.clone();

    // Cached 2D context (invalidated on canvas resize)
    let cached_ctx: Rc<RefCell<Option<CanvasRenderingContext2d>>> = Rc::new(RefCell::new(None));
    let cached_ctx_render = cached_ctx.clone();
    let last_size: Rc<Cell<(u32, u32)>> = Rc::new(Cell::new((0, 0)));

    let loader = Rc::new(TileLoader::new(
        loaded_tiles,
        provider_by_id(&options.get_untracked().provider),
    ));

    let scheduler = RenderScheduler::new(move || {
        let Some(canvas) = canvas_ref.get_untracked() else {
            return;
        };
        let canvas: &HtmlCanvasElement = &canvas;
        let Some(parent) = canvas.parent_element() else {
            return;
        };
        let w = parent.client_width() as u32;
        let h = parent.client_height() as u32;
        if w == 0 || h == 0 {
            return;
        }

        let dpr = web_sys::window()
            .map(|win| win.device_pixel_ratio())
            .unwrap_or(1.0)
            .max(1.0);
        let pw = (w as f64 * dpr).round() as u32;
        let ph = (h as f64 * dpr).round() as u32;
        if canvas.width() != pw || canvas.height() != ph || last_size.get() != (w, h) {
            canvas.set_width(pw);
            canvas.set_height(ph);
            last_size.set((w, h));
            // Resize resets context state, including the DPR scale.
            *cached_ctx_render.borrow_mut() = None;
        }

        let ctx = {
            let mut cache = cached_ctx_render.borrow_mut();
            if cache.is_none() {
                let Some(ctx) = canvas
                    .get_context("2d")
                    .ok()
                    .flatten()
                    .and_then(|ctx| ctx.dyn_into::<CanvasRenderingContext2d>().ok())
                else {
                    return;
                };
                ctx.scale(dpr, dpr).ok();
                *cache = Some(ctx);
            }
            let Some(ctx) = cache.clone() else {
                return;
            };
            ctx
        };

        let (w, h) = (w as f64, h as f64);

        // Before any data arrives, settle on the default city view.
        if !centered_render.get() {
            centered_render.set(true);
            viewport.update(|vp| {
                vp.center_on(INITIAL_CENTER.0, INITIAL_CENTER.1, INITIAL_ZOOM, w, h);
            });
            return;
        }

        // Fit to the dataset extent once per load.
        let generation = session.with_untracked(|s| s.generation);
        if generation != fitted_render.get() {
            let bounds = session.with_untracked(|s| s.layers.bounds);
            fitted_render.set(generation);
            if let Some((min_x, min_y, max_x, max_y)) = bounds {
                viewport.update(|vp| vp.fit_bounds(min_x, min_y, max_x, max_y, w, h));
                return;
            }
        }

        let vp = viewport.get_untracked();
        let (label_threshold, show_all, show_top) = options
            .with_untracked(|o| (o.label_zoom_threshold, o.show_all_wards, o.show_top_wards));

        ctx.set_fill_style_str(BACKGROUND);
        ctx.fill_rect(0.0, 0.0, w, h);

        loaded_tiles.with_untracked(|tiles| draw_tiles(&ctx, w, h, &vp, tiles));

        session.with_untracked(|s| {
            draw_wards(&ctx, w, h, &vp, s, show_all, show_top);
            if vp.zoom() > label_threshold {
                draw_labels(&ctx, w, h, &vp, s, show_all, show_top);
            }
        });

        marker_sites.with_untracked(|sites: &Option<Vec<PlantationSite>>| {
            if let Some(sites) = sites {
                draw_markers(&ctx, w, h, &vp, sites, vp.zoom() > label_threshold);
            }
        });
    });
    let scheduler = Rc::new(scheduler);

    // Repaint on any state the frame reads.
    let sched_state = scheduler.clone();
    Effect::new(move || {
        session.track();
        loaded_tiles.track();
        marker_sites.track();
        sched_state.mark_dirty();
    });

    // Viewport changes also pull in whatever tiles just became visible.
    let sched_vp = scheduler.clone();
    let loader_vp = loader.clone();
    Effect::new(move || {
        viewport.track();
        if let Some(canvas) = canvas_ref.get_untracked()
            && let Some(parent) = canvas.parent_element()
        {
            let vp = viewport.get_untracked();
            loader_vp.request_visible(&vp, parent.client_width() as f64, parent.client_height() as f64);
        }
        sched_vp.mark_dirty();
    });

    // Provider switch drops the old imagery and refills the view.
    let sched_provider = scheduler.clone();
    let loader_provider = loader.clone();
    Effect::new(move || {
        let provider = options.with(|o| provider_by_id(&o.provider));
        loader_provider.set_provider(provider);
        if let Some(canvas) = canvas_ref.get_untracked()
            && let Some(parent) = canvas.parent_element()
        {
            let vp = viewport.get_untracked();
            loader_provider.request_visible(
                &vp,
                parent.client_width() as f64,
                parent.client_height() as f64,
            );
        }
        sched_provider.mark_dirty();
    });

    // --- Input handlers ---

    let on_wheel = move |e: WheelEvent| {
        e.prevent_default();
        let delta = e.delta_y();
        let x = e.offset_x() as f64;
        let y = e.offset_y() as f64;
        viewport.update(|vp| vp.zoom_at(delta, x, y));
    };

    let on_pointer_down = {
        let is_dragging = is_dragging.clone();
        let drag_start_x = drag_start_x.clone();
        let drag_start_y = drag_start_y.clone();
        let last_x = last_x.clone();
        let last_y = last_y.clone();
        move |e: PointerEvent| {
            is_dragging.set(true);
            drag_start_x.set(e.client_x() as f64);
            drag_start_y.set(e.client_y() as f64);
            last_x.set(e.client_x() as f64);
            last_y.set(e.client_y() as f64);

            if let Some(target) = e.target()
                && let Ok(el) = target.dyn_into::<web_sys::HtmlElement>()
            {
                el.set_pointer_capture(e.pointer_id()).ok();
                el.style().set_property("cursor", "grabbing").ok();
            }
        }
    };

    let on_pointer_move = {
        let is_dragging = is_dragging.clone();
        let last_x = last_x.clone();
        let last_y = last_y.clone();
        move |e: PointerEvent| {
            if is_dragging.get() {
                let dx = e.client_x() as f64 - last_x.get();
                let dy = e.client_y() as f64 - last_y.get();
                last_x.set(e.client_x() as f64);
                last_y.set(e.client_y() as f64);
                viewport.update(|vp| vp.pan(dx, dy));
            }
        }
    };

    let on_pointer_up = {
        let is_dragging = is_dragging.clone();
        move |e: PointerEvent| {
            is_dragging.set(false);
            if let Some(target) = e.target()
                && let Ok(el) = target.dyn_into::<web_sys::HtmlElement>()
            {
                el.style().set_property("cursor", "grab").ok();
            }
        }
    };

    let on_click = {
        let drag_start_x = drag_start_x.clone();
        let drag_start_y = drag_start_y.clone();
        move |e: MouseEvent| {
            let dx = (e.client_x() as f64 - drag_start_x.get()).abs();
            let dy = (e.client_y() as f64 - drag_start_y.get()).abs();
            if dx >= CLICK_SLOP_PX || dy >= CLICK_SLOP_PX {
                return;
            }
            let local = canvas_ref
                .get_untracked()
                .map(|el| {
                    let rect = el.get_bounding_client_rect();
                    (
                        e.client_x() as f64 - rect.left(),
                        e.client_y() as f64 - rect.top(),
                    )
                })
                .unwrap_or((e.offset_x() as f64, e.offset_y() as f64));
            let vp = viewport.get_untracked();
            let (wx, wy) = vp.screen_to_world(local.0, local.1);

            let (show_all, show_top) =
                options.with_untracked(|o| (o.show_all_wards, o.show_top_wards));
            let hit = session.with_untracked(|s| {
                hit_test_visible(&s.layers, wx, wy, show_all, show_top)
                    .map(|shape| shape.ward.clone())
            });
            session.update(|s| match hit {
                Some(ward) => {
                    s.select_ward(&ward);
                }
                None => {
                    let MapSession {
                        selection, layers, ..
                    } = s;
                    selection.clear(layers);
                }
            });
        }
    };

    let on_touch_start = {
        let pinch_dist = pinch_dist.clone();
        move |e: web_sys::TouchEvent| {
            let touches = e.touches();
            if touches.length() == 2 {
                e.prevent_default();
                let (Some(t0), Some(t1)) = (touches.get(0), touches.get(1)) else {
                    return;
                };
                let dx = (t1.client_x() - t0.client_x()) as f64;
                let dy = (t1.client_y() - t0.client_y()) as f64;
                pinch_dist.set((dx * dx + dy * dy).sqrt());
            }
        }
    };

    let on_touch_move = {
        let pinch_dist = pinch_dist.clone();
        move |e: web_sys::TouchEvent| {
            let touches = e.touches();
            if touches.length() == 2 {
                e.prevent_default();
                let (Some(t0), Some(t1)) = (touches.get(0), touches.get(1)) else {
                    return;
                };
                let dx = (t1.client_x() - t0.client_x()) as f64;
                let dy = (t1.client_y() - t0.client_y()) as f64;
                let new_dist = (dx * dx + dy * dy).sqrt();
                let old_dist = pinch_dist.get();

                if old_dist > 0.0 {
                    let mid_x = (t0.client_x() + t1.client_x()) as f64 / 2.0;
                    let mid_y = (t0.client_y() + t1.client_y()) as f64 / 2.0;
                    let delta = -(new_dist - old_dist) * 2.0;
                    viewport.update(|vp| vp.zoom_at(delta, mid_x, mid_y));
                }

                pinch_dist.set(new_dist);
            }
        }
    };

    view! {
        <div
            style="position: relative; width: 100%; height: 100%; overflow: hidden;"
            on:wheel=on_wheel
            on:pointerdown=on_pointer_down
            on:pointermove=on_pointer_move
            on:pointerup=on_pointer_up
            on:click=on_click
            on:touchstart=on_touch_start
            on:touchmove=on_touch_move
        >
            <canvas
                node_ref=canvas_ref
                style="position: absolute; inset: 0; width: 100%; height: 100%; touch-action: none; cursor: grab;"
            />
        </div>
    }
}

fn draw_tiles(
    ctx: &CanvasRenderingContext2d,
    w: f64,
    h: f64,
    vp: &Viewport,
    tiles: &[LoadedTile],
) {
    ctx.set_image_smoothing_enabled(false);
    for tile in tiles {
        let (tx, ty, span) = tile_world_rect(tile.key);
        let (sx, sy) = vp.world_to_screen(tx, ty);
        let (ex, ey) = vp.world_to_screen(tx + span, ty + span);
        // Snap to the pixel grid: floor start, ceil end, so adjacent tiles
        // overlap by 0-1px instead of showing sub-pixel seams.
        let sx = sx.floor();
        let sy = sy.floor();
        let sw = ex.ceil() - sx;
        let sh = ey.ceil() - sy;

        if sx + sw < 0.0 || sy + sh < 0.0 || sx > w || sy > h {
            continue;
        }
        ctx.draw_image_with_html_image_element_and_dw_and_dh(&tile.image, sx, sy, sw, sh)
            .ok();
    }
    ctx.set_image_smoothing_enabled(true);
}

fn shape_on_screen(shape: &WardShape, vp: &Viewport, w: f64, h: f64) -> bool {
    let (sx0, sy0) = vp.world_to_screen(shape.bbox.0, shape.bbox.1);
    let (sx1, sy1) = vp.world_to_screen(shape.bbox.2, shape.bbox.3);
    sx1 >= 0.0 && sy1 >= 0.0 && sx0 <= w && sy0 <= h
}

fn trace_shape(ctx: &CanvasRenderingContext2d, shape: &WardShape, vp: &Viewport) {
    ctx.begin_path();
    for ring in &shape.rings {
        let mut points = ring.iter();
        let Some(&(wx, wy)) = points.next() else {
            continue;
        };
        let (sx, sy) = vp.world_to_screen(wx, wy);
        ctx.move_to(sx, sy);
        for &(wx, wy) in points {
            let (sx, sy) = vp.world_to_screen(wx, wy);
            ctx.line_to(sx, sy);
        }
        ctx.close_path();
    }
}

fn draw_wards(
    ctx: &CanvasRenderingContext2d,
    w: f64,
    h: f64,
    vp: &Viewport,
    session: &MapSession,
    show_all: bool,
    show_top: bool,
) {
    let all = show_all.then_some(&session.layers.all[..]).unwrap_or(&[]);
    let top = show_top.then_some(&session.layers.top[..]).unwrap_or(&[]);
    // "all" underneath, "top" above, both in their stored draw order.
    for shape in all.iter().chain(top.iter()) {
        if !shape_on_screen(shape, vp, w, h) {
            continue;
        }
        trace_shape(ctx, shape, vp);
        ctx.set_fill_style_str(&rgba_css(shape.fill, shape.fill_opacity));
        ctx.fill_with_canvas_winding_rule(web_sys::CanvasWindingRule::Evenodd);
        ctx.set_stroke_style_str(shape.stroke);
        ctx.set_line_width(shape.stroke_weight);
        ctx.stroke();
    }
}

fn draw_labels(
    ctx: &CanvasRenderingContext2d,
    w: f64,
    h: f64,
    vp: &Viewport,
    session: &MapSession,
    show_all: bool,
    show_top: bool,
) {
    let shapes = if show_all {
        &session.layers.all[..]
    } else if show_top {
        &session.layers.top[..]
    } else {
        return;
    };
    ctx.set_font(LABEL_FONT);
    ctx.set_text_align("center");
    ctx.set_text_baseline("middle");
    ctx.set_line_width(3.0);
    ctx.set_stroke_style_str("rgba(255, 255, 255, 0.85)");
    ctx.set_fill_style_str("#222");
    for shape in shapes {
        if !shape_on_screen(shape, vp, w, h) {
            continue;
        }
        let (sx, sy) = vp.world_to_screen(shape.label_anchor.0, shape.label_anchor.1);
        ctx.stroke_text(&shape.ward, sx, sy).ok();
        ctx.fill_text(&shape.ward, sx, sy).ok();
    }
}

fn draw_markers(
    ctx: &CanvasRenderingContext2d,
    w: f64,
    h: f64,
    vp: &Viewport,
    sites: &[PlantationSite],
    with_names: bool,
) {
    for site in sites {
        let (wx, wy) = crate::geo::project(site.lon, site.lat);
        let (sx, sy) = vp.world_to_screen(wx, wy);
        if sx < -MARKER_RADIUS || sy < -MARKER_RADIUS || sx > w + MARKER_RADIUS || sy > h + MARKER_RADIUS
        {
            continue;
        }
        ctx.begin_path();
        ctx.arc(sx, sy, MARKER_RADIUS, 0.0, std::f64::consts::TAU).ok();
        ctx.set_fill_style_str(&rgb_css((27, 94, 32)));
        ctx.fill();
        ctx.set_line_width(1.5);
        ctx.set_stroke_style_str("#fff");
        ctx.stroke();

        if with_names && let Some(name) = &site.name {
            ctx.set_font(LABEL_FONT);
            ctx.set_text_align("left");
            ctx.set_text_baseline("middle");
            ctx.set_line_width(3.0);
            ctx.set_stroke_style_str("rgba(255, 255, 255, 0.85)");
            ctx.stroke_text(name, sx + MARKER_RADIUS + 3.0, sy).ok();
            ctx.set_fill_style_str("#1b5e20");
            ctx.fill_text(name, sx + MARKER_RADIUS + 3.0, sy).ok();
            ctx.set_fill_style_str(&rgb_css((27, 94, 32)));
        }
    }
}
