use crate::geo;

/// Viewport manages the pan/zoom transformation from world coordinates
/// (zoom-0 Web-Mercator pixels) to screen coordinates.
///
/// `scale` is screen pixels per world pixel, so `log2(scale)` is the usual
/// slippy-map zoom level.
#[derive(Debug, Clone, PartialEq)]
pub struct Viewport {
    pub offset_x: f64,
    pub offset_y: f64,
    pub scale: f64,
}

const MIN_SCALE: f64 = 8.0; // zoom 3
const MAX_SCALE: f64 = 524_288.0; // zoom 19
const ZOOM_SENSITIVITY: f64 = 0.001;

/// Startup view before the first dataset arrives: Ahmedabad at zoom 11.
pub const INITIAL_CENTER: (f64, f64) = (72.58, 23.03);
pub const INITIAL_ZOOM: f64 = 11.0;

impl Default for Viewport {
    fn default() -> Self {
        Self {
            offset_x: 0.0,
            offset_y: 0.0,
            scale: 2f64.powf(INITIAL_ZOOM),
        }
    }
}

impl Viewport {
    /// Slippy-map zoom level equivalent of the current scale.
    pub fn zoom(&self) -> f64 {
        self.scale.log2()
    }

    /// Convert world coordinates to screen coordinates.
    pub fn world_to_screen(&self, wx: f64, wy: f64) -> (f64, f64) {
        (
            wx * self.scale + self.offset_x,
            wy * self.scale + self.offset_y,
        )
    }

    /// Convert screen coordinates to world coordinates.
    pub fn screen_to_world(&self, sx: f64, sy: f64) -> (f64, f64) {
        (
            (sx - self.offset_x) / self.scale,
            (sy - self.offset_y) / self.scale,
        )
    }

    /// Zoom toward a focus point (screen coordinates).
    pub fn zoom_at(&mut self, delta: f64, screen_x: f64, screen_y: f64) {
        let factor = (-delta * ZOOM_SENSITIVITY).exp();
        let new_scale = (self.scale * factor).clamp(MIN_SCALE, MAX_SCALE);
        let ratio = new_scale / self.scale;

        // Adjust offset so the point under the cursor stays fixed
        self.offset_x = screen_x - (screen_x - self.offset_x) * ratio;
        self.offset_y = screen_y - (screen_y - self.offset_y) * ratio;
        self.scale = new_scale;
    }

    /// Pan by screen-space delta.
    pub fn pan(&mut self, dx: f64, dy: f64) {
        self.offset_x += dx;
        self.offset_y += dy;
    }

    /// Center the viewport on a lon/lat point at a given zoom level.
    pub fn center_on(&mut self, lon: f64, lat: f64, zoom: f64, canvas_w: f64, canvas_h: f64) {
        let (wx, wy) = geo::project(lon, lat);
        self.scale = 2f64.powf(zoom).clamp(MIN_SCALE, MAX_SCALE);
        self.offset_x = canvas_w / 2.0 - wx * self.scale;
        self.offset_y = canvas_h / 2.0 - wy * self.scale;
    }

    /// Fit the viewport to show the given world-coordinate bounds with padding.
    pub fn fit_bounds(
        &mut self,
        min_x: f64,
        min_y: f64,
        max_x: f64,
        max_y: f64,
        canvas_w: f64,
        canvas_h: f64,
    ) {
        let world_w = max_x - min_x;
        let world_h = max_y - min_y;

        if world_w <= 0.0 || world_h <= 0.0 || canvas_w <= 0.0 || canvas_h <= 0.0 {
            return;
        }

        let padding = 0.05;
        let scale_x = canvas_w / (world_w * (1.0 + padding * 2.0));
        let scale_y = canvas_h / (world_h * (1.0 + padding * 2.0));
        self.scale = scale_x.min(scale_y).clamp(MIN_SCALE, MAX_SCALE);

        let center_x = (min_x + max_x) / 2.0;
        let center_y = (min_y + max_y) / 2.0;
        self.offset_x = canvas_w / 2.0 - center_x * self.scale;
        self.offset_y = canvas_h / 2.0 - center_y * self.scale;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn screen_world_roundtrip() {
        let vp = Viewport {
            offset_x: 120.0,
            offset_y: -40.0,
            scale: 2048.0,
        };
        let (wx, wy) = vp.screen_to_world(333.0, 444.0);
        let (sx, sy) = vp.world_to_screen(wx, wy);
        assert!((sx - 333.0).abs() < 1e-9);
        assert!((sy - 444.0).abs() < 1e-9);
    }

    #[test]
    fn zoom_at_keeps_focus_point_fixed() {
        let mut vp = Viewport::default();
        let focus = (400.0, 300.0);
        let before = vp.screen_to_world(focus.0, focus.1);
        vp.zoom_at(-250.0, focus.0, focus.1);
        let after = vp.screen_to_world(focus.0, focus.1);
        assert!((before.0 - after.0).abs() < 1e-9);
        assert!((before.1 - after.1).abs() < 1e-9);
        assert!(vp.scale > 2048.0);
    }

    #[test]
    fn zoom_is_clamped() {
        let mut vp = Viewport::default();
        vp.zoom_at(1e9, 0.0, 0.0);
        assert_eq!(vp.scale, MIN_SCALE);
        vp.zoom_at(-1e9, 0.0, 0.0);
        assert_eq!(vp.scale, MAX_SCALE);
    }

    #[test]
    fn fit_bounds_centers_and_contains_the_rect() {
        let mut vp = Viewport::default();
        vp.fit_bounds(10.0, 20.0, 12.0, 21.0, 800.0, 600.0);
        let (sx0, sy0) = vp.world_to_screen(10.0, 20.0);
        let (sx1, sy1) = vp.world_to_screen(12.0, 21.0);
        assert!(sx0 >= 0.0 && sy0 >= 0.0);
        assert!(sx1 <= 800.0 && sy1 <= 600.0);
        // Centered: midpoint maps to canvas midpoint.
        let (cx, cy) = vp.world_to_screen(11.0, 20.5);
        assert!((cx - 400.0).abs() < 1e-6);
        assert!((cy - 300.0).abs() < 1e-6);
    }

    #[test]
    fn fit_bounds_ignores_degenerate_input() {
        let mut vp = Viewport::default();
        let before = vp.clone();
        vp.fit_bounds(5.0, 5.0, 5.0, 9.0, 800.0, 600.0);
        assert_eq!(vp, before);
    }

    #[test]
    fn center_on_puts_the_point_mid_canvas() {
        let mut vp = Viewport::default();
        vp.center_on(INITIAL_CENTER.0, INITIAL_CENTER.1, INITIAL_ZOOM, 800.0, 600.0);
        let (wx, wy) = crate::geo::project(INITIAL_CENTER.0, INITIAL_CENTER.1);
        let (sx, sy) = vp.world_to_screen(wx, wy);
        assert!((sx - 400.0).abs() < 1e-6);
        assert!((sy - 300.0).abs() < 1e-6);
        assert!((vp.zoom() - INITIAL_ZOOM).abs() < 1e-9);
    }
}
