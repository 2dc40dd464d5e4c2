use wardmap_shared::LonLatBounds;

/// World-space edge length at zoom 0, in Web-Mercator pixels.
/// One slippy tile at zoom `z` covers `WORLD_SIZE / 2^z` world units.
pub const WORLD_SIZE: f64 = 256.0;

/// Web-Mercator latitude cutoff.
const MAX_LAT: f64 = 85.051_128_78;

/// Project lon/lat into zoom-0 world pixels (x right, y down).
pub fn project(lon: f64, lat: f64) -> (f64, f64) {
    let x = (lon + 180.0) / 360.0 * WORLD_SIZE;
    let lat = lat.clamp(-MAX_LAT, MAX_LAT);
    let s = lat.to_radians().sin();
    let y = (0.5 - ((1.0 + s) / (1.0 - s)).ln() / (4.0 * std::f64::consts::PI)) * WORLD_SIZE;
    (x, y)
}

/// Project a lon/lat bbox into a world-space rect `(min_x, min_y, max_x, max_y)`.
/// Latitude flips under projection, so the corners swap on y.
pub fn project_bounds(bounds: LonLatBounds) -> (f64, f64, f64, f64) {
    let (min_x, max_y) = project(bounds.min_lon, bounds.min_lat);
    let (max_x, min_y) = project(bounds.max_lon, bounds.max_lat);
    (min_x, min_y, max_x, max_y)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equator_meridian_is_world_center() {
        let (x, y) = project(0.0, 0.0);
        assert!((x - WORLD_SIZE / 2.0).abs() < 1e-9);
        assert!((y - WORLD_SIZE / 2.0).abs() < 1e-9);
    }

    #[test]
    fn projection_axes_point_right_and_down() {
        let (x0, y0) = project(72.0, 23.0);
        let (x1, y1) = project(73.0, 23.0);
        let (x2, y2) = project(72.0, 24.0);
        assert!(x1 > x0);
        assert!((y1 - y0).abs() < 1e-12);
        assert!(y2 < y0, "north must project to smaller y");
        assert!((x2 - x0).abs() < 1e-12);
    }

    #[test]
    fn poles_are_clamped() {
        let (_, y_north) = project(0.0, 90.0);
        let (_, y_south) = project(0.0, -90.0);
        assert!(y_north.is_finite() && y_south.is_finite());
        assert!(y_north >= 0.0 && y_south <= WORLD_SIZE);
    }

    #[test]
    fn projected_bounds_keep_min_below_max() {
        let bounds = LonLatBounds {
            min_lon: 72.4,
            min_lat: 22.9,
            max_lon: 72.8,
            max_lat: 23.2,
        };
        let (min_x, min_y, max_x, max_y) = project_bounds(bounds);
        assert!(min_x < max_x);
        assert!(min_y < max_y);
    }
}
