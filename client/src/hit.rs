use crate::layers::{LayerKind, LayerSet, WardShape};

/// Even-odd point-in-polygon over a shape's flattened rings, matching the
/// canvas "evenodd" fill rule, so a click in a hole misses the ward.
pub fn point_in_rings(rings: &[Vec<(f64, f64)>], x: f64, y: f64) -> bool {
    let mut inside = false;
    for ring in rings {
        let n = ring.len();
        if n < 3 {
            continue;
        }
        let mut j = n - 1;
        for i in 0..n {
            let (xi, yi) = ring[i];
            let (xj, yj) = ring[j];
            if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
                inside = !inside;
            }
            j = i;
        }
    }
    inside
}

fn shape_contains(shape: &WardShape, x: f64, y: f64) -> bool {
    let (min_x, min_y, max_x, max_y) = shape.bbox;
    if x < min_x || x > max_x || y < min_y || y > max_y {
        return false;
    }
    point_in_rings(&shape.rings, x, y)
}

/// Find the ward under a world coordinate, honoring draw order: the top
/// collection sits above "all", and within a collection later shapes draw
/// above earlier ones.
pub fn hit_test<'a>(layers: &'a LayerSet, wx: f64, wy: f64) -> Option<&'a WardShape> {
    hit_test_visible(layers, wx, wy, true, true)
}

/// `hit_test` restricted to the collections currently shown; a hidden
/// layer group cannot swallow clicks.
pub fn hit_test_visible<'a>(
    layers: &'a LayerSet,
    wx: f64,
    wy: f64,
    show_all: bool,
    show_top: bool,
) -> Option<&'a WardShape> {
    layers
        .hit_order()
        .filter(|shape| match shape.kind {
            LayerKind::All => show_all,
            LayerKind::Top => show_top,
        })
        .find(|shape| shape_contains(shape, wx, wy))
}
