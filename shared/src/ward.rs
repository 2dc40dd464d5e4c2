use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Fallback when the backend failed to normalize a ward name into properties.
pub const UNKNOWN_WARD: &str = "Unknown Ward";

/// Properties attached to one ward polygon by the priority backend.
///
/// `ward_name` is the ward's identity within a dataset snapshot; `p75` is the
/// heat-priority score (75th percentile of the vulnerability composite over
/// the ward's area). Everything else the backend attaches (population, mean
/// bands, source columns) is carried opaquely in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WardProperties {
    #[serde(default = "default_ward_name")]
    pub ward_name: String,
    #[serde(default)]
    pub p75: Option<f64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

fn default_ward_name() -> String {
    UNKNOWN_WARD.to_string()
}

impl Default for WardProperties {
    fn default() -> Self {
        Self {
            ward_name: default_ward_name(),
            p75: None,
            extra: serde_json::Map::new(),
        }
    }
}

/// Lon/lat axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LonLatBounds {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl LonLatBounds {
    pub fn merge(self, other: LonLatBounds) -> LonLatBounds {
        LonLatBounds {
            min_lon: self.min_lon.min(other.min_lon),
            min_lat: self.min_lat.min(other.min_lat),
            max_lon: self.max_lon.max(other.max_lon),
            max_lat: self.max_lat.max(other.max_lat),
        }
    }

    fn from_rings(rings: &[Vec<[f64; 2]>]) -> Option<LonLatBounds> {
        let mut bounds: Option<LonLatBounds> = None;
        for ring in rings {
            for &[lon, lat] in ring {
                let point = LonLatBounds {
                    min_lon: lon,
                    min_lat: lat,
                    max_lon: lon,
                    max_lat: lat,
                };
                bounds = Some(match bounds {
                    Some(b) => b.merge(point),
                    None => point,
                });
            }
        }
        bounds
    }
}

/// Ward polygon geometry, flattened to a list of lon/lat rings.
///
/// MultiPolygons are flattened too: with even-odd filling the outer/hole
/// distinction is carried by the rings themselves, so one flat list is
/// sufficient for both drawing and hit-testing.
#[derive(Debug, Clone, PartialEq)]
pub struct WardGeometry {
    pub rings: Vec<Vec<[f64; 2]>>,
}

/// One ward from a dataset snapshot: immutable geometry plus backend
/// properties, with a precomputed lon/lat bbox.
#[derive(Debug, Clone, PartialEq)]
pub struct WardFeature {
    pub geometry: WardGeometry,
    pub properties: WardProperties,
    pub bbox: LonLatBounds,
}

impl WardFeature {
    pub fn name(&self) -> &str {
        &self.properties.ward_name
    }

    /// Priority score; NaN when the backend omitted it.
    pub fn score(&self) -> f64 {
        self.properties.p75.unwrap_or(f64::NAN)
    }
}

/// One load's worth of wards. Immutable once built; a reload replaces the
/// whole dataset rather than patching it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WardDataset {
    features: Vec<WardFeature>,
    pub loaded_at: Option<DateTime<Utc>>,
}

impl WardDataset {
    pub fn features(&self) -> &[WardFeature] {
        &self.features
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn bounds(&self) -> Option<LonLatBounds> {
        self.features
            .iter()
            .map(|f| f.bbox)
            .reduce(LonLatBounds::merge)
    }

    /// Iterator over every feature's score; unscored wards yield NaN, which
    /// downstream consumers filter as they see fit.
    pub fn scores(&self) -> impl Iterator<Item = f64> + '_ {
        self.features.iter().map(|f| f.score())
    }
}

/// Result of normalizing a raw feature collection: the usable dataset plus
/// how many malformed features were dropped on the floor.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseOutcome {
    pub dataset: WardDataset,
    pub skipped: usize,
}

#[derive(Debug, Clone, Deserialize)]
struct RawCollection {
    features: Vec<RawFeature>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawFeature {
    #[serde(default)]
    geometry: Value,
    #[serde(default)]
    properties: Option<WardProperties>,
}

/// Parse the ward-priority response body.
///
/// The payload must be a feature collection (`{ "features": [...] }`);
/// anything else is a load failure. Individual features with missing or
/// unusable geometry are skipped and counted, not fatal.
pub fn parse_ward_collection(
    body: &str,
    loaded_at: DateTime<Utc>,
) -> Result<ParseOutcome, String> {
    let raw: RawCollection =
        serde_json::from_str(body).map_err(|e| format!("malformed ward payload: {e}"))?;

    let mut features = Vec::with_capacity(raw.features.len());
    let mut skipped = 0usize;
    for feature in raw.features {
        match normalize_feature(feature) {
            Some(f) => features.push(f),
            None => skipped += 1,
        }
    }

    Ok(ParseOutcome {
        dataset: WardDataset {
            features,
            loaded_at: Some(loaded_at),
        },
        skipped,
    })
}

fn normalize_feature(raw: RawFeature) -> Option<WardFeature> {
    let geometry = geometry_from_value(&raw.geometry)?;
    let bbox = LonLatBounds::from_rings(&geometry.rings)?;
    Some(WardFeature {
        geometry,
        properties: raw.properties.unwrap_or_default(),
        bbox,
    })
}

fn geometry_from_value(value: &Value) -> Option<WardGeometry> {
    let obj = value.as_object()?;
    let kind = obj.get("type")?.as_str()?;
    let coordinates = obj.get("coordinates")?;

    let mut rings = Vec::new();
    match kind {
        "Polygon" => collect_rings(coordinates, &mut rings)?,
        "MultiPolygon" => {
            for polygon in coordinates.as_array()? {
                collect_rings(polygon, &mut rings)?;
            }
        }
        _ => return None,
    }

    // A ring needs at least a triangle to enclose anything.
    rings.retain(|ring: &Vec<[f64; 2]>| ring.len() >= 3);
    if rings.is_empty() {
        return None;
    }
    Some(WardGeometry { rings })
}

fn collect_rings(polygon: &Value, out: &mut Vec<Vec<[f64; 2]>>) -> Option<()> {
    for ring in polygon.as_array()? {
        let positions = ring.as_array()?;
        let mut parsed = Vec::with_capacity(positions.len());
        for position in positions {
            // GeoJSON positions are [lon, lat] with an optional elevation.
            let coords = position.as_array()?;
            let lon = coords.first()?.as_f64()?;
            let lat = coords.get(1)?.as_f64()?;
            if !lon.is_finite() || !lat.is_finite() {
                return None;
            }
            parsed.push([lon, lat]);
        }
        out.push(parsed);
    }
    Some(())
}

/// Indices of the `min(n, len)` highest-scoring wards, descending.
///
/// The sort is stable: ties keep dataset order. NaN scores sort below every
/// real score, so wards without a `p75` can only enter the set when there is
/// room left over.
pub fn top_priority(dataset: &WardDataset, n: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..dataset.len()).collect();
    order.sort_by(|&a, &b| {
        score_desc(
            dataset.features[a].score(),
            dataset.features[b].score(),
        )
    });
    order.truncate(n);
    order
}

fn score_desc(a: f64, b: f64) -> std::cmp::Ordering {
    use std::cmp::Ordering;
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(lon: f64, lat: f64) -> String {
        format!(
            r#"{{"type":"Polygon","coordinates":[[[{lon},{lat}],[{},{lat}],[{},{}],[{lon},{}],[{lon},{lat}]]]}}"#,
            lon + 0.01,
            lon + 0.01,
            lat + 0.01,
            lat + 0.01,
        )
    }

    fn collection(features: &[String]) -> String {
        format!(r#"{{"features":[{}]}}"#, features.join(","))
    }

    fn ward(name: &str, p75: f64, lon: f64, lat: f64) -> String {
        format!(
            r#"{{"geometry":{},"properties":{{"ward_name":"{name}","p75":{p75}}}}}"#,
            square(lon, lat)
        )
    }

    fn parse(body: &str) -> ParseOutcome {
        parse_ward_collection(body, Utc::now()).expect("payload should parse")
    }

    #[test]
    fn parses_polygon_features_with_passthrough_properties() {
        let body = format!(
            r#"{{"features":[{{"geometry":{},"properties":{{"ward_name":"Navrangpura","p75":0.82,"population":51234.0}}}}]}}"#,
            square(72.5, 23.0)
        );
        let outcome = parse(&body);
        assert_eq!(outcome.skipped, 0);
        assert_eq!(outcome.dataset.len(), 1);

        let feature = &outcome.dataset.features()[0];
        assert_eq!(feature.name(), "Navrangpura");
        assert_eq!(feature.score(), 0.82);
        assert_eq!(
            feature.properties.extra.get("population").and_then(Value::as_f64),
            Some(51234.0)
        );
    }

    #[test]
    fn multipolygon_rings_are_flattened() {
        let body = format!(
            r#"{{"features":[{{"geometry":{{"type":"MultiPolygon","coordinates":[[[[0.0,0.0],[1.0,0.0],[1.0,1.0]]],[[[2.0,2.0],[3.0,2.0],[3.0,3.0]]]]}},"properties":{{"ward_name":"Split","p75":0.5}}}}]}}"#,
        );
        let outcome = parse(&body);
        let feature = &outcome.dataset.features()[0];
        assert_eq!(feature.geometry.rings.len(), 2);
        assert_eq!(feature.bbox.max_lon, 3.0);
    }

    #[test]
    fn malformed_geometry_is_skipped_not_fatal() {
        let body = collection(&[
            ward("Good", 0.4, 72.5, 23.0),
            r#"{"geometry":null,"properties":{"ward_name":"NoGeom","p75":0.9}}"#.to_string(),
            r#"{"properties":{"ward_name":"Missing","p75":0.9}}"#.to_string(),
            r#"{"geometry":{"type":"Point","coordinates":[72.5,23.0]},"properties":{"ward_name":"Point","p75":0.9}}"#.to_string(),
        ]);
        let outcome = parse(&body);
        assert_eq!(outcome.dataset.len(), 1);
        assert_eq!(outcome.skipped, 3);
        assert_eq!(outcome.dataset.features()[0].name(), "Good");
    }

    #[test]
    fn degenerate_rings_make_a_feature_malformed() {
        let body = collection(&[
            r#"{"geometry":{"type":"Polygon","coordinates":[[[0.0,0.0],[1.0,1.0]]]},"properties":{"ward_name":"Line","p75":0.2}}"#.to_string(),
        ]);
        let outcome = parse(&body);
        assert_eq!(outcome.dataset.len(), 0);
        assert_eq!(outcome.skipped, 1);
    }

    #[test]
    fn non_collection_payload_is_a_load_failure() {
        assert!(parse_ward_collection("[]", Utc::now()).is_err());
        assert!(parse_ward_collection("{\"wards\":[]}", Utc::now()).is_err());
        assert!(parse_ward_collection("not json", Utc::now()).is_err());
    }

    #[test]
    fn missing_name_and_score_get_defaults() {
        let body = format!(r#"{{"features":[{{"geometry":{}}}]}}"#, square(72.5, 23.0));
        let outcome = parse(&body);
        let feature = &outcome.dataset.features()[0];
        assert_eq!(feature.name(), UNKNOWN_WARD);
        assert!(feature.score().is_nan());
    }

    #[test]
    fn top_priority_is_min_n_len_descending_and_stable() {
        // 12 wards, scores 0.1..=1.2.
        let features: Vec<String> = (0..12)
            .map(|i| ward(&format!("W{i}"), 0.1 + 0.1 * i as f64, 72.5, 23.0 + i as f64 * 0.02))
            .collect();
        let outcome = parse(&collection(&features));
        let top = top_priority(&outcome.dataset, 10);

        assert_eq!(top.len(), 10);
        // Highest score (1.2, index 11) first; 0.1 and 0.2 excluded.
        assert_eq!(top[0], 11);
        assert!(!top.contains(&0));
        assert!(!top.contains(&1));
        for pair in top.windows(2) {
            let a = outcome.dataset.features()[pair[0]].score();
            let b = outcome.dataset.features()[pair[1]].score();
            assert!(a >= b);
        }
    }

    #[test]
    fn top_priority_breaks_ties_by_dataset_order() {
        let outcome = parse(&collection(&[
            ward("A", 0.5, 72.5, 23.0),
            ward("B", 0.5, 72.5, 23.1),
            ward("C", 0.9, 72.5, 23.2),
        ]));
        assert_eq!(top_priority(&outcome.dataset, 3), vec![2, 0, 1]);
    }

    #[test]
    fn top_priority_on_small_dataset_returns_everything() {
        let outcome = parse(&collection(&[ward("A", 0.5, 72.5, 23.0)]));
        assert_eq!(top_priority(&outcome.dataset, 10), vec![0]);
        assert!(top_priority(&WardDataset::default(), 10).is_empty());
    }

    #[test]
    fn nan_scores_sort_after_real_scores() {
        let outcome = parse(&collection(&[
            format!(r#"{{"geometry":{},"properties":{{"ward_name":"NoScore"}}}}"#, square(72.5, 23.0)),
            ward("Low", 0.1, 72.5, 23.1),
        ]));
        assert_eq!(top_priority(&outcome.dataset, 2), vec![1, 0]);
    }

    #[test]
    fn dataset_bounds_cover_all_features() {
        let outcome = parse(&collection(&[
            ward("A", 0.5, 72.5, 23.0),
            ward("B", 0.6, 72.9, 23.4),
        ]));
        let bounds = outcome.dataset.bounds().expect("non-empty dataset");
        assert_eq!(bounds.min_lon, 72.5);
        assert_eq!(bounds.min_lat, 23.0);
        assert!(bounds.max_lon > 72.9);
        assert!(bounds.max_lat > 23.4);
    }
}
