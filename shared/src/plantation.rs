use serde::Deserialize;
use serde_json::Value;

/// A candidate tree-plantation location from the static points asset.
#[derive(Debug, Clone, PartialEq)]
pub struct PlantationSite {
    pub lon: f64,
    pub lat: f64,
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawPoints {
    features: Vec<RawPoint>,
}

#[derive(Debug, Deserialize)]
struct RawPoint {
    #[serde(default)]
    geometry: Value,
    #[serde(default)]
    properties: Value,
}

/// Parse `points.geojson`. Non-point or broken features are dropped
/// silently; the asset is decorative and must never take the map down.
pub fn parse_plantation_points(body: &str) -> Result<Vec<PlantationSite>, String> {
    let raw: RawPoints =
        serde_json::from_str(body).map_err(|e| format!("malformed points payload: {e}"))?;

    Ok(raw
        .features
        .into_iter()
        .filter_map(|feature| {
            let geometry = feature.geometry.as_object()?;
            if geometry.get("type")?.as_str()? != "Point" {
                return None;
            }
            let coords = geometry.get("coordinates")?.as_array()?;
            let lon = coords.first()?.as_f64()?;
            let lat = coords.get(1)?.as_f64()?;
            if !lon.is_finite() || !lat.is_finite() {
                return None;
            }
            let name = feature
                .properties
                .get("name")
                .and_then(Value::as_str)
                .map(str::to_string);
            Some(PlantationSite { lon, lat, name })
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_named_and_unnamed_points() {
        let body = r#"{"features":[
            {"geometry":{"type":"Point","coordinates":[72.58,23.03]},"properties":{"name":"Riverfront"}},
            {"geometry":{"type":"Point","coordinates":[72.60,23.05]},"properties":{}}
        ]}"#;
        let sites = parse_plantation_points(body).expect("valid payload");
        assert_eq!(sites.len(), 2);
        assert_eq!(sites[0].name.as_deref(), Some("Riverfront"));
        assert_eq!(sites[1].name, None);
        assert_eq!(sites[1].lon, 72.60);
    }

    #[test]
    fn non_point_features_are_dropped() {
        let body = r#"{"features":[
            {"geometry":{"type":"Polygon","coordinates":[[[0,0],[1,0],[1,1]]]},"properties":{}},
            {"geometry":null,"properties":{"name":"Broken"}},
            {"geometry":{"type":"Point","coordinates":[72.58,23.03]},"properties":{}}
        ]}"#;
        let sites = parse_plantation_points(body).expect("valid payload");
        assert_eq!(sites.len(), 1);
    }

    #[test]
    fn malformed_body_is_an_error() {
        assert!(parse_plantation_points("{}").is_err());
        assert!(parse_plantation_points("nope").is_err());
    }
}
