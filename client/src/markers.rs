use wardmap_shared::{PlantationSite, parse_plantation_points};

pub const PLANTATION_POINTS_URL: &str = "/points.geojson";

/// Recommended plantation sites, fetched on demand when the user asks to
/// see them. Broken point features are dropped by the parser; only a
/// transport failure or an unusable body surfaces as an error.
pub async fn fetch_plantation_sites() -> Result<Vec<PlantationSite>, String> {
    let resp = gloo_net::http::Request::get(PLANTATION_POINTS_URL)
        .send()
        .await
        .map_err(|e| format!("fetch error: {e}"))?;
    if !resp.ok() {
        return Err(format!("HTTP {}", resp.status()));
    }
    let body = resp
        .text()
        .await
        .map_err(|e| format!("read error: {e}"))?;
    parse_plantation_points(&body)
}
