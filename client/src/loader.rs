use chrono::{DateTime, Utc};

use wardmap_shared::{ColorBreakpoints, WardDataset, parse_ward_collection};

/// The priority backend is opaque to us: one POST, one feature collection.
pub const WARD_PRIORITY_ENDPOINT: &str = "/ward-priority";

/// Everything one successful load produces. Consumed whole by the session
/// swap — there is no partial application of a load.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadOutcome {
    pub dataset: WardDataset,
    /// Quantile thresholds over this load's score distribution; `None` for
    /// an empty (or scoreless) dataset.
    pub breakpoints: Option<ColorBreakpoints>,
    /// Malformed features dropped during normalization.
    pub skipped: usize,
    pub fetched_at: DateTime<Utc>,
}

/// Pure half of the loader: body text in, outcome out.
pub fn outcome_from_body(body: &str, fetched_at: DateTime<Utc>) -> Result<LoadOutcome, String> {
    let parsed = parse_ward_collection(body, fetched_at)?;
    let breakpoints = ColorBreakpoints::from_scores(parsed.dataset.scores());
    Ok(LoadOutcome {
        dataset: parsed.dataset,
        breakpoints,
        skipped: parsed.skipped,
        fetched_at,
    })
}

/// Fetch and normalize the ward-priority snapshot.
///
/// Any transport error, non-2xx status, or unparseable payload is a load
/// failure; the caller keeps whatever it was showing before.
pub async fn load_ward_priority() -> Result<LoadOutcome, String> {
    let resp = gloo_net::http::Request::post(WARD_PRIORITY_ENDPOINT)
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
    outcome_from_body(&body, Utc::now())
}
