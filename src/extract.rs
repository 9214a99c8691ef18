//! Field extraction from robot API responses.
//!
//! These work on the `data` object returned by a query, already parsed into
//! `serde_json::Value`, and report a missing match as [`ExtractError::NotFound`].

use chrono::{DateTime, FixedOffset};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::error::ExtractError;

/// ID of the mission report with the latest `startTimestamp`.
///
/// Expects `missionReports.page.edges[].node { id, startTimestamp }` with RFC 3339
/// timestamps. On equal timestamps the earlier entry wins.
#[instrument(skip(response))]
pub fn latest_mission_report_id(response: &Value) -> Result<String, ExtractError> {
    let edges = response
        .pointer("/missionReports/page/edges")
        .and_then(Value::as_array)
        .ok_or_else(|| ExtractError::Malformed("missing missionReports.page.edges".to_string()))?;

    let mut latest: Option<(DateTime<FixedOffset>, &str)> = None;
    for (index, edge) in edges.iter().enumerate() {
        let id = edge
            .pointer("/node/id")
            .and_then(Value::as_str)
            .ok_or_else(|| ExtractError::Malformed(format!("edge {index} has no node.id")))?;
        let raw = edge
            .pointer("/node/startTimestamp")
            .and_then(Value::as_str)
            .ok_or_else(|| ExtractError::Malformed(format!("report {id} has no startTimestamp")))?;
        let started = DateTime::parse_from_rfc3339(raw)
            .map_err(|e| ExtractError::Malformed(format!("report {id} has timestamp '{raw}': {e}")))?;

        if latest.map_or(true, |(best, _)| started > best) {
            latest = Some((started, id));
        }
    }

    let (started, id) = latest.ok_or_else(|| ExtractError::NotFound("mission reports".to_string()))?;
    debug!(report_id = %id, started = %started, reports = edges.len(), "Selected latest mission report");
    Ok(id.to_string())
}

/// URI of the first data payload captured for the point of interest `poi_name`.
///
/// Expects `missionReport.dataPayloads[] { poiName, uri }`. Payloads of the
/// POI without a `uri` (readings rather than media) are skipped.
#[instrument(skip(response))]
pub fn inspection_uri_for_poi(response: &Value, poi_name: &str) -> Result<String, ExtractError> {
    let payloads = response
        .pointer("/missionReport/dataPayloads")
        .and_then(Value::as_array)
        .ok_or_else(|| ExtractError::Malformed("missing missionReport.dataPayloads".to_string()))?;

    let mut matched = payloads
        .iter()
        .filter(|payload| payload.get("poiName").and_then(Value::as_str) == Some(poi_name))
        .peekable();
    if matched.peek().is_none() {
        return Err(ExtractError::NotFound(format!("point of interest '{poi_name}'")));
    }

    matched
        .find_map(|payload| payload.get("uri").and_then(Value::as_str))
        .map(str::to_string)
        .ok_or_else(|| ExtractError::Malformed(format!("point of interest '{poi_name}' has no uri")))
}
