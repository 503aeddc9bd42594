// Upstream access to the STIB-MIVB real-time waiting times dataset
//
// Endpoint: https://data.stib-mivb.be/api/explore/v2.1/catalog/datasets/waiting-time-rt-production/records
// Query:    apikey=<key>&where=pointid IN ("1001","1002")&limit=100
use crate::sat_models::{Notice, RawArrivalRecord, Result, SATError};
use log::{debug, error, warn};
use reqwest::blocking;
use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_API_URL: &str =
    "https://data.stib-mivb.be/api/explore/v2.1/catalog/datasets/waiting-time-rt-production/records";

/// Result cap sent with every request.
pub const RESULT_LIMIT: u32 = 100;

/// Anything able to return the raw waiting-time records for a set of points.
pub trait ArrivalSource {
    fn fetch_raw(&self, point_ids: &[String]) -> Result<Vec<RawArrivalRecord>>;
}

#[derive(Debug, Deserialize)]
struct RecordsResponse {
    #[serde(default)]
    results: Vec<serde_json::Value>,
}

pub struct StibApiClient {
    client: blocking::Client,
    api_url: String,
    api_key: String,
    timeout_secs: u64,
}

impl StibApiClient {
    pub fn new(api_url: impl Into<String>, api_key: impl Into<String>, timeout_secs: u64) -> Result<Self> {
        let client = blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| SATError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_url: api_url.into(),
            api_key: api_key.into(),
            timeout_secs,
        })
    }
}

impl ArrivalSource for StibApiClient {
    fn fetch_raw(&self, point_ids: &[String]) -> Result<Vec<RawArrivalRecord>> {
        let where_clause = build_where_clause(point_ids);
        let limit = RESULT_LIMIT.to_string();
        debug!("GET {} where {}", self.api_url, where_clause);

        let response = self
            .client
            .get(&self.api_url)
            .query(&[
                ("apikey", self.api_key.as_str()),
                ("where", where_clause.as_str()),
                ("limit", limit.as_str()),
            ])
            .send()
            .map_err(|e| self.transport_error(e))?;

        if !response.status().is_success() {
            return Err(SATError::Status(response.status()));
        }

        let body = response.text().map_err(|e| self.transport_error(e))?;
        decode_records(&body)
    }
}

impl StibApiClient {
    /// The request URL carries the API key, so it never reaches the message.
    fn transport_error(&self, e: reqwest::Error) -> SATError {
        if e.is_timeout() {
            SATError::Timeout(self.timeout_secs)
        } else {
            SATError::Network(e.without_url().to_string())
        }
    }
}

/// `pointid IN ("id1","id2",...)`
pub fn build_where_clause(point_ids: &[String]) -> String {
    let quoted: Vec<String> = point_ids.iter().map(|id| format!("\"{}\"", id)).collect();
    format!("pointid IN ({})", quoted.join(","))
}

/// Decodes a records response body. Results that are not shaped like a
/// waiting-time record are dropped individually.
pub fn decode_records(body: &str) -> Result<Vec<RawArrivalRecord>> {
    let response: RecordsResponse = serde_json::from_str(body)
        .map_err(|e| SATError::Parse(format!("Invalid JSON response: {}", e)))?;

    let records = response
        .results
        .into_iter()
        .filter_map(|value| match serde_json::from_value::<RawArrivalRecord>(value) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!("Skipping malformed waiting-time record: {}", e);
                None
            }
        })
        .collect();

    Ok(records)
}

/// Fetches raw records, turning any failure into a notice and an empty result.
///
/// No retry happens here; the next tick calls again.
pub fn fetch(
    source: &dyn ArrivalSource,
    point_ids: &[String],
    notices: &mut Vec<Notice>,
) -> Vec<RawArrivalRecord> {
    match source.fetch_raw(point_ids) {
        Ok(records) => {
            debug!("Fetched {} waiting-time records", records.len());
            if records.len() >= RESULT_LIMIT as usize {
                warn!("Result limit of {} reached", RESULT_LIMIT);
                notices.push(Notice::warning(format!(
                    "Result limit of {} reached, some arrivals may be missing",
                    RESULT_LIMIT
                )));
            }
            records
        }
        Err(e) => {
            error!("API error: {}", e);
            notices.push(Notice::error(format!("API error: {}", e)));
            Vec::new()
        }
    }
}
