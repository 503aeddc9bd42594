// Data model for the STIB Arrivals Tracker
// Upstream data: STIB-MIVB open data portal (https://data.stib-mivb.be/)
//
// - Waiting times: datasets/waiting-time-rt-production/records
// - Stops: gtfs-stops-production.csv (semicolon separated export from the portal)

use chrono::DateTime;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Reference time zone for every instant the tracker shows or compares.
pub const BRUSSELS: Tz = chrono_tz::Europe::Brussels;

pub type Instant = DateTime<Tz>;

// ============================================================================
// Data Structures
// ============================================================================

/// A human-named stop aggregating one or more boarding posts.
///
/// `point_ids` and `coordinates` are index-aligned: `coordinates[i]` is the
/// location of the post `point_ids[i]`.
#[derive(Debug, Clone, PartialEq)]
pub struct StopRecord {
    pub name: String,
    pub point_ids: Vec<String>,
    pub coordinates: Vec<(f64, f64)>,
}

/// One result row of the waiting-time dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawArrivalRecord {
    pub pointid: String,
    pub lineid: String,
    /// JSON-encoded list of [`PassingTime`]; decoded lazily by the normalizer.
    #[serde(default = "empty_passing_times")]
    pub passingtimes: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn empty_passing_times() -> String {
    "[]".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct PassingTime {
    #[serde(rename = "expectedArrivalTime", default)]
    pub expected_arrival_time: Option<String>,
    /// Destination label keyed by language code (`fr`, `nl`, ...).
    #[serde(default)]
    pub destination: serde_json::Value,
}

/// One predicted vehicle arrival, resolved against the stop catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedArrival {
    pub line: String,
    pub destination: String,
    pub stop_name: String,
    pub arrival: Instant,
    pub seconds_left: i64,
}

/// A presentation row. Field order on screen follows [`DisplayRow::FIELDS`].
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayRow {
    pub line: String,
    pub destination: String,
    pub expected_arrival: String,
    pub time_left: String,
    pub seconds_left: i64,
    pub color: String,
}

impl DisplayRow {
    pub const FIELDS: [&'static str; 4] = ["Line", "Destination", "Expected Arrival", "Time Left"];

    pub fn cells(&self) -> [&str; 4] {
        [
            self.line.as_str(),
            self.destination.as_str(),
            self.expected_arrival.as_str(),
            self.time_left.as_str(),
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapMarker {
    pub stop_name: String,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapView {
    pub markers: Vec<MapMarker>,
    pub zoom: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// A user-visible notification attached to the frame of the tick that raised it.
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Info, message: message.into() }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Warning, message: message.into() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Error, message: message.into() }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let icon = match self.level {
            NoticeLevel::Info => "ℹ️ ",
            NoticeLevel::Warning => "⚠️ ",
            NoticeLevel::Error => "❌",
        };
        write!(f, "{} {}", icon, self.message)
    }
}

// ============================================================================
// Error Handling
// ============================================================================

#[derive(Debug, Error)]
pub enum SATError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("API returned error: {0}")]
    Status(reqwest::StatusCode),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("File error: {0}")]
    File(String),

    #[error("Invalid coordinates {value:?} for stop {name:?}")]
    InvalidCoordinates { name: String, value: String },

    #[error("Point {point_id} is claimed by both {first:?} and {second:?}")]
    DuplicatePoint {
        point_id: String,
        first: String,
        second: String,
    },

    #[error("Unknown stop: {0}")]
    UnknownStop(String),

    #[error("Time window must be between 1 and 60 minutes, got {0}")]
    InvalidWindow(u32),
}

impl From<csv::Error> for SATError {
    fn from(e: csv::Error) -> Self {
        SATError::File(e.to_string())
    }
}

impl From<serde_json::Error> for SATError {
    fn from(e: serde_json::Error) -> Self {
        SATError::Parse(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SATError>;
