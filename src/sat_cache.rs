// Last-fetch cache with staleness check and change suppression
use crate::sat_models::{Instant, RawArrivalRecord};
use chrono::Duration;
use log::{debug, warn};
use std::collections::BTreeSet;

pub const DEFAULT_REFRESH_SECS: i64 = 30;

/// Order-insensitive content fingerprint of a fetch.
type Fingerprint = BTreeSet<String>;

#[derive(Debug, Clone)]
pub struct PollingCache {
    records: Vec<RawArrivalRecord>,
    fingerprint: Fingerprint,
    last_fetch: Option<Instant>,
    refresh_interval: Duration,
}

impl Default for PollingCache {
    fn default() -> Self {
        Self::new(Duration::seconds(DEFAULT_REFRESH_SECS))
    }
}

impl PollingCache {
    pub fn new(refresh_interval: Duration) -> Self {
        PollingCache {
            records: Vec::new(),
            fingerprint: Fingerprint::new(),
            last_fetch: None,
            refresh_interval,
        }
    }

    pub fn should_refetch(&self, now: Instant) -> bool {
        match self.last_fetch {
            None => true,
            Some(last) => now.signed_duration_since(last) > self.refresh_interval,
        }
    }

    /// Replaces the cached records when their content differs from `records`.
    ///
    /// Returns `true` when the cache (and its timestamp) changed.
    pub fn absorb(&mut self, records: Vec<RawArrivalRecord>, now: Instant) -> bool {
        let fingerprint = fingerprint(&records);
        if fingerprint == self.fingerprint {
            debug!("Fetch unchanged ({} records), keeping cache", records.len());
            return false;
        }

        debug!(
            "Fetch changed: {} -> {} records",
            self.records.len(),
            records.len()
        );
        self.records = records;
        self.fingerprint = fingerprint;
        self.last_fetch = Some(now);
        true
    }

    pub fn records(&self) -> &[RawArrivalRecord] {
        &self.records
    }

    pub fn last_fetch(&self) -> Option<Instant> {
        self.last_fetch
    }

    pub fn refresh_interval(&self) -> Duration {
        self.refresh_interval
    }
}

fn fingerprint(records: &[RawArrivalRecord]) -> Fingerprint {
    records
        .iter()
        .filter_map(|record| match serde_json::to_string(record) {
            Ok(json) => Some(json),
            Err(e) => {
                warn!("Could not fingerprint record for point {}: {}", record.pointid, e);
                None
            }
        })
        .collect()
}
