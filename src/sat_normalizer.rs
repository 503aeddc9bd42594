// Turns raw waiting-time records into per-vehicle arrivals
use crate::sat_catalog::StopCatalog;
use crate::sat_models::{BRUSSELS, Instant, NormalizedArrival, PassingTime, RawArrivalRecord};
use chrono::{DateTime, NaiveDateTime, TimeZone};
use log::debug;

pub const DEFAULT_LANGUAGE: &str = "fr";
const UNKNOWN_DESTINATION: &str = "Unknown";

#[derive(Debug, Clone)]
pub struct ArrivalNormalizer {
    language: String,
}

impl Default for ArrivalNormalizer {
    fn default() -> Self {
        Self::new(DEFAULT_LANGUAGE)
    }
}

impl ArrivalNormalizer {
    pub fn new(language: impl Into<String>) -> Self {
        Self { language: language.into() }
    }

    /// Expands every record into one arrival per passing time.
    ///
    /// Pure in its inputs: the same records, `now` and catalog always give the
    /// same arrivals. Corrupt records and entries are skipped individually.
    pub fn normalize(
        &self,
        records: &[RawArrivalRecord],
        now: Instant,
        catalog: &StopCatalog,
    ) -> Vec<NormalizedArrival> {
        let mut arrivals = Vec::new();

        for record in records {
            let entries: Vec<serde_json::Value> = match serde_json::from_str(&record.passingtimes) {
                Ok(times) => times,
                Err(e) => {
                    debug!(
                        "Skipping record for point {} line {}: bad passingtimes ({})",
                        record.pointid, record.lineid, e
                    );
                    continue;
                }
            };

            let stop_name = catalog
                .stop_for_point(&record.pointid)
                .unwrap_or(record.pointid.as_str());

            for entry in entries {
                let passing: PassingTime = match serde_json::from_value(entry) {
                    Ok(passing) => passing,
                    Err(e) => {
                        debug!("Skipping malformed passing time for point {}: {}", record.pointid, e);
                        continue;
                    }
                };
                let Some(iso) = passing.expected_arrival_time.as_deref() else {
                    continue;
                };
                let Some(arrival) = parse_arrival(iso) else {
                    debug!("Skipping unparsable arrival time {:?}", iso);
                    continue;
                };

                arrivals.push(NormalizedArrival {
                    line: record.lineid.clone(),
                    destination: self.destination(&passing.destination),
                    stop_name: stop_name.to_string(),
                    arrival,
                    seconds_left: arrival.signed_duration_since(now).num_seconds(),
                });
            }
        }

        arrivals
    }

    fn destination(&self, labels: &serde_json::Value) -> String {
        labels
            .get(&self.language)
            .and_then(|v| v.as_str())
            .unwrap_or(UNKNOWN_DESTINATION)
            .to_string()
    }
}

/// Parses an ISO-8601 instant into Brussels time. Timestamps without an
/// offset are read as Brussels local time.
pub fn parse_arrival(iso: &str) -> Option<Instant> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(iso) {
        return Some(dt.with_timezone(&BRUSSELS));
    }
    let naive = iso.parse::<NaiveDateTime>().ok()?;
    BRUSSELS.from_local_datetime(&naive).earliest()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    const CATALOG: &str = "ID;Name;Coordinates\n1001;LEVURE;50.8279,4.3789\n1002;LEVURE;50.8281,4.3791\n";

    fn catalog() -> StopCatalog {
        StopCatalog::from_reader(CATALOG.as_bytes()).unwrap()
    }

    fn now() -> Instant {
        BRUSSELS.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn record(point: &str, line: &str, passingtimes: &str) -> RawArrivalRecord {
        RawArrivalRecord {
            pointid: point.to_string(),
            lineid: line.to_string(),
            passingtimes: passingtimes.to_string(),
            extra: serde_json::Map::new(),
        }
    }

    fn passing(at: Instant, destination: &str) -> String {
        format!(
            r#"{{"expectedArrivalTime":"{}","destination":{{"fr":"{}","nl":"{}"}}}}"#,
            at.to_rfc3339(),
            destination,
            destination.to_lowercase()
        )
    }

    #[test]
    fn resolves_stop_and_seconds_left() {
        let times = format!("[{}]", passing(now() + Duration::seconds(120), "ROGIER"));
        let arrivals = ArrivalNormalizer::default().normalize(&[record("1001", "7", &times)], now(), &catalog());

        assert_eq!(arrivals.len(), 1);
        let a = &arrivals[0];
        assert_eq!(a.stop_name, "LEVURE");
        assert_eq!(a.line, "7");
        assert_eq!(a.destination, "ROGIER");
        assert_eq!(a.seconds_left, 120);
    }

    #[test]
    fn one_record_yields_many_arrivals() {
        let times = format!(
            "[{},{}]",
            passing(now() + Duration::seconds(60), "ROGIER"),
            passing(now() + Duration::seconds(600), "ROGIER")
        );
        let arrivals = ArrivalNormalizer::default().normalize(&[record("1002", "7", &times)], now(), &catalog());
        assert_eq!(arrivals.len(), 2);
        assert_eq!(arrivals[1].seconds_left, 600);
    }

    #[test]
    fn not_json_skips_only_that_record() {
        let good = format!("[{}]", passing(now() + Duration::seconds(90), "ROGIER"));
        let records = vec![record("1001", "7", "not json"), record("1002", "8", &good)];
        let arrivals = ArrivalNormalizer::default().normalize(&records, now(), &catalog());

        assert_eq!(arrivals.len(), 1);
        assert_eq!(arrivals[0].line, "8");
    }

    #[test]
    fn bad_timestamp_skips_only_that_entry() {
        let times = format!(
            r#"[{{"expectedArrivalTime":"tomorrow"}},{{"destination":{{"fr":"X"}}}},{}]"#,
            passing(now() + Duration::seconds(30), "ROGIER")
        );
        let arrivals = ArrivalNormalizer::default().normalize(&[record("1001", "7", &times)], now(), &catalog());
        assert_eq!(arrivals.len(), 1);
        assert_eq!(arrivals[0].seconds_left, 30);
    }

    #[test]
    fn malformed_entry_keeps_its_siblings() {
        let times = format!(
            r#"[{{"expectedArrivalTime":12345,"destination":{{"fr":"X"}}}},"oops",{}]"#,
            passing(now() + Duration::seconds(120), "ROGIER")
        );
        let arrivals = ArrivalNormalizer::default().normalize(&[record("1001", "7", &times)], now(), &catalog());
        assert_eq!(arrivals.len(), 1);
        assert_eq!(arrivals[0].destination, "ROGIER");
        assert_eq!(arrivals[0].seconds_left, 120);
    }

    #[test]
    fn unknown_point_falls_back_to_point_id() {
        let times = format!("[{}]", passing(now() + Duration::seconds(60), "ROGIER"));
        let arrivals = ArrivalNormalizer::default().normalize(&[record("9999", "7", &times)], now(), &catalog());
        assert_eq!(arrivals[0].stop_name, "9999");
    }

    #[test]
    fn destination_language_and_fallback() {
        let times = format!(
            r#"[{},{{"expectedArrivalTime":"{}"}}]"#,
            passing(now() + Duration::seconds(60), "ROGIER"),
            (now() + Duration::seconds(90)).to_rfc3339()
        );
        let records = [record("1001", "7", &times)];
        let arrivals = ArrivalNormalizer::new("nl").normalize(&records, now(), &catalog());
        assert_eq!(arrivals[0].destination, "rogier");
        assert_eq!(arrivals[1].destination, "Unknown");
    }

    #[test]
    fn past_arrivals_have_negative_seconds() {
        let times = format!("[{}]", passing(now() - Duration::seconds(20), "ROGIER"));
        let arrivals = ArrivalNormalizer::default().normalize(&[record("1001", "7", &times)], now(), &catalog());
        assert_eq!(arrivals[0].seconds_left, -20);
    }

    #[test]
    fn repeated_calls_are_identical() {
        let times = format!(
            "[{},{}]",
            passing(now() + Duration::seconds(60), "ROGIER"),
            passing(now() + Duration::seconds(61), "GARE DU NORD")
        );
        let records = vec![record("1001", "7", &times), record("4242", "92", &times)];
        let normalizer = ArrivalNormalizer::default();
        let first = normalizer.normalize(&records, now(), &catalog());
        let second = normalizer.normalize(&records, now(), &catalog());
        assert_eq!(first, second);
    }

    #[test]
    fn parses_offsets_into_brussels_time() {
        let arrival = parse_arrival("2024-05-01T10:00:00Z").unwrap();
        assert_eq!(arrival, now());
        let arrival = parse_arrival("2024-05-01T12:00:00+02:00").unwrap();
        assert_eq!(arrival, now());
    }

    #[test]
    fn offsetless_timestamps_are_brussels_local() {
        assert_eq!(parse_arrival("2024-05-01T12:00:00").unwrap(), now());
        assert!(parse_arrival("12:00").is_none());
    }
}
