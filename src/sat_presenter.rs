// Grouping, filtering and formatting of arrivals for display
use crate::sat_models::{DisplayRow, NormalizedArrival};
use palette::{encoding, FromColor, Hsv, Srgb};
use std::collections::{BTreeMap, BTreeSet};

const LINE_SATURATION: f64 = 0.75;
const LINE_VALUE: f64 = 0.40;

fn in_window(arrival: &NormalizedArrival, max_minutes: u32) -> bool {
    arrival.seconds_left > 0 && arrival.seconds_left <= i64::from(max_minutes) * 60
}

/// Rows per selected stop, each list sorted by time left.
///
/// An arrival is kept iff its stop is selected, it is strictly in the future
/// and at most `max_minutes` away, and its line is selected. Every selected
/// stop has an entry, empty when nothing qualifies.
pub fn present(
    arrivals: &[NormalizedArrival],
    selected_stops: &[String],
    selected_lines: &BTreeSet<String>,
    max_minutes: u32,
) -> BTreeMap<String, Vec<DisplayRow>> {
    let mut grouped: BTreeMap<String, Vec<&NormalizedArrival>> = selected_stops
        .iter()
        .map(|stop| (stop.clone(), Vec::new()))
        .collect();

    for arrival in arrivals {
        let Some(rows) = grouped.get_mut(&arrival.stop_name) else {
            continue;
        };
        if !in_window(arrival, max_minutes) {
            continue;
        }
        if !selected_lines.contains(&arrival.line) {
            continue;
        }
        rows.push(arrival);
    }

    grouped
        .into_iter()
        .map(|(stop, mut rows)| {
            rows.sort_by_key(|a| a.seconds_left);
            (stop, rows.into_iter().map(display_row).collect())
        })
        .collect()
}

/// Lines of the arrivals that pass the stop and time-window filters.
pub fn available_lines(
    arrivals: &[NormalizedArrival],
    selected_stops: &[String],
    max_minutes: u32,
) -> BTreeSet<String> {
    arrivals
        .iter()
        .filter(|a| selected_stops.contains(&a.stop_name) && in_window(a, max_minutes))
        .map(|a| a.line.clone())
        .collect()
}

fn display_row(arrival: &NormalizedArrival) -> DisplayRow {
    DisplayRow {
        line: arrival.line.clone(),
        destination: arrival.destination.clone(),
        expected_arrival: arrival.arrival.format("%H:%M:%S").to_string(),
        time_left: format_time_left(arrival.seconds_left),
        seconds_left: arrival.seconds_left,
        color: line_color(&arrival.line),
    }
}

pub fn format_time_left(seconds_left: i64) -> String {
    format!("{}m {}s", seconds_left.div_euclid(60), seconds_left.rem_euclid(60))
}

/// Stable dark colour for a line, as `#rrggbb`.
pub fn line_color(line: &str) -> String {
    hue_color((seahash::hash(line.as_bytes()) % 360) as f64)
}

fn hue_color(hue_degrees: f64) -> String {
    let hsv = Hsv::<encoding::Srgb, f64>::new(hue_degrees, LINE_SATURATION, LINE_VALUE);
    let rgb = Srgb::<f64>::from_color(hsv).into_format::<u8>();
    format!("#{:02x}{:02x}{:02x}", rgb.red, rgb.green, rgb.blue)
}
