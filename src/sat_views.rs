// Terminal views for the STIB Arrivals Tracker
use crate::sat_models::{DisplayRow, MapView, Notice, Result, SATError};
use crate::sat_session::Frame;
use geojson::{Feature, FeatureCollection, Geometry, JsonObject, Value};
use std::io::{self, Write};
use std::path::Path;

const IMMINENT_SECS: i64 = 60;

pub struct SATViews;

impl SATViews {
    /// Redraw the whole board for one tick
    pub fn render_frame(frame: &Frame) {
        Self::clear_screen();
        Self::show_header(frame);

        for notice in &frame.notices {
            println!("  {}", notice);
        }

        println!("\n🚌 UPCOMING ARRIVALS BY STOP");
        for stop in &frame.selected_stops {
            let rows = frame.rows.get(stop).map(Vec::as_slice).unwrap_or(&[]);
            Self::show_stop_table(stop, rows);
        }

        Self::show_line_filter(frame);

        if let Some(map) = &frame.map {
            Self::show_map(map);
        }

        Self::show_commands();
        let _ = io::stdout().flush();
    }

    fn show_header(frame: &Frame) {
        println!("{}", "═".repeat(70));
        println!("  🚊 STIB REAL-TIME TRAM/BUS ARRIVALS");
        println!("  🕐 Current time: {}", frame.now.format("%H:%M:%S"));
        println!(
            "  📡 Arrival data refreshes every {} seconds",
            frame.refresh_interval.num_seconds()
        );
        match frame.last_fetch {
            Some(at) => println!("  ✓ Last update: {}", at.format("%H:%M:%S")),
            None => println!("  ⏳ Waiting for first update..."),
        }
        println!("  ⏱️  Window: next {} minutes", frame.max_minutes);
        println!("{}", "═".repeat(70));
    }

    fn show_stop_table(stop: &str, rows: &[DisplayRow]) {
        println!("\n🛑 {}", stop);
        println!("{}", "─".repeat(70));

        if rows.is_empty() {
            println!("  ℹ️  No arrivals in selected time range or line.");
            return;
        }

        let [line, destination, expected, left] = DisplayRow::FIELDS;
        println!("  {:<6} {:<28} {:<17} {}", line, destination, expected, left);
        for row in rows {
            let [line, destination, expected, left] = row.cells();
            // pad before colouring, escape codes have no width
            let badge = Self::colorize_line(&format!("{:<4}", line), &row.color);
            let soon = if row.seconds_left < IMMINENT_SECS { " 🔜" } else { "" };
            println!("  {} {:<28} {:<17} {}{}", badge, destination, expected, left, soon);
        }
    }

    fn show_line_filter(frame: &Frame) {
        if frame.available_lines.is_empty() {
            return;
        }
        let lines: Vec<String> = frame
            .available_lines
            .iter()
            .map(|line| {
                if frame.selected_lines.contains(line) {
                    Self::colorize_line(line, &crate::sat_presenter::line_color(line))
                } else {
                    format!(" {} ", line)
                }
            })
            .collect();
        println!("\n🎛️  Lines ({} of {} shown):", frame.selected_lines.len(), frame.available_lines.len());
        for chunk in lines.chunks(12) {
            println!("   {}", chunk.join(" "));
        }
    }

    pub fn show_map(map: &MapView) {
        println!("\n🗺️  Stop locations (zoom {})", map.zoom);
        for marker in &map.markers {
            println!(
                "   📍 {:<24} ({:.6}, {:.6})",
                marker.stop_name, marker.latitude, marker.longitude
            );
        }
    }

    fn show_commands() {
        println!("\n{}", "─".repeat(70));
        println!("  r refresh now · a all lines · l <line> toggle line · s <stop> toggle stop");
        println!("  w <minutes> time window · q quit");
        print!("➜ ");
    }

    pub fn no_stops_selected(suggestions: &[&str], notices: &[Notice]) {
        Self::clear_screen();
        for notice in notices {
            println!("  {}", notice);
        }
        println!("\n{}", "─".repeat(60));
        println!("⚠️  Select at least one stop.");
        println!("\n💡 Use 's <stop name>' to add a stop");
        if !suggestions.is_empty() {
            println!("   Examples: {}", suggestions.join(", "));
        }
        println!("{}", "─".repeat(60));
        print!("➜ ");
        let _ = io::stdout().flush();
    }

    pub fn goodbye_message() {
        println!("\n👋 Bye!");
    }

    /// ANSI 24-bit background with contrasting text
    pub fn colorize_line(code: &str, hex_color: &str) -> String {
        let (r, g, b) = parse_hex_color(hex_color);
        let luminance = (0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32) / 255.0;
        let text_color = if luminance > 0.5 { "30" } else { "97" };
        format!(
            "\x1b[48;2;{};{};{}m\x1b[{}m {} \x1b[0m",
            r, g, b, text_color, code
        )
    }

    fn clear_screen() {
        print!("\x1B[2J\x1B[1;1H");
    }
}

/// `#rrggbb` to channels; anything malformed renders grey.
pub fn parse_hex_color(hex: &str) -> (u8, u8, u8) {
    let hex = hex.trim_start_matches('#');
    if hex.len() != 6 {
        return (128, 128, 128);
    }
    let channel = |i: usize| u8::from_str_radix(hex.get(i..i + 2).unwrap_or(""), 16).ok();
    match (channel(0), channel(2), channel(4)) {
        (Some(r), Some(g), Some(b)) => (r, g, b),
        _ => (128, 128, 128),
    }
}

pub fn map_feature_collection(map: &MapView) -> FeatureCollection {
    let features = map
        .markers
        .iter()
        .map(|marker| {
            let mut properties = JsonObject::new();
            properties.insert("stop_name".to_string(), marker.stop_name.clone().into());
            Feature {
                bbox: None,
                geometry: Some(Geometry::new(Value::Point(vec![
                    marker.longitude,
                    marker.latitude,
                ]))),
                id: None,
                properties: Some(properties),
                foreign_members: None,
            }
        })
        .collect();

    let mut foreign_members = JsonObject::new();
    foreign_members.insert("zoom".to_string(), map.zoom.into());

    FeatureCollection {
        bbox: None,
        features,
        foreign_members: Some(foreign_members),
    }
}

pub fn export_map_geojson(map: &MapView, path: &Path) -> Result<()> {
    std::fs::write(path, map_feature_collection(map).to_string())
        .map_err(|e| SATError::File(format!("Failed to write map {:?}: {}", path, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sat_models::MapMarker;

    fn map() -> MapView {
        MapView {
            markers: vec![
                MapMarker { stop_name: "LEVURE".into(), latitude: 50.8279, longitude: 4.3789 },
                MapMarker { stop_name: "FLAGEY".into(), latitude: 50.8275, longitude: 4.3725 },
            ],
            zoom: 15,
        }
    }

    #[test]
    fn parses_hex_colors() {
        assert_eq!(parse_hex_color("#661919"), (0x66, 0x19, 0x19));
        assert_eq!(parse_hex_color("nope"), (128, 128, 128));
        assert_eq!(parse_hex_color("#zz0000"), (128, 128, 128));
    }

    #[test]
    fn dark_lines_get_white_text() {
        let badge = SATViews::colorize_line("7", "#661919");
        assert!(badge.starts_with("\x1b[48;2;102;25;25m\x1b[97m"));
        assert!(badge.contains(" 7 "));
    }

    #[test]
    fn geojson_points_are_lon_lat() {
        let collection = map_feature_collection(&map());
        assert_eq!(collection.features.len(), 2);
        let geometry = collection.features[0].geometry.as_ref().unwrap();
        assert_eq!(geometry.value, Value::Point(vec![4.3789, 50.8279]));
        assert_eq!(
            collection.features[1].property("stop_name"),
            Some(&serde_json::json!("FLAGEY"))
        );
    }

    #[test]
    fn exports_geojson_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("map.geojson");
        export_map_geojson(&map(), &path).unwrap();

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["type"], "FeatureCollection");
        assert_eq!(written["zoom"], 15);
        assert_eq!(written["features"].as_array().unwrap().len(), 2);
    }
}
