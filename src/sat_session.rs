// Session state and the per-tick fetch -> normalize -> present pipeline
use crate::sat_api::{self, ArrivalSource};
use crate::sat_cache::PollingCache;
use crate::sat_catalog::StopCatalog;
use crate::sat_models::{DisplayRow, Instant, MapMarker, MapView, Notice, Result, SATError};
use crate::sat_normalizer::ArrivalNormalizer;
use crate::sat_presenter;
use chrono::Duration;
use log::{debug, info};
use std::collections::{BTreeMap, BTreeSet};

pub const MIN_WINDOW_MINUTES: u32 = 1;
pub const MAX_WINDOW_MINUTES: u32 = 60;

const CLOSE_ZOOM: u8 = 15;
const WIDE_ZOOM: u8 = 12;
const CLOSE_LATITUDE_SPAN: f64 = 0.05;

/// Everything the renderer needs for one tick.
#[derive(Debug, Clone)]
pub struct Frame {
    pub now: Instant,
    pub selected_stops: Vec<String>,
    pub rows: BTreeMap<String, Vec<DisplayRow>>,
    pub available_lines: BTreeSet<String>,
    pub selected_lines: BTreeSet<String>,
    pub max_minutes: u32,
    /// Present only when the stop selection changed since the last map.
    pub map: Option<MapView>,
    pub notices: Vec<Notice>,
    pub last_fetch: Option<Instant>,
    pub refresh_interval: Duration,
}

#[derive(Debug, Clone)]
pub enum TickOutcome {
    Frame(Frame),
    NeedsStops,
}

/// Per-session polling state, mutated only by ticks and user commands.
#[derive(Debug)]
pub struct PollState {
    cache: PollingCache,
    normalizer: ArrivalNormalizer,
    selected_stops: Vec<String>,
    selected_lines: BTreeSet<String>,
    lines_initialized: bool,
    preset_lines: Option<BTreeSet<String>>,
    available_lines: BTreeSet<String>,
    max_minutes: u32,
    last_map_stops: Option<Vec<String>>,
}

impl PollState {
    pub fn new(cache: PollingCache, normalizer: ArrivalNormalizer, max_minutes: u32) -> Result<Self> {
        validate_window(max_minutes)?;
        Ok(PollState {
            cache,
            normalizer,
            selected_stops: Vec::new(),
            selected_lines: BTreeSet::new(),
            lines_initialized: false,
            preset_lines: None,
            available_lines: BTreeSet::new(),
            max_minutes,
            last_map_stops: None,
        })
    }

    /// Replaces the stop selection. Every name must exist in the catalog.
    pub fn select_stops(&mut self, catalog: &StopCatalog, stops: Vec<String>) -> Result<()> {
        if let Some(unknown) = stops.iter().find(|s| !catalog.contains(s)) {
            return Err(SATError::UnknownStop(unknown.clone()));
        }
        let mut unique = Vec::with_capacity(stops.len());
        for stop in stops {
            if !unique.contains(&stop) {
                unique.push(stop);
            }
        }
        self.selected_stops = unique;
        Ok(())
    }

    /// Adds or removes a stop. Returns whether it is now selected.
    pub fn toggle_stop(&mut self, catalog: &StopCatalog, stop: &str) -> Result<bool> {
        if !catalog.contains(stop) {
            return Err(SATError::UnknownStop(stop.to_string()));
        }
        if let Some(pos) = self.selected_stops.iter().position(|s| s == stop) {
            self.selected_stops.remove(pos);
            Ok(false)
        } else {
            self.selected_stops.push(stop.to_string());
            Ok(true)
        }
    }

    /// Line filter to apply once data first arrives, instead of all lines.
    pub fn preset_lines(&mut self, lines: BTreeSet<String>) {
        self.preset_lines = Some(lines);
    }

    /// Adds or removes a line from the filter. Returns whether it is now selected.
    pub fn toggle_line(&mut self, line: &str) -> bool {
        if self.selected_lines.remove(line) {
            false
        } else {
            self.selected_lines.insert(line.to_string());
            true
        }
    }

    pub fn select_all_lines(&mut self) {
        self.selected_lines = self.available_lines.clone();
    }

    pub fn set_max_minutes(&mut self, minutes: u32) -> Result<()> {
        validate_window(minutes)?;
        self.max_minutes = minutes;
        Ok(())
    }

    pub fn selected_stops(&self) -> &[String] {
        &self.selected_stops
    }

    /// Runs one tick against a single captured `now`.
    ///
    /// Fetches only when the cache is stale or `force_refresh` is set; the
    /// countdown is recomputed from the cached payload on every tick.
    pub fn tick(
        &mut self,
        now: Instant,
        catalog: &StopCatalog,
        source: &dyn ArrivalSource,
        force_refresh: bool,
    ) -> TickOutcome {
        if self.selected_stops.is_empty() {
            return TickOutcome::NeedsStops;
        }

        let mut notices = Vec::new();

        if force_refresh || self.cache.should_refetch(now) {
            let point_ids = catalog.point_ids_for(&self.selected_stops);
            let records = sat_api::fetch(source, &point_ids, &mut notices);
            if self.cache.absorb(records, now) {
                info!("Arrival data updated ({} records)", self.cache.records().len());
            } else if force_refresh {
                notices.push(Notice::info("No new arrival data"));
            }
        }

        let arrivals = self.normalizer.normalize(self.cache.records(), now, catalog);
        let available =
            sat_presenter::available_lines(&arrivals, &self.selected_stops, self.max_minutes);
        self.sync_lines(available);

        let rows = sat_presenter::present(
            &arrivals,
            &self.selected_stops,
            &self.selected_lines,
            self.max_minutes,
        );

        TickOutcome::Frame(Frame {
            now,
            selected_stops: self.selected_stops.clone(),
            rows,
            available_lines: self.available_lines.clone(),
            selected_lines: self.selected_lines.clone(),
            max_minutes: self.max_minutes,
            map: self.map_if_changed(catalog),
            notices,
            last_fetch: self.cache.last_fetch(),
            refresh_interval: self.cache.refresh_interval(),
        })
    }

    fn sync_lines(&mut self, available: BTreeSet<String>) {
        if !self.lines_initialized && !available.is_empty() {
            self.selected_lines = match self.preset_lines.take() {
                Some(preset) => preset.intersection(&available).cloned().collect(),
                None => available.clone(),
            };
            self.lines_initialized = true;
            debug!("Line filter initialised with {} lines", self.selected_lines.len());
        } else {
            self.selected_lines.retain(|line| available.contains(line));
        }
        self.available_lines = available;
    }

    fn map_if_changed(&mut self, catalog: &StopCatalog) -> Option<MapView> {
        if self.last_map_stops.as_deref() == Some(self.selected_stops.as_slice()) {
            return None;
        }
        self.last_map_stops = Some(self.selected_stops.clone());
        Some(build_map(catalog, &self.selected_stops))
    }
}

fn validate_window(minutes: u32) -> Result<()> {
    if (MIN_WINDOW_MINUTES..=MAX_WINDOW_MINUTES).contains(&minutes) {
        Ok(())
    } else {
        Err(SATError::InvalidWindow(minutes))
    }
}

/// Markers for every post of the given stops.
pub fn build_map(catalog: &StopCatalog, stops: &[String]) -> MapView {
    let markers: Vec<MapMarker> = stops
        .iter()
        .filter_map(|name| catalog.get(name))
        .flat_map(|stop| {
            stop.coordinates.iter().map(|&(latitude, longitude)| MapMarker {
                stop_name: stop.name.clone(),
                latitude,
                longitude,
            })
        })
        .collect();

    let (min_lat, max_lat) = markers.iter().fold((f64::MAX, f64::MIN), |(lo, hi), m| {
        (lo.min(m.latitude), hi.max(m.latitude))
    });
    let zoom = if markers.is_empty() || max_lat - min_lat < CLOSE_LATITUDE_SPAN {
        CLOSE_ZOOM
    } else {
        WIDE_ZOOM
    };

    MapView { markers, zoom }
}
