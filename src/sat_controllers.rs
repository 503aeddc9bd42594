// Controller for the STIB Arrivals Tracker: tick loop and keyboard commands
use crate::sat_api::StibApiClient;
use crate::sat_cache::PollingCache;
use crate::sat_catalog::StopCatalog;
use crate::sat_config::Args;
use crate::sat_models::{BRUSSELS, Instant, Notice};
use crate::sat_normalizer::ArrivalNormalizer;
use crate::sat_session::{PollState, TickOutcome};
use crate::sat_views::{self, SATViews};
use anyhow::Context;
use chrono::Utc;
use log::{info, warn};
use std::io::{self, BufRead};
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Duration;

const HELP: &str = "Commands: r refresh now · a all lines · l <line> toggle line · \
s <stop> toggle stop · w <minutes> time window · q quit";

/// A keyboard command, applied between ticks.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Refresh,
    AllLines,
    ToggleLine(String),
    ToggleStop(String),
    Window(u32),
    Quit,
    Help,
}

impl Command {
    pub fn parse(input: &str) -> Option<Command> {
        let input = input.trim();
        let (head, rest) = match input.split_once(char::is_whitespace) {
            Some((head, rest)) => (head, rest.trim()),
            None => (input, ""),
        };

        match (head, rest) {
            ("r", "") => Some(Command::Refresh),
            ("a", "") => Some(Command::AllLines),
            ("q", "") => Some(Command::Quit),
            ("h", "") => Some(Command::Help),
            ("l", line) if !line.is_empty() => Some(Command::ToggleLine(line.to_string())),
            ("s", stop) if !stop.is_empty() => Some(Command::ToggleStop(stop.to_uppercase())),
            ("w", minutes) => minutes.parse().ok().map(Command::Window),
            _ => None,
        }
    }
}

pub struct SATControllers;

impl SATControllers {
    /// Main application loop
    pub fn run(args: Args) -> anyhow::Result<()> {
        let catalog = StopCatalog::load(&args.stops_csv)
            .with_context(|| format!("Failed to load stop catalog {:?}", args.stops_csv))?;
        if catalog.is_empty() {
            anyhow::bail!("Stop catalog {:?} contains no usable stops", args.stops_csv);
        }

        let client = StibApiClient::new(&args.api_url, &args.api_key, args.timeout_secs)
            .context("Failed to set up the STIB API client")?;

        let cache = PollingCache::new(chrono::Duration::seconds(args.refresh_secs));
        let mut state = PollState::new(cache, ArrivalNormalizer::new(&args.language), args.max_minutes)?;
        state
            .select_stops(&catalog, args.stops.clone())
            .context("Invalid --stop")?;
        if !args.lines.is_empty() {
            state.preset_lines(args.lines.iter().cloned().collect());
        }

        info!(
            "Watching {} stops, fetching every {}s",
            state.selected_stops().len(),
            args.refresh_secs
        );

        let commands = Self::spawn_input_reader();
        let tick = Duration::from_millis(args.tick_ms);
        let mut force_refresh = false;
        let mut input_closed = false;
        // feedback for the last command, kept on screen until the next one
        let mut feedback: Vec<Notice> = Vec::new();

        loop {
            let now = Self::now();
            match state.tick(now, &catalog, &client, force_refresh) {
                TickOutcome::Frame(mut frame) => {
                    frame.notices.splice(0..0, feedback.iter().cloned());
                    if let (Some(map), Some(path)) = (&frame.map, &args.map_geojson) {
                        if let Err(e) = sat_views::export_map_geojson(map, path) {
                            warn!("{}", e);
                        }
                    }
                    SATViews::render_frame(&frame);
                }
                TickOutcome::NeedsStops => {
                    let suggestions: Vec<&str> = catalog.names().take(8).collect();
                    SATViews::no_stops_selected(&suggestions, &feedback);
                }
            }
            force_refresh = false;

            if args.once {
                println!();
                return Ok(());
            }

            if input_closed {
                thread::sleep(tick);
                continue;
            }

            match commands.recv_timeout(tick) {
                Ok(line) => {
                    feedback.clear();
                    match Command::parse(&line) {
                        Some(Command::Quit) => {
                            SATViews::goodbye_message();
                            return Ok(());
                        }
                        Some(command) => {
                            force_refresh = Self::apply(command, &mut state, &catalog, &mut feedback);
                        }
                        None if line.trim().is_empty() => {}
                        None => feedback.push(Notice::error(format!("Unknown command '{}'", line.trim()))),
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    info!("Input closed, continuing without commands");
                    input_closed = true;
                }
            }
        }
    }

    /// Applies a command, queueing its feedback. Returns whether the next tick must fetch.
    fn apply(
        command: Command,
        state: &mut PollState,
        catalog: &StopCatalog,
        notices: &mut Vec<Notice>,
    ) -> bool {
        match command {
            Command::Refresh => return true,
            Command::AllLines => state.select_all_lines(),
            Command::ToggleLine(line) => {
                state.toggle_line(&line);
            }
            Command::ToggleStop(stop) => match state.toggle_stop(catalog, &stop) {
                // newly selected stops have no cached data yet
                Ok(selected) => return selected,
                Err(e) => notices.push(Notice::error(e.to_string())),
            },
            Command::Window(minutes) => {
                if let Err(e) = state.set_max_minutes(minutes) {
                    notices.push(Notice::error(e.to_string()));
                }
            }
            Command::Help => notices.push(Notice::info(HELP)),
            Command::Quit => {}
        }
        false
    }

    /// Stdin lines are forwarded to the tick loop; this thread touches no state.
    fn spawn_input_reader() -> Receiver<String> {
        let (tx, rx) = channel();
        thread::spawn(move || {
            for line in io::stdin().lock().lines() {
                match line {
                    Ok(line) => {
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("Error reading input: {}", e);
                        break;
                    }
                }
            }
        });
        rx
    }

    fn now() -> Instant {
        Utc::now().with_timezone(&BRUSSELS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sat_models::NoticeLevel;

    #[test]
    fn parses_commands() {
        assert_eq!(Command::parse("r"), Some(Command::Refresh));
        assert_eq!(Command::parse(" a \n"), Some(Command::AllLines));
        assert_eq!(Command::parse("l 7"), Some(Command::ToggleLine("7".into())));
        assert_eq!(
            Command::parse("s gare du midi"),
            Some(Command::ToggleStop("GARE DU MIDI".into()))
        );
        assert_eq!(Command::parse("w 20"), Some(Command::Window(20)));
        assert_eq!(Command::parse("q"), Some(Command::Quit));
    }

    #[test]
    fn rejects_malformed_commands() {
        assert_eq!(Command::parse("l"), None);
        assert_eq!(Command::parse("w soon"), None);
        assert_eq!(Command::parse("x"), None);
        assert_eq!(Command::parse(""), None);
    }

    fn catalog() -> StopCatalog {
        StopCatalog::from_reader(
            "ID;Name;Coordinates\n1001;LEVURE;50.8,4.3\n2001;FLAGEY;50.8,4.3\n".as_bytes(),
        )
        .unwrap()
    }

    fn state(catalog: &StopCatalog) -> PollState {
        let mut state = PollState::new(PollingCache::default(), ArrivalNormalizer::default(), 15).unwrap();
        state.select_stops(catalog, vec!["LEVURE".into()]).unwrap();
        state
    }

    #[test]
    fn toggling_a_new_stop_forces_a_fetch() {
        let catalog = catalog();
        let mut state = state(&catalog);
        let mut notices = Vec::new();

        assert!(SATControllers::apply(Command::ToggleStop("FLAGEY".into()), &mut state, &catalog, &mut notices));
        assert!(!SATControllers::apply(Command::ToggleStop("FLAGEY".into()), &mut state, &catalog, &mut notices));
        assert!(SATControllers::apply(Command::Refresh, &mut state, &catalog, &mut notices));
        assert!(!SATControllers::apply(Command::Window(30), &mut state, &catalog, &mut notices));
        assert!(notices.is_empty());
    }

    #[test]
    fn rejected_commands_become_notices() {
        let catalog = catalog();
        let mut state = state(&catalog);
        let mut notices = Vec::new();

        assert!(!SATControllers::apply(Command::ToggleStop("ATLANTIS".into()), &mut state, &catalog, &mut notices));
        SATControllers::apply(Command::Window(90), &mut state, &catalog, &mut notices);

        assert_eq!(notices.len(), 2);
        assert_eq!(notices[0], Notice::error("Unknown stop: ATLANTIS"));
        assert_eq!(notices[1].level, NoticeLevel::Error);
        assert_eq!(state.selected_stops(), ["LEVURE".to_string()]);
    }

    #[test]
    fn help_is_shown_as_a_notice() {
        let catalog = catalog();
        let mut state = state(&catalog);
        let mut notices = Vec::new();

        assert!(!SATControllers::apply(Command::Help, &mut state, &catalog, &mut notices));
        assert_eq!(notices, vec![Notice::info(HELP)]);
    }
}
