// Command line and environment configuration
use crate::sat_api::DEFAULT_API_URL;
use crate::sat_cache::DEFAULT_REFRESH_SECS;
use crate::sat_normalizer::DEFAULT_LANGUAGE;
use clap::Parser;
use std::path::PathBuf;

pub const DEFAULT_STOPS: [&str; 4] = ["LEVURE", "GERMOIR", "FLAGEY", "WERY"];

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Live STIB-MIVB tram and bus arrivals in the terminal", long_about = None)]
pub struct Args {
    /// STIB-MIVB open data API key
    #[arg(long, env = "API_KEY_MIVB", hide_env_values = true)]
    pub api_key: String,

    /// Waiting-time records endpoint
    #[arg(long, env = "SAT_API_URL", default_value = DEFAULT_API_URL)]
    pub api_url: String,

    /// Semicolon separated stop table (ID;Name;Coordinates)
    #[arg(long, env = "SAT_STOPS_CSV", default_value = "data/gtfs-stops-production.csv")]
    pub stops_csv: PathBuf,

    /// Stop to watch (repeatable)
    #[arg(long = "stop", value_name = "NAME", default_values_t = DEFAULT_STOPS.map(String::from))]
    pub stops: Vec<String>,

    /// Only show these lines (repeatable); all lines when omitted
    #[arg(long = "line", value_name = "LINE")]
    pub lines: Vec<String>,

    /// Only show arrivals within the next X minutes
    #[arg(long, default_value_t = 15, value_parser = clap::value_parser!(u32).range(1..=60))]
    pub max_minutes: u32,

    /// Seconds between upstream fetches
    #[arg(long, default_value_t = DEFAULT_REFRESH_SECS, value_parser = clap::value_parser!(i64).range(1..=86400))]
    pub refresh_secs: i64,

    /// Milliseconds between display refreshes
    #[arg(long, default_value_t = 1000, value_parser = clap::value_parser!(u64).range(100..))]
    pub tick_ms: u64,

    /// HTTP request timeout in seconds
    #[arg(long, default_value_t = 15, value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout_secs: u64,

    /// Language of destination labels
    #[arg(long, default_value = DEFAULT_LANGUAGE)]
    pub language: String,

    /// Write stop markers as GeoJSON here whenever the map is rebuilt
    #[arg(long, value_name = "PATH")]
    pub map_geojson: Option<PathBuf>,

    /// Render a single tick and exit
    #[arg(long)]
    pub once: bool,
}
