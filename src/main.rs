mod sat_api;
mod sat_cache;
mod sat_catalog;
mod sat_config;
mod sat_controllers;
mod sat_models;
mod sat_normalizer;
mod sat_presenter;
mod sat_session;
mod sat_views;

use clap::Parser;
use sat_config::Args;
use sat_controllers::SATControllers;

fn main() {
    // Set up panic hook for better error messages
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("\n{}", "═".repeat(70));
        eprintln!("❌ APPLICATION PANIC");
        eprintln!("{}", "═".repeat(70));
        eprintln!("\n{}", panic_info);
        eprintln!("\n💡 Please restart the application and report this issue if it persists");
        eprintln!("\n{}", "═".repeat(70));
    }));

    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();

    if let Err(e) = SATControllers::run(args) {
        eprintln!("\n❌ {:#}", e);
        std::process::exit(1);
    }
}
