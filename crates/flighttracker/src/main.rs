//! `flighttracker` - CLI for the low-altitude flight tracker.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use flighttracker::cli::{Cli, Command, ConfigCommand, SearchCommand};
use flighttracker::scheduler::{Pipeline, Scheduler};
use flighttracker::store::{FlightStore, SearchQuery};
use flighttracker::{api, init_logging, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbosity());

    match cli.command {
        Command::Config(cmd) => handle_config(cmd, cli.config),
        Command::Start(cmd) => {
            let mut config = load_config(cli.config)?;
            cmd.apply(&mut config);
            config.validate()?;
            run_foreground(&config).await
        }
        Command::Serve(cmd) => {
            let mut config = load_config(cli.config)?;
            cmd.apply(&mut config);
            config.validate()?;
            api::serve(config, shutdown_signal()).await?;
            Ok(())
        }
        Command::Search(cmd) => handle_search(&load_config(cli.config)?, &cmd),
    }
}

fn load_config(path: Option<PathBuf>) -> anyhow::Result<Config> {
    Config::load_from(path).context("failed to load configuration")
}

async fn run_foreground(config: &Config) -> anyhow::Result<()> {
    let scheduler = Scheduler::new();
    scheduler
        .start_with(|| Pipeline::from_config(config))
        .await
        .context("failed to start pipeline")?;

    info!("Tracking {}; press Ctrl-C to stop", config.tracker.bbox);
    shutdown_signal().await;

    let stats = scheduler.stop().await?;
    info!(
        cycles = stats.cycles,
        failed = stats.failed_cycles,
        flights = stats.records,
        violations = stats.violations,
        "Done"
    );
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {e}");
    }
}

fn handle_search(config: &Config, cmd: &SearchCommand) -> anyhow::Result<()> {
    let query = SearchQuery::from_params(
        Some(&cmd.bbox),
        Some(&cmd.alt_threshold_feet.to_string()),
        Some(&cmd.from),
        Some(&cmd.to),
    )?;

    let path = config.database_path();
    let store = FlightStore::open(&path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let flights = store.search(&query)?;

    info!(matches = flights.len(), "Search complete");
    println!("{}", serde_json::to_string_pretty(&flights)?);
    Ok(())
}

fn show_config(config: &Config, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(config)?);
        return Ok(());
    }

    println!("Current Configuration");
    println!("=====================");
    println!();
    println!("[Tracker]");
    println!("  Bounding box:       {}", config.tracker.bbox);
    println!("  Refresh (s):        {}", config.tracker.refresh_secs);
    println!("  Sink:               {}", config.tracker.sink);
    println!();
    println!("[Violation]");
    println!("  Floor (m):          {}", config.violation.floor_meters);
    println!("  Ceiling (m):        {}", config.violation.ceiling_meters);
    println!();
    println!("[Feed]");
    println!("  URL:                {}", config.feed.base_url);
    println!("  Timeout (s):        {}", config.feed.timeout_secs);
    println!();
    println!("[File]");
    println!("  Log dir:            {}", config.file.log_dir.display());
    println!("  Raw stream:         {}", config.file.output_raw);
    println!("  Report stream:      {}", config.file.output_report);
    println!();
    println!("[Database]");
    println!("  Path:               {}", config.database_path().display());
    println!();
    println!("[HTTP]");
    println!("  Bind:               {}", config.http.bind);
    Ok(())
}

// Does not load the configuration unless asked to show it, so `path`, `new`
// and `validate` work while the current file is broken.
fn handle_config(cmd: ConfigCommand, config_path: Option<PathBuf>) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            show_config(&load_config(config_path)?, json)?;
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file
                .or(config_path)
                .unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            Config::load_from(Some(path)).context("configuration is invalid")?;
            println!("Configuration is valid.");
        }
        ConfigCommand::New { output, force } => {
            let text = Config::default().to_toml()?;
            match output {
                Some(path) => {
                    anyhow::ensure!(
                        force || !path.exists(),
                        "{} already exists, use --force to overwrite",
                        path.display()
                    );
                    std::fs::write(&path, text)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    println!("Wrote {}", path.display());
                }
                None => print!("{text}"),
            }
        }
    }
    Ok(())
}
