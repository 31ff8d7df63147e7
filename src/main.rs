use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::{LevelFilter, info};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

mod cli;
mod config;

use cli::Cli;
use cli::commands::Commands;
use cli::display::{self, ConsoleSink};
use config::{API_KEY_ENV, Config, STEAM_ID_ENV};
use unlockr::classifier::Classifier;
use unlockr::discovery::{ClientLibrary, ClientLocator};
use unlockr::domain::TitleId;
use unlockr::scan::{LibraryScanner, ScanConfig, ScanError, SteamWebApi};
use unlockr::scheduler::{NullSink, ProgressSink, Scheduler};
use unlockr::session::{LibrarySnapshot, SnapshotClient};

fn setup_logging() -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("unlockr")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("unlockr.log");

    // Setup env_logger with file output
    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    // Without RUST_LOG the logger accepts everything and the max level gates it,
    // so the configured level can still be applied after config load
    let env = env_logger::Env::default().default_filter_or("trace");
    env_logger::Builder::from_env(env)
        .target(env_logger::Target::Pipe(target))
        .init();
    if !rust_log_set() {
        log::set_max_level(LevelFilter::Info);
    }

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

fn rust_log_set() -> bool {
    std::env::var_os("RUST_LOG").is_some()
}

fn parse_log_level(level: Option<&str>) -> Option<LevelFilter> {
    level.and_then(|l| l.trim().parse::<LevelFilter>().ok())
}

/// Apply the configured level unless RUST_LOG overrides it
fn apply_log_level(level: Option<&str>) {
    if rust_log_set() {
        return;
    }
    match (level, parse_log_level(level)) {
        (_, Some(filter)) => log::set_max_level(filter),
        (Some(raw), None) => log::warn!("Ignoring unknown log level '{}'", raw),
        (None, None) => {}
    }
}

async fn run_application(cli: &Cli, config: &Config) -> Result<()> {
    info!("Starting application");

    if cli.is_verbose() {
        println!("{}", "Verbose mode enabled".yellow());
    }

    let command = cli.command.clone().unwrap_or_else(Commands::default_run);
    match command {
        Commands::Run {
            snapshot,
            concurrency,
            skip_discovery,
            json,
        } => handle_run_command(snapshot.as_deref(), concurrency, skip_discovery, json, cli.is_verbose(), config).await,
        Commands::Scan { output, concurrency } => handle_scan_command(output.as_deref(), concurrency, config).await,
        Commands::Locate => handle_locate_command(config),
        Commands::Titles { snapshot } => handle_titles_command(snapshot.as_deref(), config),
        Commands::Preview { app_id, snapshot } => handle_preview_command(TitleId(app_id), snapshot.as_deref(), config),
    }
}

fn locate_library(config: &Config) -> Result<ClientLibrary> {
    let locator = ClientLocator::from_config(config.client.install_dir.as_deref());
    let library = locator.locate().context("Client library not found; set client.install_dir")?;
    info!("Client library at {}", library.client_library.display());
    Ok(library)
}

fn load_snapshot(path: Option<&Path>, config: &Config) -> Result<LibrarySnapshot> {
    let path = path.unwrap_or(config.client.snapshot_path.as_path());
    LibrarySnapshot::load(path).context(format!("Failed to load library snapshot from {}", path.display()))
}

async fn handle_run_command(
    snapshot_path: Option<&Path>,
    concurrency: Option<usize>,
    skip_discovery: bool,
    json: bool,
    verbose: bool,
    config: &Config,
) -> Result<()> {
    if skip_discovery || !config.client.require_library {
        info!("Skipping client library discovery");
    } else {
        let library = locate_library(config)?;
        if verbose && !json {
            display::print_library(&library);
        }
    }

    let snapshot = load_snapshot(snapshot_path, config)?;
    let titles = snapshot.titles_with_locked();
    let policy = config.protection_policy().context("Invalid protection policy")?;
    let engine = config.engine_config();
    let limit = concurrency.unwrap_or(engine.concurrency_limit);

    if !json {
        println!(
            "{} {} titles, {} at a time",
            "Processing".cyan().bold(),
            titles.len(),
            limit
        );
    }

    let names = snapshot.names();
    let client = Arc::new(SnapshotClient::new(&snapshot));
    let scheduler = Scheduler::new(client, Classifier::new(policy), engine).with_names(names.clone());

    let sink: Arc<dyn ProgressSink> = if json {
        Arc::new(NullSink)
    } else {
        Arc::new(ConsoleSink::new(names, verbose))
    };

    let cancel = CancellationToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::warn!("Interrupt received, cancelling run");
                eprintln!("{}", "Cancelling, waiting for in-flight unlocks...".yellow());
                cancel.cancel();
            }
        })
    };

    let result = scheduler.run(titles, limit, sink, cancel).await;
    interrupt.abort();
    let report = result.context("Run could not start")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report).context("Failed to serialize report")?);
    } else {
        display::print_summary(&report);
    }
    Ok(())
}

fn scan_settings(concurrency: Option<usize>, config: &Config) -> ScanConfig {
    let mut settings = config.scan_config();
    if let Some(concurrency) = concurrency {
        settings.concurrency = concurrency;
    }
    settings
}

async fn handle_scan_command(output: Option<&Path>, concurrency: Option<usize>, config: &Config) -> Result<()> {
    let api_key = config.api_key().ok_or(ScanError::MissingCredential("api_key")).context(format!(
        "Set web_api.api_key or {}",
        API_KEY_ENV
    ))?;
    let steam_id = config.steam_id().ok_or(ScanError::MissingCredential("steam_id")).context(format!(
        "Set web_api.steam_id or {}",
        STEAM_ID_ENV
    ))?;
    let timeout = std::time::Duration::from_millis(config.web_api.timeout_ms);
    let api = SteamWebApi::new(api_key, config.web_api.base_url.clone(), timeout).context("Failed to build web API client")?;

    let output = output.unwrap_or(config.client.snapshot_path.as_path());
    let settings = scan_settings(concurrency, config);
    println!(
        "{} library of {}, {} requests at a time",
        "Scanning".cyan().bold(),
        steam_id,
        settings.concurrency
    );
    let scanner = LibraryScanner::new(Arc::new(api), steam_id, settings).with_output(output);

    let cancel = CancellationToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::warn!("Interrupt received, stopping scan");
                eprintln!("{}", "Stopping scan, saving progress...".yellow());
                cancel.cancel();
            }
        })
    };

    let result = scanner.scan(cancel).await;
    interrupt.abort();
    let report = result.context("Library scan failed")?;

    display::print_scan_summary(&report, output);
    Ok(())
}

fn handle_locate_command(config: &Config) -> Result<()> {
    let library = locate_library(config)?;
    display::print_library(&library);
    Ok(())
}

fn handle_titles_command(snapshot_path: Option<&Path>, config: &Config) -> Result<()> {
    let snapshot = load_snapshot(snapshot_path, config)?;
    display::print_titles(&snapshot);
    Ok(())
}

fn handle_preview_command(title: TitleId, snapshot_path: Option<&Path>, config: &Config) -> Result<()> {
    let snapshot = load_snapshot(snapshot_path, config)?;
    let game = snapshot
        .game(title)
        .ok_or_else(|| eyre::eyre!("Title {} is not in the library snapshot", title))?;
    let policy = config.protection_policy().context("Invalid protection policy")?;
    display::print_preview(game, &Classifier::new(policy));
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Setup logging first
    setup_logging().context("Failed to setup logging")?;

    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    apply_log_level(config.log_level.as_deref());

    info!("Starting with config from: {:?}", cli.config);

    // Run the main application logic
    run_application(&cli, &config).await.context("Application failed")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_log_level() {
        assert_eq!(parse_log_level(Some("debug")), Some(LevelFilter::Debug));
        assert_eq!(parse_log_level(Some(" WARN ")), Some(LevelFilter::Warn));
        assert_eq!(parse_log_level(Some("off")), Some(LevelFilter::Off));
        assert_eq!(parse_log_level(Some("chatty")), None);
        assert_eq!(parse_log_level(None), None);
    }

    #[test]
    fn test_scan_settings_override() {
        let config = Config::default();
        assert_eq!(scan_settings(None, &config).concurrency, 8);
        assert_eq!(scan_settings(Some(2), &config).concurrency, 2);
        assert_eq!(scan_settings(Some(2), &config).save_every, 100);
    }
}
