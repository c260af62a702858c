//! ePaper Status - PiAware receiver monitor
//!
//! Polls the receiver's JSON interface, raises emergency squawk and
//! watchlist notifications, and renders a status summary to a low-refresh
//! display every few minutes.

mod aircraft;
mod alerts;
mod config;
mod display;
mod events;
mod geo;
mod notify;
mod refresh;
mod runner;
mod telemetry;

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::BufReader;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::Config;
use display::TextDisplay;
use events::{spawn_button_reader, spawn_signal_listener};
use notify::{Notifier, SlackTransport};
use refresh::RefreshController;
use runner::Runner;
use telemetry::{ReqwestTransport, TelemetryClient};

fn init_logging(level: &str) {
    let filter = EnvFilter::try_new(level.to_lowercase()).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env();
    init_logging(config.as_ref().map_or("INFO", |c| c.log_level.as_str()));

    info!("===========================================");
    info!("   ePaper Status - PiAware receiver monitor");
    info!("===========================================");
    info!("Running on PID: {}", std::process::id());

    let config = config.context("Invalid configuration")?;

    info!("Configuration:");
    info!("  PiAware host: {}", config.piaware_host);
    info!(
        "  Flightradar24: {} ({})",
        config.flightradar_host,
        if config.enable_fr24 { "enabled" } else { "disabled" }
    );
    info!(
        "  Retries: {} (backoff factor {})",
        config.retry.retries, config.retry.backoff_factor
    );
    info!("  Cache busting: {}", config.cache_bust);
    info!("  Refresh interval: {}s", config.refresh_interval.as_secs());
    info!("  Aircraft threshold: {}s", config.aircraft_threshold_secs);
    info!(
        "  Watchlist: {} ICAO, {} callsigns",
        config.watchlist.icao_len(),
        config.watchlist.callsign_len()
    );

    let transport = ReqwestTransport::new().context("Failed to build HTTP client")?;
    let telemetry = TelemetryClient::new(
        transport,
        &config.piaware_host,
        &config.flightradar_host,
        config.retry,
        config.cache_bust,
    )?;

    let slack = match config.slack.clone() {
        Some(credentials) => {
            info!("  Slack channel: {}", credentials.channel);
            Some(SlackTransport::new(credentials).context("Failed to build Slack client")?)
        }
        None => None,
    };
    let watchlist = Arc::new(config.watchlist.clone());
    let notifier = Notifier::new(slack, config.piaware_host.clone(), watchlist.clone());
    if !notifier.is_enabled() {
        info!("Skipping Slack notifications. SLACK_BOT_TOKEN or SLACK_CHANNEL is not set.");
    }

    let display = TextDisplay::new(config.display_snapshot.clone());
    let mut controller = RefreshController::new(
        telemetry,
        notifier,
        display,
        watchlist,
        config.aircraft_threshold_secs,
        config.enable_fr24,
    );
    let origin = controller.ensure_origin().await;
    info!("Receiver at {}", origin);

    let (tx, rx) = mpsc::channel(32);
    let signals = spawn_signal_listener(tx.clone()).context("Failed to install signal handlers")?;
    let buttons = config.buttons_from_stdin.then(|| {
        info!("Reading button presses from stdin");
        spawn_button_reader(BufReader::new(tokio::io::stdin()), tx.clone())
    });
    drop(tx);

    info!("===========================================");
    info!("  Starting refresh loop...");
    info!("===========================================");

    let reason = Runner::new(controller, rx, config.refresh_interval).run().await;

    signals.abort();
    if let Some(buttons) = buttons {
        buttons.abort();
    }

    info!("Exiting ({})", reason);
    Ok(())
}
