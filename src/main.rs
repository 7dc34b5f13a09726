//! # Aquadose — automated liquid dose scheduler daemon.
//!
//! Loads config, opens the store, re-adopts schedules that were running
//! when the daemon last stopped, and drives the dose engine tick loop
//! until interrupted.
//!
//! Usage:
//!   aquadose                          # Run with ~/.aquadose/config.toml
//!   aquadose --db-path ./doses.db     # Custom database
//!   aquadose --webhook https://...    # Status notifications via webhook

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use tokio::sync::Mutex;
use tracing_subscriber::EnvFilter;

use aquadose_core::AquadoseConfig;
use aquadose_scheduler::{DoseDb, DoseEngine, DryRunDispenser, NotifyTarget, spawn_engine};

#[derive(Parser)]
#[command(
    name = "aquadose",
    version,
    about = "💧 Aquadose — automated liquid dose scheduler"
)]
struct Cli {
    /// Config file path
    #[arg(short, long, default_value = "~/.aquadose/config.toml")]
    config: String,

    /// Database path (overrides config)
    #[arg(long)]
    db_path: Option<String>,

    /// Tick interval in seconds (overrides config)
    #[arg(long)]
    tick_interval: Option<u64>,

    /// Webhook URL for status notifications (overrides config)
    #[arg(long)]
    webhook: Option<String>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "aquadose=debug,aquadose_scheduler=debug"
    } else {
        "aquadose=info,aquadose_scheduler=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let config_path = shellexpand::tilde(&cli.config).to_string();
    let mut config = if Path::new(&config_path).exists() {
        AquadoseConfig::load_from(Path::new(&config_path))?
    } else {
        AquadoseConfig::default()
    };
    if let Some(db_path) = cli.db_path {
        config.store.db_path = db_path;
    }
    if let Some(tick) = cli.tick_interval {
        config.scheduler.tick_interval_secs = tick;
    }
    if let Some(webhook) = cli.webhook {
        config.notify.webhook_url = webhook;
    }

    let db_path = shellexpand::tilde(&config.store.db_path).to_string();
    let db = DoseDb::open(Path::new(&db_path))?;
    tracing::info!("💾 store opened at {db_path}");

    let mut engine = DoseEngine::new(config.clone(), db, Arc::new(DryRunDispenser));
    if !config.notify.webhook_url.is_empty() {
        engine.set_notify_target(NotifyTarget::Webhook {
            url: config.notify.webhook_url.clone(),
            headers: Vec::new(),
        });
    }

    let adopted = engine.adopt_persisted(Utc::now())?;
    if adopted > 0 {
        tracing::info!("📦 re-adopted {adopted} running schedules");
    }

    let engine = Arc::new(Mutex::new(engine));
    let ticker = tokio::spawn(spawn_engine(
        engine.clone(),
        config.scheduler.tick_interval_secs,
    ));

    tokio::signal::ctrl_c().await?;
    tracing::info!("🛑 shutting down");
    ticker.abort();

    let stopped = engine.lock().await.stop_all();
    if stopped > 0 {
        tracing::info!("⏸️ {stopped} schedules paused for restart");
    }
    Ok(())
}
