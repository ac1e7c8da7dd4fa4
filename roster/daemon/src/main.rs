//! Roster Daemon - Virtual Roster Over a Simulated Host
//!
//! Runs the roster pipeline end to end against an in-memory host populated
//! with simulated participants. Every simulated viewer receives its
//! instruction batches over a channel; batches can be dumped as JSON lines to
//! inspect exactly what a remote client would be sent.
//!
//! # Usage
//!
//! ```bash
//! # Start with defaults ($XDG_CONFIG_HOME/roster/roster.toml if present)
//! roster-daemon
//!
//! # Custom config, 60 participants, 3 viewers
//! roster-daemon --config roster.example.toml --participants 60 --viewers 3
//!
//! # Reproducible run for 30 seconds, printing every batch
//! roster-daemon --seed 7 --duration-secs 30 --dump
//!
//! # Verbose logging
//! RUST_LOG=debug roster-daemon
//! ```
//!
//! # Signals
//!
//! - `SIGTERM` / `SIGINT`: Graceful shutdown
//! - `SIGHUP`: Reload configuration

mod simulation;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use roster_core::{
    load_settings_from_path, ConfigOverrides, IconCache, InMemoryHost, InstructionBatch,
    LoadedConfig, Scheduler, SessionManager, ViewerId, ViewerRegistry,
};

use simulation::Simulation;

/// Roster Daemon - drives per-viewer virtual rosters
#[derive(Parser, Debug)]
#[command(name = "roster-daemon")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Configuration file path
    #[arg(short = 'c', long, env = "ROSTER_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Scheduler period in milliseconds
    #[arg(long, value_name = "MS")]
    tick_ms: Option<u64>,

    /// Grid column count
    #[arg(long)]
    columns: Option<u8>,

    /// Grid row count
    #[arg(long)]
    rows: Option<u8>,

    /// Tab used when no weighted tab matches
    #[arg(long)]
    default_tab: Option<String>,

    /// Simulated participants
    #[arg(short = 'p', long, default_value_t = 40)]
    participants: usize,

    /// Participants that also connect as viewers
    #[arg(short = 'v', long, default_value_t = 2)]
    viewers: usize,

    /// Seconds between simulation steps
    #[arg(long, default_value_t = 2)]
    step_secs: u64,

    /// Stop after this many seconds
    #[arg(long)]
    duration_secs: Option<u64>,

    /// Seed for the simulation
    #[arg(long)]
    seed: Option<u64>,

    /// Print every instruction batch as a JSON line
    #[arg(long)]
    dump: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, env = "ROSTER_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            tick_interval_ms: self.tick_ms,
            columns: self.columns,
            rows: self.rows,
            default_tab: self.default_tab.clone(),
        }
    }
}

/// Initialize logging with the specified level
fn init_logging(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!("roster_daemon={level},roster_core={level}"))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();
}

/// Load settings and definitions, then apply CLI overrides
fn load_config(args: &Args) -> Result<LoadedConfig> {
    let mut loaded =
        load_settings_from_path(args.config.clone()).context("Failed to load configuration")?;
    args.overrides()
        .apply(&mut loaded.settings)
        .context("Invalid command-line overrides")?;
    info!(
        source = %loaded.settings.source(),
        path = ?loaded.settings.config_file_path,
        columns = loaded.settings.grid.columns,
        rows = loaded.settings.grid.rows,
        tabs = loaded.definitions.tabs.len(),
        "Configuration loaded"
    );
    Ok(loaded)
}

/// Consume one viewer's batches until its channel closes
async fn drain_viewer(viewer: ViewerId, mut rx: mpsc::Receiver<InstructionBatch>, dump: bool) {
    let mut batches = 0u64;
    let mut instructions = 0u64;
    while let Some(batch) = rx.recv().await {
        batches += 1;
        instructions += batch.len() as u64;
        if dump {
            match serde_json::to_string(&batch) {
                Ok(line) => println!("{{\"viewer\":\"{viewer}\",\"batch\":{line}}}"),
                Err(e) => warn!(viewer = %viewer, error = %e, "Batch not serializable"),
            }
        } else {
            debug!(viewer = %viewer, instructions = batch.len(), "Batch received");
        }
    }
    info!(viewer = %viewer, batches, instructions, "Viewer channel closed");
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level);

    info!("Roster daemon starting");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let LoadedConfig {
        settings,
        definitions,
    } = load_config(&args)?;
    let period = settings.tick_interval;

    let host = Arc::new(InMemoryHost::new());
    let mut sim = Simulation::new(args.seed);
    sim.populate(&host, args.participants);

    let manager = Arc::new(SessionManager::new(
        settings.clone(),
        definitions,
        host.clone(),
        IconCache::new(settings.max_icon_entries),
        ViewerRegistry::new(),
    ));

    let mut viewers = Vec::new();
    for subject in sim.online().iter().take(args.viewers).copied() {
        let viewer = ViewerId::new();
        let (tx, rx) = mpsc::channel(64);
        match manager.on_viewer_join(viewer, subject, tx) {
            Ok(()) => {
                tokio::spawn(drain_viewer(viewer, rx, args.dump));
                viewers.push(viewer);
            }
            Err(e) => error!(viewer = %viewer, error = %e, "Viewer failed to join"),
        }
    }

    let scheduler = Scheduler::spawn(Arc::clone(&manager), period);

    let mut sigterm = signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("Failed to install SIGINT handler")?;
    let mut sighup = signal(SignalKind::hangup()).context("Failed to install SIGHUP handler")?;

    let mut step = tokio::time::interval(Duration::from_secs(args.step_secs.max(1)));
    let deadline = async {
        match args.duration_secs {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(deadline);

    info!(viewers = viewers.len(), period_ms = period.as_millis() as u64, "Ready");

    loop {
        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM, initiating shutdown");
                break;
            }
            _ = sigint.recv() => {
                info!("Received SIGINT, initiating shutdown");
                break;
            }
            _ = &mut deadline => {
                info!("Run duration elapsed, initiating shutdown");
                break;
            }
            _ = sighup.recv() => {
                info!("Received SIGHUP, reloading configuration");
                match load_config(&args) {
                    Ok(loaded) => manager.reload(loaded.settings, loaded.definitions),
                    Err(e) => error!(error = %e, "Reload failed, keeping current configuration"),
                }
            }
            _ = step.tick() => {
                sim.step(&host, &manager);
            }
        }
    }

    info!("Shutting down...");
    let ticks = scheduler.shutdown().await;
    for viewer in &viewers {
        manager.on_viewer_leave(viewer);
    }
    info!(ticks, "Roster daemon stopped cleanly");
    Ok(())
}
