//! # ASI Supervisor
//!
//! Parent process of the safety-interlock supervisor: spawns and
//! monitors the `asi_worker` child, restarting it within a bounded
//! budget, and periodically persists its own restart bookkeeping so a
//! supervisor restart doesn't forget an in-progress budget window.

mod watchdog_impl;

use asi_common::config::{AsiConfig, ConfigLoader};
use asi_common::consts::{EXIT_FATAL_INIT, EXIT_NORMAL};
use asi_common::persistence;
use asi_common::watchdog::{HealthStatus, Watchdog, WatchdogError};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tokio::signal::unix::{signal, SignalKind};
use tokio::time::interval;
use tracing::{error, info, warn};
use watchdog_impl::AsiWatchdog;

#[derive(Parser, Debug)]
#[command(name = "asi", about = "Safety interlock supervisor: parent process")]
struct Args {
    /// Path to the shared TOML configuration file.
    #[arg(long, default_value = asi_common::consts::DEFAULT_CONFIG_PATH)]
    config: String,
}

/// Persisted supervisor bookkeeping, written every `storage_write_interval_secs`.
#[derive(Debug, Serialize, Deserialize)]
struct SupervisorSnapshot {
    restart_ages_secs: Vec<u64>,
}

fn worker_binary_path() -> PathBuf {
    let mut path = std::env::current_exe().unwrap_or_else(|_| PathBuf::from("asi"));
    path.set_file_name(if cfg!(windows) { "asi_worker.exe" } else { "asi_worker" });
    path
}

fn persist_snapshot(watchdog: &AsiWatchdog, config: &AsiConfig) {
    let snapshot = SupervisorSnapshot { restart_ages_secs: watchdog.restart_history_ages_secs() };
    let payload = match serde_json::to_vec(&snapshot) {
        Ok(p) => p,
        Err(e) => {
            warn!(error = %e, "failed to serialize supervisor snapshot");
            return;
        }
    };
    let primary = config.supervisor.primary_state_path();
    let secondary = config.supervisor.secondary_state_path();
    if let Some(dir) = primary.parent() {
        let _ = std::fs::create_dir_all(dir);
    }
    if let Err(e) = persistence::write_snapshot(&primary, &payload) {
        warn!(error = %e, "failed to write primary supervisor snapshot");
    }
    if let Err(e) = persistence::write_snapshot(&secondary, &payload) {
        warn!(error = %e, "failed to write secondary supervisor snapshot");
    }
}

fn restore_restart_history(watchdog: &AsiWatchdog, config: &AsiConfig) {
    let primary = config.supervisor.primary_state_path();
    let secondary = config.supervisor.secondary_state_path();
    let Some(bytes) = persistence::restore_preferred(&primary, &secondary) else {
        info!("no prior supervisor snapshot found, starting with a clean restart budget");
        return;
    };
    match serde_json::from_slice::<SupervisorSnapshot>(&bytes) {
        Ok(snapshot) => watchdog.seed_restart_history(&snapshot.restart_ages_secs),
        Err(e) => warn!(error = %e, "ignoring unparseable supervisor snapshot"),
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let config_path = PathBuf::from(&args.config);
    let config = match AsiConfig::load_or_default(&config_path) {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "failed to load configuration");
            std::process::exit(EXIT_FATAL_INIT);
        }
    };

    info!("asi supervisor starting");

    let mut watchdog = AsiWatchdog::new(
        worker_binary_path(),
        config_path.clone(),
        config.supervisor.max_restarts,
        config.supervisor.monitoring_interval_secs,
    );
    restore_restart_history(&watchdog, &config);

    match watchdog.spawn_worker(&config_path) {
        Ok(pid) => info!(pid, "asi_worker spawned"),
        Err(e) => {
            error!(error = %e, "failed to spawn asi_worker");
            std::process::exit(EXIT_FATAL_INIT);
        }
    }

    let mut monitor_tick = interval(Duration::from_secs(1));
    let mut persist_tick = interval(Duration::from_secs(config.supervisor.storage_write_interval_secs.max(1)));
    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");

    let exit_code = loop {
        tokio::select! {
            _ = monitor_tick.tick() => {
                if let HealthStatus::Dead { exit_code } = watchdog.health_check() {
                    error!(?exit_code, "asi_worker exited, attempting restart");
                    match watchdog.restart_worker() {
                        Ok(pid) => info!(pid, "asi_worker restarted"),
                        Err(WatchdogError::RestartsExhausted { max, window_secs }) => {
                            error!(max, window_secs, "restart budget exhausted, entering fatal halt");
                            break EXIT_FATAL_INIT;
                        }
                        Err(e) => {
                            error!(error = %e, "failed to restart asi_worker");
                            break EXIT_FATAL_INIT;
                        }
                    }
                }
            }
            _ = persist_tick.tick() => {
                persist_snapshot(&watchdog, &config);
            }
            _ = tokio::signal::ctrl_c() => {
                info!("received SIGINT, shutting down");
                break EXIT_NORMAL;
            }
            _ = sigterm.recv() => {
                info!("received SIGTERM, shutting down");
                break EXIT_NORMAL;
            }
        }
    };

    if let Err(e) = watchdog.shutdown() {
        error!(error = %e, "error shutting down asi_worker");
    }
    persist_snapshot(&watchdog, &config);

    info!(exit_code, "asi supervisor stopped");
    std::process::exit(exit_code);
}
