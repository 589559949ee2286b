//! # Watchdog Trait
//!
//! Defines the supervisor contract for worker process lifecycle
//! management. The `asi` binary implements this trait to spawn,
//! monitor, restart, and shut down the `asi_worker` child process.
//!
//! # Design
//!
//! The trait is deliberately thin — a single managed child, one
//! health signal, restart-with-bound semantics. It does not mandate a
//! specific process management strategy (fork/exec, systemd, container).

/// Health status returned by [`Watchdog::health_check`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Worker is running and its heartbeat is current.
    Healthy,
    /// Worker process is alive but heartbeat is stale (possible hang).
    Stale {
        /// Seconds since last heartbeat update.
        age_secs: u64,
    },
    /// Worker process has exited.
    Dead {
        /// Exit code if available.
        exit_code: Option<i32>,
    },
    /// Worker was never started or is not being tracked.
    Unknown,
}

/// Error type for watchdog operations.
#[derive(Debug, thiserror::Error)]
pub enum WatchdogError {
    /// Failed to spawn the worker process.
    #[error("failed to spawn worker: {reason}")]
    SpawnFailed { reason: String },

    /// Worker did not become ready within the expected timeout.
    #[error("worker not ready after {timeout_s:.1}s")]
    ReadyTimeout { timeout_s: f64 },

    /// Maximum restart attempts exhausted within the monitoring window.
    #[error("max restarts ({max}) exhausted within {window_secs}s")]
    RestartsExhausted { max: u32, window_secs: u64 },

    /// Generic I/O or system error.
    #[error("watchdog error: {0}")]
    Other(String),
}

/// Supervisor contract for worker process lifecycle management.
///
/// Implementors manage spawning the worker, health monitoring via its
/// heartbeat, bounded restart, and coordinated shutdown.
pub trait Watchdog {
    /// Spawn the worker process.
    ///
    /// Returns the OS PID of the spawned process on success. The
    /// implementation forwards `config_path` to the child via a
    /// `--config` CLI argument.
    fn spawn_worker(&mut self, config_path: &std::path::Path) -> Result<u32, WatchdogError>;

    /// Query the health of the managed worker.
    fn health_check(&self) -> HealthStatus;

    /// Restart the worker after it has died or become unhealthy.
    ///
    /// Counts against the rolling restart budget. Returns
    /// [`WatchdogError::RestartsExhausted`] once that budget is spent.
    fn restart_worker(&mut self) -> Result<u32, WatchdogError>;

    /// Shut down the worker gracefully.
    ///
    /// Expected sequence: send SIGTERM, wait up to a timeout for
    /// graceful exit, escalate to SIGKILL for an unresponsive process.
    fn shutdown(&mut self) -> Result<(), WatchdogError>;
}
