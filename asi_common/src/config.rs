//! Configuration loading traits and types.
//!
//! Provides a standardized way to load TOML configuration files across
//! the `asi` and `asi_worker` binaries, including validation against
//! the numeric bounds spec.md §2/§4 establishes as defaults.
//!
//! # Usage
//!
//! ```rust,no_run
//! use asi_common::config::{AsiConfig, ConfigLoader};
//! use std::path::Path;
//!
//! let config = AsiConfig::load(Path::new("config.toml")).expect("load config");
//! println!("worker: {}", config.shared.service_name);
//! ```

use crate::consts;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Log level for configuration (drives `tracing_subscriber::EnvFilter`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub const fn as_tracing_filter(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Error type for configuration loading operations.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("configuration file not found")]
    FileNotFound,
    #[error("failed to parse configuration: {0}")]
    ParseError(String),
    #[error("configuration validation failed: {0}")]
    ValidationError(String),
}

/// Fields shared across all ASI binaries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedConfig {
    #[serde(default = "default_log_level")]
    pub log_level: LogLevel,
    pub service_name: String,
}

fn default_log_level() -> LogLevel {
    LogLevel::Info
}

impl SharedConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_name.is_empty() {
            return Err(ConfigError::ValidationError(
                "service_name cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Trait for loading configuration from TOML files.
///
/// - Returns `ConfigError::FileNotFound` if the file does not exist.
/// - Returns `ConfigError::ParseError` if TOML syntax is invalid.
/// - Returns `ConfigError::ValidationError` if semantic validation fails.
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound
            } else {
                ConfigError::ParseError(e.to_string())
            }
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}

// ─── Per-task scheduler configuration ──────────────

/// One row of the eight-task schedule.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TaskScheduleConfig {
    pub period_ms: u64,
    pub priority: i32,
}

/// Scheduling parameters for all eight tasks, defaulting to spec §2's table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_ccu")]
    pub ccu: TaskScheduleConfig,
    #[serde(default = "default_fm")]
    pub fm: TaskScheduleConfig,
    #[serde(default = "default_stm")]
    pub stm: TaskScheduleConfig,
    #[serde(default = "default_icm_rx")]
    pub icm_rx: TaskScheduleConfig,
    #[serde(default = "default_icm_tx")]
    pub icm_tx: TaskScheduleConfig,
    #[serde(default = "default_ara")]
    pub ara: TaskScheduleConfig,
    #[serde(default = "default_crv")]
    pub crv: TaskScheduleConfig,
    #[serde(default = "default_sd")]
    pub sd: TaskScheduleConfig,
}

fn default_ccu() -> TaskScheduleConfig { TaskScheduleConfig { period_ms: 25, priority: 90 } }
fn default_fm() -> TaskScheduleConfig { TaskScheduleConfig { period_ms: 25, priority: 80 } }
fn default_stm() -> TaskScheduleConfig { TaskScheduleConfig { period_ms: 50, priority: 80 } }
fn default_icm_rx() -> TaskScheduleConfig { TaskScheduleConfig { period_ms: 50, priority: 70 } }
fn default_icm_tx() -> TaskScheduleConfig { TaskScheduleConfig { period_ms: 50, priority: 70 } }
fn default_ara() -> TaskScheduleConfig { TaskScheduleConfig { period_ms: 50, priority: 60 } }
fn default_crv() -> TaskScheduleConfig { TaskScheduleConfig { period_ms: 50, priority: 50 } }
fn default_sd() -> TaskScheduleConfig { TaskScheduleConfig { period_ms: 200, priority: 40 } }

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            ccu: default_ccu(),
            fm: default_fm(),
            stm: default_stm(),
            icm_rx: default_icm_rx(),
            icm_tx: default_icm_tx(),
            ara: default_ara(),
            crv: default_crv(),
            sd: default_sd(),
        }
    }
}

impl ScheduleConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, t) in [
            ("ccu", &self.ccu), ("fm", &self.fm), ("stm", &self.stm),
            ("icm_rx", &self.icm_rx), ("icm_tx", &self.icm_tx),
            ("ara", &self.ara), ("crv", &self.crv), ("sd", &self.sd),
        ] {
            if t.period_ms == 0 {
                return Err(ConfigError::ValidationError(format!("schedule.{name}.period_ms must be > 0")));
            }
        }
        Ok(())
    }
}

// ─── TCP endpoint configuration ──────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_vam_endpoint")]
    pub vam: EndpointConfig,
    #[serde(default = "default_cm_endpoint")]
    pub cm: EndpointConfig,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_reconnect_attempts")]
    pub reconnect_attempts: u32,
    #[serde(default = "default_reconnect_backoff_ms")]
    pub reconnect_backoff_ms: u64,
}

fn default_vam_endpoint() -> EndpointConfig { EndpointConfig { host: "127.0.0.1".into(), port: consts::VAM_PORT } }
fn default_cm_endpoint() -> EndpointConfig { EndpointConfig { host: "127.0.0.1".into(), port: consts::CM_PORT } }
fn default_connect_timeout_ms() -> u64 { consts::TCP_CONNECT_TIMEOUT_MS }
fn default_reconnect_attempts() -> u32 { consts::TCP_RECONNECT_ATTEMPTS }
fn default_reconnect_backoff_ms() -> u64 { consts::TCP_RECONNECT_BACKOFF_MS }

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            vam: default_vam_endpoint(),
            cm: default_cm_endpoint(),
            connect_timeout_ms: default_connect_timeout_ms(),
            reconnect_attempts: default_reconnect_attempts(),
            reconnect_backoff_ms: default_reconnect_backoff_ms(),
        }
    }
}

// ─── Supervisor / restart configuration ────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorConfig {
    #[serde(default = "default_max_restarts")]
    pub max_restarts: u32,
    #[serde(default = "default_monitoring_interval_secs")]
    pub monitoring_interval_secs: u64,
    #[serde(default = "default_storage_write_interval_secs")]
    pub storage_write_interval_secs: u64,
    #[serde(default = "default_state_dir")]
    pub state_dir: String,
}

fn default_max_restarts() -> u32 { consts::MAX_RESTARTS }
fn default_monitoring_interval_secs() -> u64 { consts::MONITORING_INTERVAL_SECS }
fn default_storage_write_interval_secs() -> u64 { consts::STORAGE_WRITE_INTERVAL_SECS }
fn default_state_dir() -> String { "/var/lib/asi".to_string() }

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            max_restarts: default_max_restarts(),
            monitoring_interval_secs: default_monitoring_interval_secs(),
            storage_write_interval_secs: default_storage_write_interval_secs(),
            state_dir: default_state_dir(),
        }
    }
}

impl SupervisorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_restarts == 0 {
            return Err(ConfigError::ValidationError("supervisor.max_restarts must be > 0".into()));
        }
        if self.monitoring_interval_secs == 0 {
            return Err(ConfigError::ValidationError("supervisor.monitoring_interval_secs must be > 0".into()));
        }
        Ok(())
    }

    pub fn primary_state_path(&self) -> std::path::PathBuf {
        std::path::Path::new(&self.state_dir).join(consts::DEFAULT_STATE_FILE_PRIMARY)
    }

    pub fn secondary_state_path(&self) -> std::path::PathBuf {
        std::path::Path::new(&self.state_dir).join(consts::DEFAULT_STATE_FILE_SECONDARY)
    }

    /// Path for the worker's own pipeline-state snapshot (spec §4.1/§6's
    /// "shared region" persistence), kept apart from the supervisor's
    /// restart-bookkeeping snapshot above so the two writers never
    /// contend for the same file.
    pub fn worker_primary_state_path(&self) -> std::path::PathBuf {
        std::path::Path::new(&self.state_dir).join(consts::DEFAULT_WORKER_STATE_FILE_PRIMARY)
    }

    pub fn worker_secondary_state_path(&self) -> std::path::PathBuf {
        std::path::Path::new(&self.state_dir).join(consts::DEFAULT_WORKER_STATE_FILE_SECONDARY)
    }
}

// ─── Rate limiter configuration ────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_allowed_messages")]
    pub allowed_messages: u32,
    #[serde(default = "default_time_window_ms")]
    pub time_window_ms: u64,
}

fn default_allowed_messages() -> u32 { 20 }
fn default_time_window_ms() -> u64 { 1000 }

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self { allowed_messages: default_allowed_messages(), time_window_ms: default_time_window_ms() }
    }
}

// ─── Top-level configuration ────────────────────────────────────────

/// Top-level configuration shared by `asi` and `asi_worker`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AsiConfig {
    pub shared: SharedConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub supervisor: SupervisorConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

impl AsiConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;
        self.schedule.validate()?;
        self.supervisor.validate()?;
        Ok(())
    }

    /// Load and validate from a TOML file; returns the spec-default
    /// configuration if `path` does not exist (first-run convenience,
    /// matching the teacher's tolerant `load_config_dir` style).
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        match Self::load(path) {
            Ok(cfg) => {
                cfg.validate()?;
                Ok(cfg)
            }
            Err(ConfigError::FileNotFound) => {
                let cfg = Self::default();
                cfg.validate()?;
                Ok(cfg)
            }
            Err(e) => Err(e),
        }
    }
}

impl Default for AsiConfig {
    fn default() -> Self {
        Self {
            shared: SharedConfig { log_level: LogLevel::Info, service_name: "asi".to_string() },
            schedule: ScheduleConfig::default(),
            network: NetworkConfig::default(),
            supervisor: SupervisorConfig::default(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn default_config_validates() {
        assert!(AsiConfig::default().validate().is_ok());
    }

    #[test]
    fn load_or_default_falls_back_on_missing_file() {
        let path = std::path::Path::new("/nonexistent/path/asi.toml");
        let cfg = AsiConfig::load_or_default(path).unwrap();
        assert_eq!(cfg.shared.service_name, "asi");
    }

    #[test]
    fn empty_service_name_fails_validation() {
        let mut cfg = AsiConfig::default();
        cfg.shared.service_name.clear();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn round_trips_through_toml() {
        let cfg = AsiConfig::default();
        let toml_str = toml::to_string(&cfg).unwrap();
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), toml_str).unwrap();
        let loaded = AsiConfig::load(file.path()).unwrap();
        assert_eq!(loaded.schedule.ccu.period_ms, cfg.schedule.ccu.period_ms);
    }
}
