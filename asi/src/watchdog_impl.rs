//! Process-based implementation of [`Watchdog`] for the `asi_worker`
//! child: spawns it with `std::process::Command`, polls its exit
//! status for health, and escalates SIGTERM/SIGKILL on shutdown.

use asi_common::watchdog::{HealthStatus, Watchdog, WatchdogError};
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::{Child, Command};
use std::sync::Mutex;
use std::time::{Duration, Instant};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

pub struct AsiWatchdog {
    worker_binary: PathBuf,
    config_path: PathBuf,
    child: Mutex<Option<Child>>,
    restart_history: Mutex<VecDeque<Instant>>,
    max_restarts: u32,
    window: Duration,
}

impl AsiWatchdog {
    pub fn new(worker_binary: PathBuf, config_path: PathBuf, max_restarts: u32, monitoring_interval_secs: u64) -> Self {
        Self {
            worker_binary,
            config_path,
            child: Mutex::new(None),
            restart_history: Mutex::new(VecDeque::new()),
            max_restarts,
            window: Duration::from_secs(monitoring_interval_secs),
        }
    }

    /// Seed the restart-budget window from a persisted snapshot, so a
    /// supervisor restart doesn't forget how many times the worker has
    /// already bounced inside the current window. `ages_secs` are how
    /// long ago (from snapshot time) each restart happened.
    pub fn seed_restart_history(&self, ages_secs: &[u64]) {
        let now = Instant::now();
        let mut history = self.restart_history.lock().unwrap();
        for &age in ages_secs {
            if Duration::from_secs(age) < self.window {
                history.push_back(now - Duration::from_secs(age));
            }
        }
    }

    /// Ages (seconds before "now") of every restart still inside the
    /// current window, for persistence.
    pub fn restart_history_ages_secs(&self) -> Vec<u64> {
        let now = Instant::now();
        self.restart_history
            .lock()
            .unwrap()
            .iter()
            .map(|t| now.duration_since(*t).as_secs())
            .collect()
    }
}

impl Watchdog for AsiWatchdog {
    fn spawn_worker(&mut self, config_path: &Path) -> Result<u32, WatchdogError> {
        let child = Command::new(&self.worker_binary)
            .arg("--config")
            .arg(config_path)
            .spawn()
            .map_err(|e| WatchdogError::SpawnFailed { reason: e.to_string() })?;
        let pid = child.id();
        *self.child.lock().unwrap() = Some(child);
        Ok(pid)
    }

    fn health_check(&self) -> HealthStatus {
        let mut guard = self.child.lock().unwrap();
        match guard.as_mut() {
            None => HealthStatus::Unknown,
            Some(child) => match child.try_wait() {
                Ok(Some(status)) => HealthStatus::Dead { exit_code: status.code() },
                Ok(None) => HealthStatus::Healthy,
                Err(_) => HealthStatus::Unknown,
            },
        }
    }

    fn restart_worker(&mut self) -> Result<u32, WatchdogError> {
        let now = Instant::now();
        {
            let mut history = self.restart_history.lock().unwrap();
            while let Some(&front) = history.front() {
                if now.duration_since(front) >= self.window {
                    history.pop_front();
                } else {
                    break;
                }
            }
            if history.len() as u32 >= self.max_restarts {
                return Err(WatchdogError::RestartsExhausted { max: self.max_restarts, window_secs: self.window.as_secs() });
            }
            history.push_back(now);
        }
        let config_path = self.config_path.clone();
        self.spawn_worker(&config_path)
    }

    fn shutdown(&mut self) -> Result<(), WatchdogError> {
        let mut guard = self.child.lock().unwrap();
        let Some(mut child) = guard.take() else { return Ok(()) };

        let pid = Pid::from_raw(child.id() as i32);
        let _ = signal::kill(pid, Signal::SIGTERM);

        let deadline = Instant::now() + SHUTDOWN_GRACE;
        loop {
            match child.try_wait() {
                Ok(Some(_)) => return Ok(()),
                Ok(None) => {
                    if Instant::now() >= deadline {
                        let _ = child.kill();
                        let _ = child.wait();
                        return Ok(());
                    }
                    std::thread::sleep(Duration::from_millis(100));
                }
                Err(e) => return Err(WatchdogError::Other(e.to_string())),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    /// A shell script that ignores its arguments (so the `--config`
    /// flag `spawn_worker` appends is harmless) and sleeps for
    /// `seconds` before exiting 0.
    fn sleepy_script(dir: &tempfile::TempDir, seconds: u64) -> PathBuf {
        let path = dir.path().join("sleepy.sh");
        std::fs::write(&path, format!("#!/bin/sh\nsleep {seconds}\n")).unwrap();
        let mut perms = std::fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).unwrap();
        path
    }

    fn watchdog(worker_binary: PathBuf, max_restarts: u32, window_secs: u64) -> AsiWatchdog {
        AsiWatchdog::new(worker_binary, PathBuf::from("/dev/null"), max_restarts, window_secs)
    }

    #[test]
    fn spawn_worker_reports_healthy_while_the_child_is_running() {
        let dir = tempfile::tempdir().unwrap();
        let mut wd = watchdog(sleepy_script(&dir, 5), 3, 60);

        let pid = wd.spawn_worker(Path::new("/dev/null")).unwrap();
        assert!(pid > 0);
        assert_eq!(wd.health_check(), HealthStatus::Healthy);

        wd.shutdown().unwrap();
    }

    #[test]
    fn health_check_reports_dead_once_the_child_exits() {
        let dir = tempfile::tempdir().unwrap();
        let mut wd = watchdog(sleepy_script(&dir, 0), 3, 60);
        wd.spawn_worker(Path::new("/dev/null")).unwrap();

        let deadline = Instant::now() + Duration::from_secs(2);
        loop {
            if let HealthStatus::Dead { exit_code } = wd.health_check() {
                assert_eq!(exit_code, Some(0));
                break;
            }
            assert!(Instant::now() < deadline, "worker never reported dead");
            std::thread::sleep(Duration::from_millis(20));
        }
    }

    #[test]
    fn health_check_is_unknown_before_any_spawn() {
        let wd = watchdog(PathBuf::from("/bin/true"), 3, 60);
        assert_eq!(wd.health_check(), HealthStatus::Unknown);
    }

    #[test]
    fn shutdown_terminates_a_running_child_within_the_grace_period() {
        let dir = tempfile::tempdir().unwrap();
        let mut wd = watchdog(sleepy_script(&dir, 30), 3, 60);
        wd.spawn_worker(Path::new("/dev/null")).unwrap();

        let start = Instant::now();
        wd.shutdown().unwrap();
        assert!(start.elapsed() < SHUTDOWN_GRACE, "shutdown should terminate via SIGTERM, not wait for the grace timeout");
        assert_eq!(wd.health_check(), HealthStatus::Unknown);
    }

    #[test]
    fn restart_worker_is_rejected_once_the_budget_is_exhausted() {
        let mut wd = watchdog(PathBuf::from("/bin/true"), 2, 60);

        assert!(wd.restart_worker().is_ok());
        assert!(wd.restart_worker().is_ok());
        match wd.restart_worker() {
            Err(WatchdogError::RestartsExhausted { max: 2, window_secs: 60 }) => {}
            other => panic!("expected RestartsExhausted, got {other:?}"),
        }
    }

    #[test]
    fn seed_restart_history_drops_entries_outside_the_window_and_round_trips_ages() {
        let wd = watchdog(PathBuf::from("/bin/true"), 5, 60);
        wd.seed_restart_history(&[5, 50, 120]);

        let ages = wd.restart_history_ages_secs();
        assert_eq!(ages.len(), 2, "the 120s-old entry is outside the 60s window and must be dropped");
        for age in ages {
            assert!(age <= 50, "seeded age should not have grown past its original value by more than rounding");
        }
    }

    #[test]
    fn seeded_restart_history_counts_toward_the_budget() {
        let wd = watchdog(PathBuf::from("/bin/true"), 2, 60);
        wd.seed_restart_history(&[1, 2]);

        let mut wd = wd;
        match wd.restart_worker() {
            Err(WatchdogError::RestartsExhausted { max: 2, window_secs: 60 }) => {}
            other => panic!("seeded history should already fill the budget, got {other:?}"),
        }
    }
}
