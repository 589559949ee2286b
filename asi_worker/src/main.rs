//! # ASI Worker
//!
//! Child process supervised by `asi`: hosts the eight periodic tasks of
//! the safety-interlock pipeline on their own OS threads, against one
//! TCP connection to the Vehicle Automation Module and one to the
//! Control Module.

use asi_common::config::{AsiConfig, ConfigLoader};
use asi_common::consts::EXIT_FATAL_INIT;
use asi_worker::net::TcpEndpoint;
use asi_worker::scheduler::{Scheduler, StartStatus, TaskSpec};
use asi_worker::shared::Shared;
use asi_worker::tasks;
use clap::Parser;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "asi_worker", about = "Safety interlock supervisor worker")]
struct Args {
    /// Path to the worker's TOML configuration file.
    #[arg(long, default_value = asi_common::consts::DEFAULT_CONFIG_PATH)]
    config: String,
}

fn main() {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let config = match AsiConfig::load_or_default(std::path::Path::new(&args.config)) {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "failed to load configuration");
            std::process::exit(EXIT_FATAL_INIT);
        }
    };

    info!("asi_worker starting");

    let vam = Arc::new(Mutex::new(TcpEndpoint::new(
        "vam",
        &config.network.vam,
        config.network.connect_timeout_ms,
        config.network.reconnect_attempts,
        config.network.reconnect_backoff_ms,
    )));
    let cm = Arc::new(Mutex::new(TcpEndpoint::new(
        "cm",
        &config.network.cm,
        config.network.connect_timeout_ms,
        config.network.reconnect_attempts,
        config.network.reconnect_backoff_ms,
    )));

    let schedule = config.schedule.clone();
    let state_primary = config.supervisor.worker_primary_state_path();
    let state_secondary = config.supervisor.worker_secondary_state_path();
    let persist_interval = Duration::from_secs(config.supervisor.storage_write_interval_secs.max(1));
    let shared = Arc::new(Shared::new(config));

    // Soft recovery: reload the pipeline state a prior instance of this
    // binary persisted, then mark init complete so STM can advance past
    // `Initial` on its own schedule.
    asi_worker::persist::restore_into(&shared, &state_primary, &state_secondary);
    shared.common.lock().unwrap().init_complete = true;

    let specs = build_task_specs(&schedule, vam, cm);
    let (mut scheduler, status) = Scheduler::start(specs, shared.clone());
    if status != StartStatus::Started {
        error!(?status, "failed to start task scheduler");
        std::process::exit(EXIT_FATAL_INIT);
    }

    let persist_handle = {
        let shared = shared.clone();
        let primary = state_primary.clone();
        let secondary = state_secondary.clone();
        std::thread::Builder::new()
            .name("persist".to_string())
            .spawn(move || {
                while !shared.is_shutting_down() {
                    std::thread::sleep(persist_interval);
                    if shared.is_shutting_down() {
                        break;
                    }
                    asi_worker::persist::persist_now(&shared, &primary, &secondary);
                }
            })
            .ok()
    };

    let monitor_period = Duration::from_millis(200);
    loop {
        if shared.is_shutting_down() {
            break;
        }
        std::thread::sleep(monitor_period);
        if scheduler.monitor(&shared) {
            error!("a task exceeded its restart budget, shutting down");
            break;
        }
    }

    shared.shutdown.store(true, std::sync::atomic::Ordering::SeqCst);
    scheduler.shutdown(&shared);
    asi_worker::persist::persist_now(&shared, &state_primary, &state_secondary);
    if let Some(h) = persist_handle {
        let _ = h.join();
    }
    info!("asi_worker stopped");
}

fn build_task_specs(
    schedule: &asi_common::config::ScheduleConfig,
    vam: Arc<Mutex<TcpEndpoint>>,
    cm: Arc<Mutex<TcpEndpoint>>,
) -> Vec<TaskSpec> {
    vec![
        TaskSpec {
            name: "ccu",
            period: Duration::from_millis(schedule.ccu.period_ms),
            priority: schedule.ccu.priority,
            body: Box::new(|shared| tasks::ccu::tick(shared)),
        },
        TaskSpec {
            name: "fm",
            period: Duration::from_millis(schedule.fm.period_ms),
            priority: schedule.fm.priority,
            body: Box::new(|shared| tasks::fm::tick(shared)),
        },
        TaskSpec {
            name: "stm",
            period: Duration::from_millis(schedule.stm.period_ms),
            priority: schedule.stm.priority,
            body: Box::new(|shared| tasks::stm::tick(shared)),
        },
        TaskSpec {
            name: "icm_rx",
            period: Duration::from_millis(schedule.icm_rx.period_ms),
            priority: schedule.icm_rx.priority,
            body: {
                let vam = vam.clone();
                let cm = cm.clone();
                Box::new(move |shared| tasks::icm_rx::tick(shared, &vam, &cm))
            },
        },
        TaskSpec {
            name: "icm_tx",
            period: Duration::from_millis(schedule.icm_tx.period_ms),
            priority: schedule.icm_tx.priority,
            body: {
                let vam = vam.clone();
                let cm = cm.clone();
                Box::new(move |shared| tasks::icm_tx::tick(shared, &vam, &cm))
            },
        },
        TaskSpec {
            name: "ara",
            period: Duration::from_millis(schedule.ara.period_ms),
            priority: schedule.ara.priority,
            body: Box::new(|shared| tasks::ara::tick(shared)),
        },
        TaskSpec {
            name: "crv",
            period: Duration::from_millis(schedule.crv.period_ms),
            priority: schedule.crv.priority,
            body: Box::new(|shared| tasks::crv::tick(shared)),
        },
        TaskSpec {
            name: "sd",
            period: Duration::from_millis(schedule.sd.period_ms),
            priority: schedule.sd.priority,
            body: {
                let vam = vam.clone();
                let cm = cm.clone();
                Box::new(move |shared| tasks::sd::tick(shared, &vam, &cm))
            },
        },
    ]
}
