//! System-wide constants for the ASI workspace.
//!
//! Single source of truth for all numeric limits and default paths.
//! Imported by all crates — no duplication permitted. Every value here
//! is the documented default; runtime config (see [`crate::config`])
//! may override most of them within validated bounds.

/// Number of static action-list entries.
pub const ACTION_COUNT: usize = 12;

/// Number of static message-dictionary entries.
pub const MESSAGE_DICTIONARY_COUNT: usize = 22;

/// Number of static message-kind entries.
pub const MESSAGE_KIND_COUNT: usize = 5;

/// Sentinel for an unassigned message id.
pub const UNASSIGNED_MESSAGE_ID: u16 = 0xFFFF;

/// Fixed TLV frame size in bytes.
pub const TLV_FRAME_LEN: usize = 36;

/// Rolling-counter / sequence violations tolerated before escalation.
pub const ROLLING_COUNTER_VIOLATION_LIMIT: u8 = 3;

/// Consecutive CRC errors on one role before that role's session is fatal.
pub const CRC_ERROR_FATAL_LIMIT: u8 = 3;

/// Message timeout, in CCU cycles.
pub const MSG_TIMEOUT_MAX_VALUE: u8 = 25;

/// Ack response time limit, in CCU cycles.
pub const ACK_MESG_RESPONSE_TIME_LIMIT: u8 = 35;

/// Calibration readback response time limit, in CCU cycles.
pub const CAL_READBACK_RESPONSE_TIME_LIMIT: u8 = 50;

/// Bound on outstanding action-request timing entries.
pub const MAX_PENDING_ACTION_REQUESTS: usize = 10;

/// Wall-clock deadline for an approved action from request start.
pub const ACTION_REQUEST_DEADLINE_MS: u64 = 50;

/// Allowed margin around zero speed while treating PRNDL as Park.
pub const VEHICLE_SPEED_ERROR_MARGIN: f32 = 0.20;

/// Capacity of the approved / integrity / safe-state ring queues.
pub const QUEUE_CAPACITY: usize = 20;

/// Capacity of the bounded fault event queue.
pub const EVENT_QUEUE_CAPACITY: usize = 32;

/// Restart bound for a single task or for the supervised worker.
pub const MAX_RESTARTS: u32 = 5;

/// Window, in seconds, over which [`MAX_RESTARTS`] is counted.
pub const MONITORING_INTERVAL_SECS: u64 = 5;

/// Cadence at which the parent persists shared state.
pub const STORAGE_WRITE_INTERVAL_SECS: u64 = 2;

/// Overrun budget multiplier applied to each task's period.
pub const OVERRUN_BUDGET_FACTOR: f64 = 1.2;

/// Timed-wait fallback so cancellation is observed with no timer posts.
pub const CANCELLATION_POLL_MS: u64 = 100;

/// `5 * MAX_CHILD_RESTART_RETRIES` seconds, the join timeout on shutdown.
pub const MAX_CHILD_RESTART_RETRIES: u64 = 5;

/// VAM endpoint TCP port.
pub const VAM_PORT: u16 = 8080;

/// CM endpoint TCP port.
pub const CM_PORT: u16 = 9090;

/// TCP connect timeout.
pub const TCP_CONNECT_TIMEOUT_MS: u64 = 1000;

/// Maximum TCP reconnect attempts before giving up for the current tick.
pub const TCP_RECONNECT_ATTEMPTS: u32 = 3;

/// Backoff between TCP reconnect attempts.
pub const TCP_RECONNECT_BACKOFF_MS: u64 = 100;

/// Health-check cadence, in SD cycles.
pub const HEALTH_CHECK_INTERVAL_CYCLES: u64 = 25;

/// Health-check round-trip deadline.
pub const HEALTH_CHECK_DEADLINE_MS: u64 = 500;

/// Default configuration directory path.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/asi/config";

/// Default primary persisted-state file name.
pub const DEFAULT_STATE_FILE_PRIMARY: &str = "asi_state_a.bin";

/// Default secondary (redundant) persisted-state file name.
pub const DEFAULT_STATE_FILE_SECONDARY: &str = "asi_state_b.bin";

/// Default primary file for the worker's own pipeline state
/// (`CommonState`) snapshot, distinct from the supervisor's own
/// restart-bookkeeping snapshot above.
pub const DEFAULT_WORKER_STATE_FILE_PRIMARY: &str = "asi_worker_state_a.bin";

/// Default secondary (redundant) file for the worker's pipeline state.
pub const DEFAULT_WORKER_STATE_FILE_SECONDARY: &str = "asi_worker_state_b.bin";

/// Exit code for normal shutdown.
pub const EXIT_NORMAL: i32 = 0;

/// Exit code for a fatal initialization error.
pub const EXIT_FATAL_INIT: i32 = 1;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constants_are_consistent() {
        assert!(ACTION_COUNT > 0);
        assert!(MESSAGE_DICTIONARY_COUNT > 0);
        assert!(MESSAGE_KIND_COUNT > 0);
        assert_eq!(TLV_FRAME_LEN, 36);
        assert!(MAX_PENDING_ACTION_REQUESTS > 0);
        assert!(QUEUE_CAPACITY >= ACTION_COUNT as usize / 2);
        assert!(EVENT_QUEUE_CAPACITY > 0);
    }

    #[test]
    fn timeouts_are_strictly_ordered() {
        // Spec §4.2: message timeout < ack timeout < calibration readback timeout.
        assert!(MSG_TIMEOUT_MAX_VALUE < ACK_MESG_RESPONSE_TIME_LIMIT);
        assert!(ACK_MESG_RESPONSE_TIME_LIMIT < CAL_READBACK_RESPONSE_TIME_LIMIT);
    }

    #[test]
    fn restart_bounds_are_positive() {
        assert!(MAX_RESTARTS > 0);
        assert!(MONITORING_INTERVAL_SECS > 0);
        assert!(STORAGE_WRITE_INTERVAL_SECS > 0);
    }
}
