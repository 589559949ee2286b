//! Shared state region.
//!
//! One owned record replaces the original single shared-memory block:
//! a single `common` mutex guards everything every task may touch, and
//! each task that needs data nobody else touches gets its own private
//! mutex. Lock order is always **private → common**, matching spec §5,
//! enforced here simply by never holding a private lock across a call
//! that takes `common`.

use asi_common::config::AsiConfig;
use asi_common::consts::{
    EVENT_QUEUE_CAPACITY, MAX_PENDING_ACTION_REQUESTS, MESSAGE_DICTIONARY_COUNT, QUEUE_CAPACITY,
};
use asi_common::dictionary::{MessageRole, MESSAGE_DICTIONARY};
use asi_common::events::{EventId, Notification, Severity, SystemSnapshot};
use asi_common::ratelimit::TokenBucket;
use asi_common::state::{AsiState, VehicleStatus};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Instant;
use tracing::{info, warn};

/// Post-parse carrier between ICM-RX and downstream tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessMsg {
    pub r#type: u16,
    pub length: u16,
    pub msg_id: u16,
    pub seq: u16,
    pub payload: [u8; 8],
}

/// Tracks a message awaiting ack or calibration readback.
#[derive(Debug, Clone, Copy)]
pub struct IntegrityRecord {
    pub msg_id: u16,
    pub seq: u16,
    pub response_cycle_count: u8,
    pub role: MessageRole,
    pub clear_condition: ClearCondition,
    pub r#type: u16,
    pub created_at_cycle: u64,
}

/// What clears an [`IntegrityRecord`], and which timeout/event pair
/// applies while it's outstanding (resolves the spec §4.2/§7 overlap
/// between the three timeout constants and the two timeout events):
///
/// - `PendingDispatch`: an action request sitting in the integrity
///   queue, not yet picked up by ARA. Deadline `MSG_TIMEOUT_MAX_VALUE`;
///   exceeding it raises `EventId::MsgTimeout`.
/// - `Ack`: outbound message awaiting an ack frame. Deadline
///   `ACK_MESG_RESPONSE_TIME_LIMIT`; exceeding it raises `EventId::AckLoss`.
/// - `CalibrationReadback`: awaiting the CRV readback echo. Deadline
///   `CAL_READBACK_RESPONSE_TIME_LIMIT`; exceeding it raises
///   `EventId::CalReadbackTimeout`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearCondition {
    PendingDispatch,
    Ack,
    CalibrationReadback,
}

impl ClearCondition {
    pub fn deadline_cycles(self) -> u64 {
        use asi_common::consts::{ACK_MESG_RESPONSE_TIME_LIMIT, CAL_READBACK_RESPONSE_TIME_LIMIT, MSG_TIMEOUT_MAX_VALUE};
        match self {
            ClearCondition::PendingDispatch => MSG_TIMEOUT_MAX_VALUE as u64,
            ClearCondition::Ack => ACK_MESG_RESPONSE_TIME_LIMIT as u64,
            ClearCondition::CalibrationReadback => CAL_READBACK_RESPONSE_TIME_LIMIT as u64,
        }
    }

    pub fn timeout_event(self) -> EventId {
        match self {
            ClearCondition::PendingDispatch => EventId::MsgTimeout,
            ClearCondition::Ack => EventId::AckLoss,
            ClearCondition::CalibrationReadback => EventId::CalReadbackTimeout,
        }
    }
}

/// `(msg_id, seq, started_at_monotonic)`.
#[derive(Debug, Clone, Copy)]
pub struct ActionRequestTiming {
    pub msg_id: u16,
    pub seq: u16,
    pub started_at: Instant,
}

/// CRV's copy/readback tracker entry.
#[derive(Debug, Clone, Copy)]
pub struct CrvEntry {
    pub msg_id: u16,
    pub seq: u16,
    pub payload: [u8; 8],
    pub created_at_cycle: u64,
}

/// An enqueued fault with its captured snapshot.
#[derive(Debug, Clone, Copy)]
pub struct EventRecord {
    pub id: EventId,
    pub snapshot: SystemSnapshot,
}

/// Rolling counter state for one role.
#[derive(Debug, Clone, Copy, Default)]
pub struct RollingCounterState {
    pub rx: u16,
    pub tx: u16,
    pub consecutive_violations: u8,
}

/// Sequence-number state for one role.
#[derive(Debug, Clone, Copy, Default)]
pub struct SequenceState {
    pub last_seen: u16,
    pub last_emitted: u16,
}

/// Look up a role's fixed position in [`MESSAGE_DICTIONARY`] once, so
/// every per-role array can be indexed directly rather than re-scanning
/// (the scan itself still happens here, keyed by role value, never by
/// arithmetic on an enum discriminant — spec §9 design note).
pub fn dictionary_index(role: MessageRole) -> Option<usize> {
    MESSAGE_DICTIONARY.iter().position(|e| e.role == role)
}

/// Cross-task state guarded by the one common mutex.
pub struct CommonState {
    pub asi_state: AsiState,
    pub critical_fault_flag: bool,
    pub init_complete: bool,
    pub startup_test_passed: Option<bool>,
    pub cycle_count: u64,

    pub vehicle_status: VehicleStatus,

    pub rolling_counters: [RollingCounterState; MESSAGE_DICTIONARY_COUNT],
    pub sequence_numbers: [SequenceState; MESSAGE_DICTIONARY_COUNT],

    pub integrity_queue: heapless::Vec<ProcessMsg, QUEUE_CAPACITY>,
    pub approved_queue: heapless::Vec<ProcessMsg, QUEUE_CAPACITY>,
    pub ss_queue: heapless::Vec<Notification, QUEUE_CAPACITY>,
    pub notification_queue: heapless::Vec<Notification, QUEUE_CAPACITY>,

    pub integrity_trackers: heapless::Vec<IntegrityRecord, QUEUE_CAPACITY>,
    pub action_request_timing: heapless::Vec<ActionRequestTiming, MAX_PENDING_ACTION_REQUESTS>,
    pub crv_copy: heapless::Vec<CrvEntry, QUEUE_CAPACITY>,
    pub crv_readback: heapless::Vec<CrvEntry, QUEUE_CAPACITY>,

    pub event_queue: heapless::Vec<EventRecord, EVENT_QUEUE_CAPACITY>,
}

impl CommonState {
    fn new() -> Self {
        Self {
            asi_state: AsiState::default(),
            critical_fault_flag: false,
            init_complete: false,
            startup_test_passed: None,
            cycle_count: 0,
            vehicle_status: VehicleStatus::default(),
            rolling_counters: [RollingCounterState::default(); MESSAGE_DICTIONARY_COUNT],
            sequence_numbers: [SequenceState::default(); MESSAGE_DICTIONARY_COUNT],
            integrity_queue: heapless::Vec::new(),
            approved_queue: heapless::Vec::new(),
            ss_queue: heapless::Vec::new(),
            notification_queue: heapless::Vec::new(),
            integrity_trackers: heapless::Vec::new(),
            action_request_timing: heapless::Vec::new(),
            crv_copy: heapless::Vec::new(),
            crv_readback: heapless::Vec::new(),
            event_queue: heapless::Vec::new(),
        }
    }

    /// Current point-in-time snapshot, for attaching to a newly
    /// enqueued event.
    pub fn snapshot(&self) -> SystemSnapshot {
        SystemSnapshot {
            vehicle_speed: self.vehicle_status.speed,
            gear: self.vehicle_status.park_status,
            asi_state: self.asi_state,
            timestamp_ms: wall_clock_ms(),
        }
    }

    /// Enqueue an event with the overflow discipline from spec §4.5:
    /// valid range always holds for a live `EventId`; if the queue is
    /// full, replace the least-severe existing entry iff the new one
    /// is strictly more severe, otherwise discard.
    pub fn raise_event(&mut self, id: EventId) {
        if id.severity() == Severity::Critical {
            self.critical_fault_flag = true;
        }

        let snapshot = self.snapshot();
        let record = EventRecord { id, snapshot };

        if self.event_queue.push(record).is_ok() {
            return;
        }

        let least_severe_idx = self
            .event_queue
            .iter()
            .enumerate()
            .min_by_key(|(_, r)| r.id.severity())
            .map(|(i, _)| i);

        match least_severe_idx {
            Some(idx) if self.event_queue[idx].id.severity() < id.severity() => {
                self.event_queue[idx] = record;
            }
            _ => {
                warn!(event = ?id, "event queue full, discarding (EventDiscarded)");
            }
        }
    }
}

fn wall_clock_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// ICM-RX's private region: per-role CRC error streak
/// and whether that role's session has been declared fatal.
pub struct IcmRxPrivate {
    pub crc_error_count: [u8; MESSAGE_DICTIONARY_COUNT],
    pub role_fatal: [bool; MESSAGE_DICTIONARY_COUNT],
}

impl IcmRxPrivate {
    fn new() -> Self {
        Self {
            crc_error_count: [0; MESSAGE_DICTIONARY_COUNT],
            role_fatal: [false; MESSAGE_DICTIONARY_COUNT],
        }
    }
}

/// ICM-TX's private region: one token bucket per role.
pub struct IcmTxPrivate {
    pub rate_limiters: Vec<(MessageRole, TokenBucket)>,
}

impl IcmTxPrivate {
    fn new(allowed_messages: u32, time_window_ms: u64) -> Self {
        let rate_limiters = MESSAGE_DICTIONARY
            .iter()
            .map(|e| (e.role, TokenBucket::new(allowed_messages, time_window_ms)))
            .collect();
        Self { rate_limiters }
    }

    pub fn bucket_for(&mut self, role: MessageRole) -> Option<&mut TokenBucket> {
        self.rate_limiters
            .iter_mut()
            .find(|(r, _)| *r == role)
            .map(|(_, b)| b)
    }
}

/// SD's private region: shadow state for the state-monitor
/// cross-check, plus TCP health-check bookkeeping.
pub struct SdPrivate {
    pub shadow_state: AsiState,
    pub health_check_cycle: u64,
}

impl SdPrivate {
    fn new() -> Self {
        Self {
            shadow_state: AsiState::default(),
            health_check_cycle: 0,
        }
    }
}

/// The full shared region owned by the worker process.
pub struct Shared {
    pub config: AsiConfig,
    pub common: Mutex<CommonState>,
    pub icm_rx_private: Mutex<IcmRxPrivate>,
    pub icm_tx_private: Mutex<IcmTxPrivate>,
    pub sd_private: Mutex<SdPrivate>,
    pub shutdown: AtomicBool,
    pub max_restarts: u32,
    pub park_speed_freshness_window_cycles: u64,
    pub cal_readback_response_limit_cycles: u64,
}

impl Shared {
    pub fn new(config: AsiConfig) -> Self {
        let max_restarts = config.supervisor.max_restarts;
        let allowed = config.rate_limit.allowed_messages;
        let window_ms = config.rate_limit.time_window_ms;
        Self {
            config,
            common: Mutex::new(CommonState::new()),
            icm_rx_private: Mutex::new(IcmRxPrivate::new()),
            icm_tx_private: Mutex::new(IcmTxPrivate::new(allowed, window_ms)),
            sd_private: Mutex::new(SdPrivate::new()),
            shutdown: AtomicBool::new(false),
            max_restarts,
            park_speed_freshness_window_cycles: 10,
            cal_readback_response_limit_cycles: asi_common::consts::CAL_READBACK_RESPONSE_TIME_LIMIT as u64,
        }
    }

    /// Convenience wrapper: lock `common`, raise an event, release.
    /// Used by call sites (e.g. the scheduler's overrun detection)
    /// that don't otherwise need the lock.
    pub fn raise(&self, id: EventId) {
        let mut common = self.common.lock().unwrap();
        common.raise_event(id);
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Enter Safe-State: clear integrity + approved queues,
    /// enqueue exactly one Safe-State status notification.
    pub fn enter_safe_state(common: &mut CommonState) {
        if common.asi_state == AsiState::SafeState {
            return;
        }
        common.asi_state = AsiState::SafeState;
        common.integrity_queue.clear();
        common.approved_queue.clear();
        common.ss_queue.clear();
        let _ = common.ss_queue.push(Notification::AsiStatus {
            state_value: AsiState::SafeState.wire_value(),
        });
        info!("entered SafeState");
    }

    pub fn freshness_cutoff_cycles(&self) -> u64 {
        self.park_speed_freshness_window_cycles
    }
}
