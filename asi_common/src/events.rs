//! Fault taxonomy: every reportable condition is exactly one
//! `EventId`, carrying its own compile-time [`Severity`] so the mapping
//! can never drift from the code that raises it. This replaces the
//! design notes' function-pointer notification hook (`void(*)(void)`)
//! with a tagged [`Notification`] variant the originating task
//! constructs directly at the point of approval/rejection; the fault
//! manager (`asi_worker::tasks::fm`) only drains and logs `EventId`s, it
//! never touches `Notification`.

/// Three-level severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Minor,
    Normal,
    Critical,
}

/// Every fault the system can raise.
///
/// Each event-id is unique, its severity is fixed at compile time, and
/// `Critical` events set [`crate::persistence`]'s `CriticalFaultFlag`
/// atomically the moment they are enqueued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventId {
    // ── Integrity faults (Critical) ──
    MsgCrcCheck,
    RollCount,
    MsgTypeLength,
    MsgTimeout,
    CalReadbackTimeout,
    CalReadbackError,
    StartupMemError,
    EcuCriticalFail,
    SmTransitionError,
    Overrun,

    // ── Info faults (Normal) ──
    AckLoss,
    AckUnsuccess,
    VehicleStatusMismatch,
    VehicleStatusError,
    InvalidVehicleData,
    MsgLoss,
    CommLoss,
    ActionListError,
    ActionReqRangeCheckError,
    ActionReqPrecondListError,
    ActionRequestProcessTimeout,
    EcuNonCriticalFail,

    // ── Lifecycle (Minor) ──
    InitComplete,
    StartupTestResult,
}

/// Total number of distinct event ids — the valid range FM's enqueue
/// rejects against.
pub const EVENT_ID_COUNT: usize = 24;

impl EventId {
    /// Compile-time severity mapping.
    pub const fn severity(self) -> Severity {
        use EventId::*;
        match self {
            MsgCrcCheck | RollCount | MsgTypeLength | MsgTimeout | CalReadbackTimeout
            | CalReadbackError | StartupMemError | EcuCriticalFail | SmTransitionError
            | Overrun => Severity::Critical,

            AckLoss | AckUnsuccess | VehicleStatusMismatch | VehicleStatusError
            | InvalidVehicleData | MsgLoss | CommLoss | ActionListError
            | ActionReqRangeCheckError | ActionReqPrecondListError
            | ActionRequestProcessTimeout | EcuNonCriticalFail => Severity::Normal,

            InitComplete | StartupTestResult => Severity::Minor,
        }
    }

    /// Stable numeric id, used for the FM's "valid event-id range check"
    /// and for log correlation. Kept separate from the Rust discriminant
    /// so reordering variants never changes wire/log meaning.
    pub const fn code(self) -> u16 {
        use EventId::*;
        match self {
            MsgCrcCheck => 1,
            RollCount => 2,
            MsgTypeLength => 3,
            MsgTimeout => 4,
            CalReadbackTimeout => 5,
            CalReadbackError => 6,
            StartupMemError => 7,
            EcuCriticalFail => 8,
            SmTransitionError => 9,
            Overrun => 10,
            AckLoss => 11,
            AckUnsuccess => 12,
            VehicleStatusMismatch => 13,
            VehicleStatusError => 14,
            InvalidVehicleData => 15,
            MsgLoss => 16,
            CommLoss => 17,
            ActionListError => 18,
            ActionReqRangeCheckError => 19,
            ActionReqPrecondListError => 20,
            ActionRequestProcessTimeout => 21,
            EcuNonCriticalFail => 22,
            InitComplete => 23,
            StartupTestResult => 24,
        }
    }

    /// All event-ids, for range and invariant checks.
    pub const ALL: [EventId; EVENT_ID_COUNT] = [
        EventId::MsgCrcCheck,
        EventId::RollCount,
        EventId::MsgTypeLength,
        EventId::MsgTimeout,
        EventId::CalReadbackTimeout,
        EventId::CalReadbackError,
        EventId::StartupMemError,
        EventId::EcuCriticalFail,
        EventId::SmTransitionError,
        EventId::Overrun,
        EventId::AckLoss,
        EventId::AckUnsuccess,
        EventId::VehicleStatusMismatch,
        EventId::VehicleStatusError,
        EventId::InvalidVehicleData,
        EventId::MsgLoss,
        EventId::CommLoss,
        EventId::ActionListError,
        EventId::ActionReqRangeCheckError,
        EventId::ActionReqPrecondListError,
        EventId::ActionRequestProcessTimeout,
        EventId::EcuNonCriticalFail,
        EventId::InitComplete,
        EventId::StartupTestResult,
    ];

    /// Look up an event by its stable numeric code (FM enqueue validation).
    pub fn from_code(code: u16) -> Option<EventId> {
        Self::ALL.iter().copied().find(|e| e.code() == code)
    }
}

/// Outcome carried by an outbound action notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOutcome {
    Approved,
    PreconditionFail,
    InvalidActionReq,
    TimeoutLimit,
    RateLimited,
    TransmissionFailed,
    SutNotPerformed,
    VehicleStatusFail,
    /// Calibration readback echoed a value different from what was sent.
    Mismatch,
}

impl ActionOutcome {
    /// Single payload byte carried on the wire.
    pub const fn payload_byte(self) -> u8 {
        match self {
            ActionOutcome::Approved => 0,
            ActionOutcome::PreconditionFail => 1,
            ActionOutcome::InvalidActionReq => 2,
            ActionOutcome::TimeoutLimit => 3,
            ActionOutcome::RateLimited => 4,
            ActionOutcome::TransmissionFailed => 5,
            ActionOutcome::SutNotPerformed => 6,
            ActionOutcome::VehicleStatusFail => 7,
            ActionOutcome::Mismatch => 8,
        }
    }
}

/// Point-in-time context captured when an event is enqueued.
/// Attached to the event for logging; never mutated afterward.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SystemSnapshot {
    pub vehicle_speed: f32,
    pub gear: crate::state::Prndl,
    pub asi_state: crate::state::AsiState,
    pub timestamp_ms: u64,
}

/// One of the three notifications that ever leave the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notification {
    /// Per `(msg_id, seq)` action outcome.
    Action { msg_id: u16, seq: u16, outcome: ActionOutcome },
    /// Startup self-test result.
    StartupTest { passed: bool },
    /// Current ASI state; payload is the state's
    /// wire value per [`crate::state::AsiState::wire_value`].
    AsiStatus { state_value: u8 },
}
