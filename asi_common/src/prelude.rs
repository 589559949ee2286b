//! Prelude module for common re-exports.
//!
//! Lets consumers do `use asi_common::prelude::*;` and get the most
//! commonly used types without listing individual paths.
//!
//! # Usage
//!
//! ```rust
//! use asi_common::prelude::*;
//! ```

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{
    AsiConfig, ConfigError, ConfigLoader, LogLevel, NetworkConfig, RateLimitConfig,
    ScheduleConfig, SharedConfig, SupervisorConfig, TaskScheduleConfig,
};

// ─── System Constants ───────────────────────────────────────────────
pub use crate::consts::*;

// ─── Wire Format ────────────────────────────────────────────────────
pub use crate::wire::{crc16_ccitt, FrameError, FrameSink, FrameSource, TlvFrame};

// ─── Static Dictionaries ────────────────────────────────────────────
pub use crate::dictionary::{
    lookup_action, lookup_kind, lookup_role, ActionEntry, MessageDictionaryEntry, MessageKind,
    MessageKindEntry, MessageRole, Precondition, ACTIONS, MESSAGE_DICTIONARY, MESSAGE_KINDS,
};

// ─── Fault Taxonomy ─────────────────────────────────────────────────
pub use crate::events::{
    ActionOutcome, EventId, Notification, Severity, SystemSnapshot, EVENT_ID_COUNT,
};

// ─── Shared State ───────────────────────────────────────────────────
pub use crate::state::{AsiState, Freshness, Prndl, VehicleStatus};

// ─── Persistence ────────────────────────────────────────────────────
pub use crate::persistence::{
    read_snapshot, restore_preferred, write_snapshot, PersistenceError, SnapshotHeader,
    SNAPSHOT_FORMAT_VERSION, SNAPSHOT_HEADER_LEN, SNAPSHOT_MAGIC,
};

// ─── Rate Limiting ──────────────────────────────────────────────────
pub use crate::ratelimit::TokenBucket;

// ─── Supervisor Contract ────────────────────────────────────────────
pub use crate::watchdog::{HealthStatus, Watchdog, WatchdogError};
