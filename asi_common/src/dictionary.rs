//! Static compile-time dictionaries.
//!
//! `ACTIONS`, `MESSAGE_DICTIONARY` and `MESSAGE_KINDS` are the three
//! `const` tables the whole pipeline is built around. None of them are
//! mutable at runtime: there is no dynamic action registration.
//!
//! The action table is looked up by a direct linear scan keyed on
//! `msg_id` (see [`lookup_action`]), never by enum arithmetic on a role
//! index — see DESIGN.md for the bug this avoids.

use crate::consts::{ACTION_COUNT, MESSAGE_DICTIONARY_COUNT, MESSAGE_KIND_COUNT, UNASSIGNED_MESSAGE_ID};

/// Safety precondition attached to an [`ActionEntry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precondition {
    /// No precondition; always eligible once range-checked.
    None,
    /// Vehicle must be in `Park` and within [`crate::consts::VEHICLE_SPEED_ERROR_MARGIN`].
    Park,
}

/// One row of the 12-entry static action list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionEntry {
    /// Unique action identifier, also used as the wire `msg_id`.
    pub action_id: u16,
    /// Human name, for logging only.
    pub name: &'static str,
    /// Safety precondition.
    pub precond: Precondition,
    /// Inclusive lower bound of the payload value.
    pub range_lo: u32,
    /// Inclusive upper bound of the payload value.
    pub range_hi: u32,
}

/// Authoritative action table.
///
/// `range_lo <= range_hi` for every row; `action_id` is unique. Both are
/// checked by the `const_table_invariants` test below and must hold for
/// [`lookup_action`]'s linear scan to be meaningful.
pub const ACTIONS: [ActionEntry; ACTION_COUNT] = [
    ActionEntry { action_id: 0x0000, name: "hvac_fan", precond: Precondition::None, range_lo: 0, range_hi: 4 },
    ActionEntry { action_id: 0x0001, name: "hvac_cabin_temp", precond: Precondition::None, range_lo: 0x32, range_hi: 0x64 },
    ActionEntry { action_id: 0x0002, name: "wiper_speed", precond: Precondition::None, range_lo: 0, range_hi: 4 },
    ActionEntry { action_id: 0x0003, name: "seat_pos_driver", precond: Precondition::Park, range_lo: 0, range_hi: 0x64 },
    ActionEntry { action_id: 0x0004, name: "seat_pos_passenger", precond: Precondition::None, range_lo: 0, range_hi: 0x64 },
    ActionEntry { action_id: 0x0005, name: "seat_heat_driver", precond: Precondition::None, range_lo: 0, range_hi: 4 },
    ActionEntry { action_id: 0x0006, name: "seat_heat_passenger", precond: Precondition::None, range_lo: 0, range_hi: 4 },
    ActionEntry { action_id: 0x0007, name: "door_lock", precond: Precondition::Park, range_lo: 0, range_hi: 1 },
    ActionEntry { action_id: 0x0008, name: "turn_signal", precond: Precondition::None, range_lo: 0, range_hi: 3 },
    ActionEntry { action_id: 0x0009, name: "ambient_light", precond: Precondition::None, range_lo: 0, range_hi: 0xFFFFF },
    ActionEntry { action_id: 0x000A, name: "torque_vec_motor_calib", precond: Precondition::Park, range_lo: 0, range_hi: 0xFF },
    ActionEntry { action_id: 0x07D0, name: "rain_sensor", precond: Precondition::None, range_lo: 0, range_hi: 4 },
];

/// Look up an [`ActionEntry`] by `msg_id`, direct by value — never by
/// subtracting a role enum index.
#[inline]
pub fn lookup_action(msg_id: u16) -> Option<&'static ActionEntry> {
    ACTIONS.iter().find(|a| a.action_id == msg_id)
}

/// Wire message kind: one of the five TLV `Type` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Action,
    Status,
    Ack,
    Notification,
    CalibrationReadback,
}

impl MessageKind {
    /// The wire `Type` field value for this kind.
    pub const fn type_id(self) -> u16 {
        match self {
            MessageKind::Action => 0xFF11,
            MessageKind::Status => 0xFF22,
            MessageKind::Ack => 0xFF33,
            MessageKind::Notification => 0xFF44,
            MessageKind::CalibrationReadback => 0xFF55,
        }
    }
}

/// One row of the 5-entry message-kind table.
#[derive(Debug, Clone, Copy)]
pub struct MessageKindEntry {
    pub type_id: u16,
    pub kind: MessageKind,
    /// Up to three admissible `Length` values for this type.
    pub allowed_lengths: [Option<u8>; 3],
}

impl MessageKindEntry {
    /// True if `length` is one of `allowed_lengths`.
    pub fn accepts_length(&self, length: u8) -> bool {
        self.allowed_lengths.iter().any(|l| *l == Some(length))
    }
}

/// Authoritative message-kind table.
pub const MESSAGE_KINDS: [MessageKindEntry; MESSAGE_KIND_COUNT] = [
    MessageKindEntry { type_id: 0xFF11, kind: MessageKind::Action, allowed_lengths: [Some(1), Some(4), Some(8)] },
    MessageKindEntry { type_id: 0xFF22, kind: MessageKind::Status, allowed_lengths: [Some(5), None, None] },
    MessageKindEntry { type_id: 0xFF33, kind: MessageKind::Ack, allowed_lengths: [Some(1), None, None] },
    MessageKindEntry { type_id: 0xFF44, kind: MessageKind::Notification, allowed_lengths: [Some(1), None, None] },
    MessageKindEntry { type_id: 0xFF55, kind: MessageKind::CalibrationReadback, allowed_lengths: [Some(1), Some(4), Some(8)] },
];

/// Look up a [`MessageKindEntry`] by wire `type_id`.
pub fn lookup_kind(type_id: u16) -> Option<&'static MessageKindEntry> {
    MESSAGE_KINDS.iter().find(|k| k.type_id == type_id)
}

/// Logical identity of a message, distinct from its wire [`MessageKind`].
/// One role per rolling-counter / sequence-number register.
///
/// The 12 `Action*` roles mirror [`ACTIONS`] one-for-one; the remaining
/// 10 roles cover CM status, both ack directions, calibration readback,
/// the two ECU fail channels, the three outbound notification channels,
/// and one reserved slot — 22 in total. See DESIGN.md for why this
/// enumeration was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageRole {
    Action(u16),
    CmStatus,
    AckFromVam,
    AckFromCm,
    CalibrationReadback,
    EcuCriticalFail,
    EcuNonCriticalFail,
    OutboundActionNotification,
    OutboundAsiStatus,
    OutboundStartupTest,
    Reserved,
}

/// One row of the 22-entry static message dictionary.
#[derive(Debug, Clone, Copy)]
pub struct MessageDictionaryEntry {
    pub message_id: u16,
    pub kind: MessageKind,
    pub role: MessageRole,
}

/// Authoritative message dictionary, indexed by role.
pub const MESSAGE_DICTIONARY: [MessageDictionaryEntry; MESSAGE_DICTIONARY_COUNT] = [
    MessageDictionaryEntry { message_id: 0x0000, kind: MessageKind::Action, role: MessageRole::Action(0x0000) },
    MessageDictionaryEntry { message_id: 0x0001, kind: MessageKind::Action, role: MessageRole::Action(0x0001) },
    MessageDictionaryEntry { message_id: 0x0002, kind: MessageKind::Action, role: MessageRole::Action(0x0002) },
    MessageDictionaryEntry { message_id: 0x0003, kind: MessageKind::Action, role: MessageRole::Action(0x0003) },
    MessageDictionaryEntry { message_id: 0x0004, kind: MessageKind::Action, role: MessageRole::Action(0x0004) },
    MessageDictionaryEntry { message_id: 0x0005, kind: MessageKind::Action, role: MessageRole::Action(0x0005) },
    MessageDictionaryEntry { message_id: 0x0006, kind: MessageKind::Action, role: MessageRole::Action(0x0006) },
    MessageDictionaryEntry { message_id: 0x0007, kind: MessageKind::Action, role: MessageRole::Action(0x0007) },
    MessageDictionaryEntry { message_id: 0x0008, kind: MessageKind::Action, role: MessageRole::Action(0x0008) },
    MessageDictionaryEntry { message_id: 0x0009, kind: MessageKind::Action, role: MessageRole::Action(0x0009) },
    MessageDictionaryEntry { message_id: 0x000A, kind: MessageKind::Action, role: MessageRole::Action(0x000A) },
    MessageDictionaryEntry { message_id: 0x07D0, kind: MessageKind::Action, role: MessageRole::Action(0x07D0) },
    MessageDictionaryEntry { message_id: 0x0100, kind: MessageKind::Status, role: MessageRole::CmStatus },
    MessageDictionaryEntry { message_id: 0x0200, kind: MessageKind::Ack, role: MessageRole::AckFromVam },
    MessageDictionaryEntry { message_id: 0x0201, kind: MessageKind::Ack, role: MessageRole::AckFromCm },
    MessageDictionaryEntry { message_id: 0x0300, kind: MessageKind::CalibrationReadback, role: MessageRole::CalibrationReadback },
    MessageDictionaryEntry { message_id: 0x0400, kind: MessageKind::Notification, role: MessageRole::EcuCriticalFail },
    MessageDictionaryEntry { message_id: 0x0401, kind: MessageKind::Notification, role: MessageRole::EcuNonCriticalFail },
    MessageDictionaryEntry { message_id: 0x0500, kind: MessageKind::Notification, role: MessageRole::OutboundActionNotification },
    MessageDictionaryEntry { message_id: 0x0501, kind: MessageKind::Notification, role: MessageRole::OutboundAsiStatus },
    MessageDictionaryEntry { message_id: 0x0502, kind: MessageKind::Notification, role: MessageRole::OutboundStartupTest },
    MessageDictionaryEntry { message_id: UNASSIGNED_MESSAGE_ID, kind: MessageKind::Notification, role: MessageRole::Reserved },
];

/// Look up a dictionary entry by role.
pub fn lookup_role(role: MessageRole) -> Option<&'static MessageDictionaryEntry> {
    MESSAGE_DICTIONARY.iter().find(|e| e.role == role)
}

/// Look up a dictionary entry by wire `message_id`, for inbound role
/// routing. Unassigned entries never match a real wire value so this
/// never collides with [`UNASSIGNED_MESSAGE_ID`].
pub fn lookup_by_message_id(message_id: u16) -> Option<&'static MessageDictionaryEntry> {
    if message_id == UNASSIGNED_MESSAGE_ID {
        return None;
    }
    MESSAGE_DICTIONARY.iter().find(|e| e.message_id == message_id)
}
