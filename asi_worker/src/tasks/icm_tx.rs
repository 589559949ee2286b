//! Outbound Communication Manager: frames and rate-limits
//! everything ARA, CRV, STM and ICM-RX have queued for transmission.
//!
//! Calibration-write actions (`torque_vec_motor_calib`, msg_id
//! `0x000A`) also get a CRV copy recorded here, at the point they
//! actually go out on the wire.

use crate::shared::{CommonState, CrvEntry, IcmTxPrivate, ProcessMsg, Shared};
use asi_common::dictionary::{MessageKind, MessageRole};
use asi_common::events::{ActionOutcome, EventId, Notification};
use asi_common::wire::{FrameSink, TlvFrame};
use std::sync::Mutex;

const CALIBRATION_WRITE_MSG_ID: u16 = 0x000A;

pub fn tick<S: FrameSink>(shared: &Shared, vam: &Mutex<S>, cm: &Mutex<S>) {
    // Private lock first, common second.
    let mut tx_private = shared.icm_tx_private.lock().unwrap();
    let mut common = shared.common.lock().unwrap();

    while let Some(msg) = pop_front(&mut common.approved_queue) {
        send_action(&mut common, &mut tx_private, vam, cm, msg);
    }
    while let Some(note) = pop_front(&mut common.ss_queue) {
        send_notification(&mut common, &mut tx_private, vam, cm, note);
    }
    while let Some(note) = pop_front(&mut common.notification_queue) {
        send_notification(&mut common, &mut tx_private, vam, cm, note);
    }
}

fn pop_front<T>(queue: &mut heapless::Vec<T, { asi_common::consts::QUEUE_CAPACITY }>) -> Option<T> {
    if queue.is_empty() {
        None
    } else {
        Some(queue.remove(0))
    }
}

fn send_action<S: FrameSink>(
    common: &mut CommonState,
    tx_private: &mut IcmTxPrivate,
    vam: &Mutex<S>,
    cm: &Mutex<S>,
    msg: ProcessMsg,
) {
    let role = MessageRole::Action(msg.msg_id);
    if !consume_token(common, tx_private, msg.msg_id, msg.seq, role) {
        return;
    }

    let frame = next_frame(common, role, msg.r#type, msg.length, msg.msg_id, msg.payload);
    // Action relay is addressed to the VAM side (the requester also
    // receives the forwarded, approved command back on its own link).
    if send_frame(vam, &frame).is_err() {
        common.raise_event(EventId::CommLoss);
        let _ = common.notification_queue.push(Notification::Action { msg_id: msg.msg_id, seq: msg.seq, outcome: ActionOutcome::TransmissionFailed });
        return;
    }

    if msg.msg_id == CALIBRATION_WRITE_MSG_ID {
        let _ = cm; // calibration echo arrives back via CM's readback channel
        let copy = CrvEntry { msg_id: msg.msg_id, seq: msg.seq, payload: msg.payload, created_at_cycle: common.cycle_count };
        if common.crv_copy.push(copy).is_err() {
            common.crv_copy.remove(0);
            let _ = common.crv_copy.push(copy);
        }
    }
}

fn send_notification<S: FrameSink>(
    common: &mut CommonState,
    tx_private: &mut IcmTxPrivate,
    vam: &Mutex<S>,
    cm: &Mutex<S>,
    note: Notification,
) {
    let (role, wire_msg_id, seq, payload) = match note {
        Notification::Action { msg_id, seq, outcome } => {
            (MessageRole::OutboundActionNotification, msg_id, seq, [outcome.payload_byte(), 0, 0, 0, 0, 0, 0, 0])
        }
        Notification::StartupTest { passed } => (MessageRole::OutboundStartupTest, 0, 0, [passed as u8, 0, 0, 0, 0, 0, 0, 0]),
        Notification::AsiStatus { state_value } => (MessageRole::OutboundAsiStatus, 0, 0, [state_value, 0, 0, 0, 0, 0, 0, 0]),
    };

    if !consume_token(common, tx_private, wire_msg_id, seq, role) {
        return;
    }

    let type_id = MessageKind::Notification.type_id();
    let frame = next_frame(common, role, type_id, 1, wire_msg_id, payload);

    // Status/outcome notifications go back to the VAM, which originated
    // the requests and state queries they answer.
    let _ = cm;
    if send_frame(vam, &frame).is_err() {
        common.raise_event(EventId::CommLoss);
    }
}

/// Token-bucket admission for one outbound role. Spec §4.7 names only a
/// `RateLimiterDrop` notification for overflow, no fault event — unlike
/// a socket write failure, a rate-limited drop isn't a comm fault.
fn consume_token(common: &mut CommonState, tx_private: &mut IcmTxPrivate, msg_id: u16, seq: u16, role: MessageRole) -> bool {
    let Some(bucket) = tx_private.bucket_for(role) else { return true };
    if bucket.try_consume() {
        true
    } else {
        let _ = common.notification_queue.push(Notification::Action { msg_id, seq, outcome: ActionOutcome::RateLimited });
        false
    }
}

fn next_frame(common: &mut CommonState, role: MessageRole, type_id: u16, length: u16, msg_id: u16, value: [u8; 8]) -> [u8; asi_common::consts::TLV_FRAME_LEN] {
    let idx = crate::shared::dictionary_index(role);
    let (rolling, sequence, timestamp_ms) = if let Some(idx) = idx {
        let state = &mut common.sequence_numbers[idx];
        state.last_emitted = state.last_emitted.wrapping_add(1);
        let seq = state.last_emitted;
        let rc = &mut common.rolling_counters[idx];
        rc.tx = rc.tx.wrapping_add(1);
        (rc.tx, seq, wall_clock_ms())
    } else {
        (1, 1, wall_clock_ms())
    };
    TlvFrame::new(type_id, length, rolling, timestamp_ms, sequence, msg_id, value).serialize()
}

fn send_frame<S: FrameSink>(sink: &Mutex<S>, frame: &[u8; asi_common::consts::TLV_FRAME_LEN]) -> std::io::Result<()> {
    sink.lock().unwrap().send(frame)
}

fn wall_clock_ms() -> u32 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u32)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::MemoryChannel;
    use asi_common::config::AsiConfig;

    #[test]
    fn approved_action_is_framed_and_sent_to_vam() {
        let shared = Shared::new(AsiConfig::default());
        {
            let mut common = shared.common.lock().unwrap();
            common.approved_queue.push(ProcessMsg { r#type: 0xFF11, length: 1, msg_id: 0x0000, seq: 1, payload: [2, 0, 0, 0, 0, 0, 0, 0] }).unwrap();
        }
        let vam: Mutex<MemoryChannel> = Mutex::new(MemoryChannel::default());
        let cm: Mutex<MemoryChannel> = Mutex::new(MemoryChannel::default());
        tick(&shared, &vam, &cm);
        assert!(shared.common.lock().unwrap().approved_queue.is_empty());
    }

    #[test]
    fn rate_limited_action_is_dropped_with_notification() {
        let shared = Shared::new(AsiConfig::default());
        let allowed = shared.config.rate_limit.allowed_messages;
        {
            let mut common = shared.common.lock().unwrap();
            for i in 0..=allowed {
                common.approved_queue.push(ProcessMsg { r#type: 0xFF11, length: 1, msg_id: 0x0000, seq: i as u16, payload: [1, 0, 0, 0, 0, 0, 0, 0] }).unwrap();
            }
        }
        let vam: Mutex<MemoryChannel> = Mutex::new(MemoryChannel::default());
        let cm: Mutex<MemoryChannel> = Mutex::new(MemoryChannel::default());
        tick(&shared, &vam, &cm);
        let common = shared.common.lock().unwrap();
        assert!(common.notification_queue.iter().any(|n| matches!(n, Notification::Action { outcome: ActionOutcome::RateLimited, .. })));
    }
}
