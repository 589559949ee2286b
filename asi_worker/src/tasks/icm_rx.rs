//! Inbound Communication Manager: parses and integrity-checks
//! every frame from both endpoints, then routes it by dictionary role.

use crate::shared::{dictionary_index, ActionRequestTiming, ClearCondition, IntegrityRecord, ProcessMsg, Shared};
use asi_common::consts::{CRC_ERROR_FATAL_LIMIT, MAX_PENDING_ACTION_REQUESTS, QUEUE_CAPACITY, ROLLING_COUNTER_VIOLATION_LIMIT, TLV_FRAME_LEN};
use asi_common::dictionary::{lookup_by_message_id, lookup_kind, MessageRole};
use asi_common::events::{ActionOutcome, EventId, Notification};
use asi_common::state::{Freshness, Prndl};
use asi_common::wire::{FrameError, FrameSource, TlvFrame};
use std::sync::Mutex;
use std::time::Instant;
use tracing::warn;

pub fn tick<S: FrameSource>(shared: &Shared, vam: &Mutex<S>, cm: &Mutex<S>) {
    drain(shared, vam);
    drain(shared, cm);
}

fn drain<S: FrameSource>(shared: &Shared, endpoint: &Mutex<S>) {
    let mut endpoint = endpoint.lock().unwrap();
    loop {
        match endpoint.try_recv() {
            Ok(Some(buf)) => process_frame(shared, &buf),
            Ok(None) => return,
            Err(e) => {
                warn!(error = %e, "endpoint read error");
                return;
            }
        }
    }
}

fn process_frame(shared: &Shared, buf: &[u8; TLV_FRAME_LEN]) {
    let raw_msg_id = u16::from_le_bytes([buf[14], buf[15]]);
    let role = lookup_by_message_id(raw_msg_id).map(|e| e.role);

    // Private lock first, common second.
    let mut rx_private = shared.icm_rx_private.lock().unwrap();
    let mut common = shared.common.lock().unwrap();

    let idx = role.and_then(dictionary_index);

    if let Some(idx) = idx {
        if rx_private.role_fatal[idx] {
            // Session fatal per spec §4.2 step 1: three consecutive CRC
            // errors already tore this role's session down. Every further
            // frame on it is dropped without re-entering the pipeline
            // until the worker restarts and the flag is reinitialized.
            return;
        }
    }

    let frame = match TlvFrame::parse(buf) {
        Ok(frame) => {
            if let Some(idx) = idx {
                rx_private.crc_error_count[idx] = 0;
            }
            frame
        }
        Err(FrameError::CrcMismatch { .. }) => {
            common.raise_event(EventId::MsgCrcCheck);
            if let Some(idx) = idx {
                rx_private.crc_error_count[idx] = rx_private.crc_error_count[idx].saturating_add(1);
                if rx_private.crc_error_count[idx] >= CRC_ERROR_FATAL_LIMIT {
                    rx_private.role_fatal[idx] = true;
                    common.raise_event(EventId::CommLoss);
                }
            }
            return;
        }
        Err(FrameError::WrongLength(_)) => return,
    };

    let Some(role) = role else {
        warn!(msg_id = raw_msg_id, "frame with unrecognized message id dropped");
        return;
    };
    let Some(idx) = idx else { return };

    let Some(kind_entry) = lookup_kind(frame.r#type) else {
        common.raise_event(EventId::MsgTypeLength);
        return;
    };
    if !kind_entry.accepts_length(frame.length as u8) {
        common.raise_event(EventId::MsgTypeLength);
        return;
    }

    check_rolling_counter(&mut common, idx, frame.rolling_counter);
    check_sequence(&mut common, idx, frame.sequence);

    route(&mut common, role, &frame);
}

fn check_rolling_counter(common: &mut crate::shared::CommonState, idx: usize, wire_value: u16) {
    let state = &mut common.rolling_counters[idx];
    let first_observation = state.rx == 0 && state.consecutive_violations == 0;
    let expected = state.rx.wrapping_add(1);
    if !first_observation && wire_value != expected {
        state.consecutive_violations = state.consecutive_violations.saturating_add(1);
        if state.consecutive_violations >= ROLLING_COUNTER_VIOLATION_LIMIT {
            state.consecutive_violations = 0;
            common.raise_event(EventId::RollCount);
        }
    } else {
        state.consecutive_violations = 0;
    }
    common.rolling_counters[idx].rx = wire_value;
}

fn check_sequence(common: &mut crate::shared::CommonState, idx: usize, wire_value: u16) {
    let state = &mut common.sequence_numbers[idx];
    let first_observation = state.last_seen == 0;
    if !first_observation && wire_value < state.last_seen {
        common.raise_event(EventId::MsgLoss);
    }
    common.sequence_numbers[idx].last_seen = wire_value;
}

fn route(common: &mut crate::shared::CommonState, role: MessageRole, frame: &TlvFrame) {
    match role {
        MessageRole::Action(_) => {
            if common.startup_test_passed != Some(true) {
                // Spec §4.4: action requests can't be trusted until the
                // startup self-test has actually passed. Report the
                // distinct outcome rather than silently queuing.
                let _ = common.notification_queue.push(Notification::Action {
                    msg_id: frame.msg_id,
                    seq: frame.sequence,
                    outcome: ActionOutcome::SutNotPerformed,
                });
                return;
            }
            let msg = ProcessMsg { r#type: frame.r#type, length: frame.length, msg_id: frame.msg_id, seq: frame.sequence, payload: frame.value };
            push_bounded(&mut common.integrity_queue, msg);
            push_bounded(
                &mut common.integrity_trackers,
                IntegrityRecord {
                    msg_id: frame.msg_id,
                    seq: frame.sequence,
                    response_cycle_count: 0,
                    role,
                    clear_condition: ClearCondition::PendingDispatch,
                    r#type: frame.r#type,
                    created_at_cycle: common.cycle_count,
                },
            );
            push_bounded_evict_oldest(
                &mut common.action_request_timing,
                ActionRequestTiming { msg_id: frame.msg_id, seq: frame.sequence, started_at: Instant::now() },
            );
        }
        MessageRole::CmStatus => {
            if frame.value.len() >= 5 {
                let cycle = common.cycle_count;
                if let Some(park) = Prndl::from_wire(frame.value[0]) {
                    common.vehicle_status.park_status = park;
                    common.vehicle_status.park_freshness = Freshness::Fresh;
                    common.vehicle_status.park_updated_at_cycle = cycle;
                } else {
                    common.raise_event(EventId::InvalidVehicleData);
                }
                let mut speed_bytes = [0u8; 4];
                speed_bytes.copy_from_slice(&frame.value[1..5]);
                common.vehicle_status.speed = f32::from_le_bytes(speed_bytes);
                common.vehicle_status.speed_freshness = Freshness::Fresh;
                common.vehicle_status.speed_updated_at_cycle = cycle;
            }
        }
        MessageRole::AckFromVam | MessageRole::AckFromCm => {
            if let Some(pos) = common
                .integrity_trackers
                .iter()
                .position(|r| r.msg_id == frame.msg_id && r.seq == frame.sequence && r.clear_condition == ClearCondition::Ack)
            {
                common.integrity_trackers.remove(pos);
            }
            if frame.value[0] != 0 {
                common.raise_event(EventId::AckUnsuccess);
            }
        }
        MessageRole::CalibrationReadback => {
            push_bounded(
                &mut common.crv_readback,
                crate::shared::CrvEntry { msg_id: frame.msg_id, seq: frame.sequence, payload: frame.value, created_at_cycle: common.cycle_count },
            );
        }
        MessageRole::EcuCriticalFail => common.raise_event(EventId::EcuCriticalFail),
        MessageRole::EcuNonCriticalFail => common.raise_event(EventId::EcuNonCriticalFail),
        MessageRole::OutboundActionNotification
        | MessageRole::OutboundAsiStatus
        | MessageRole::OutboundStartupTest
        | MessageRole::Reserved => {
            warn!(role = ?role, "outbound-only or reserved role received inbound, dropping");
        }
    }
}

fn push_bounded<T>(queue: &mut heapless::Vec<T, QUEUE_CAPACITY>, item: T) {
    if queue.push(item).is_err() {
        queue.remove(0);
        let _ = queue.push(item);
    }
}

fn push_bounded_evict_oldest(queue: &mut heapless::Vec<ActionRequestTiming, MAX_PENDING_ACTION_REQUESTS>, item: ActionRequestTiming) {
    if queue.push(item).is_err() {
        queue.remove(0);
        let _ = queue.push(item);
    }
}
