//! Action Request Approver: range-checks and
//! precondition-checks one queued action request per tick, then
//! enforces the wall-clock processing deadline before approving it.

use crate::shared::{CommonState, ProcessMsg, Shared};
use asi_common::consts::ACTION_REQUEST_DEADLINE_MS;
use asi_common::dictionary::{lookup_action, Precondition};
use asi_common::events::{ActionOutcome, EventId, Notification};
use asi_common::state::{AsiState, Freshness, Prndl};
use std::time::{Duration, Instant};

pub fn tick(shared: &Shared) {
    let mut common = shared.common.lock().unwrap();
    if common.asi_state != AsiState::NormalOp {
        return;
    }
    if common.integrity_queue.is_empty() {
        return;
    }
    let msg = common.integrity_queue.remove(0);
    process(&mut common, msg);
}

fn process(common: &mut CommonState, msg: ProcessMsg) {
    let sample = sample_vehicle_status(common);

    let outcome = match evaluate(common, &msg, sample) {
        Ok(()) => {
            if let Some(started_at) = take_timing(common, msg.msg_id, msg.seq) {
                if started_at.elapsed() > Duration::from_millis(ACTION_REQUEST_DEADLINE_MS) {
                    common.raise_event(EventId::ActionRequestProcessTimeout);
                    Some(ActionOutcome::TimeoutLimit)
                } else {
                    let _ = common.approved_queue.push(msg);
                    Some(ActionOutcome::Approved)
                }
            } else {
                let _ = common.approved_queue.push(msg);
                Some(ActionOutcome::Approved)
            }
        }
        Err(outcome) => {
            let _ = take_timing(common, msg.msg_id, msg.seq);
            Some(outcome)
        }
    };

    if let Some(outcome) = outcome {
        let _ = common.notification_queue.push(Notification::Action { msg_id: msg.msg_id, seq: msg.seq, outcome });
    }
}

/// Returns `Ok(())` if the action clears range and precondition checks.
fn evaluate(common: &mut CommonState, msg: &ProcessMsg, sample: VehicleStatusSample) -> Result<(), ActionOutcome> {
    let Some(action) = lookup_action(msg.msg_id) else {
        common.raise_event(EventId::ActionListError);
        return Err(ActionOutcome::InvalidActionReq);
    };

    if !value_in_range(msg.length, &msg.payload, action.range_lo, action.range_hi) {
        common.raise_event(EventId::ActionReqRangeCheckError);
        return Err(ActionOutcome::InvalidActionReq);
    }

    if action.precond == Precondition::Park {
        match sample {
            VehicleStatusSample::Parked => {}
            VehicleStatusSample::NotParked => {
                common.raise_event(EventId::ActionReqPrecondListError);
                return Err(ActionOutcome::PreconditionFail);
            }
            VehicleStatusSample::Invalid => {
                // sample_vehicle_status already raised VehicleStatusError or
                // VehicleStatusMismatch; report the distinct outcome rather
                // than folding it into a generic precondition failure.
                return Err(ActionOutcome::VehicleStatusFail);
            }
        }
    }

    Ok(())
}

/// Decode `payload` per its declared `length` and check it against
/// `[lo, hi]`. For the 8-byte form every byte is checked independently
/// against the same bounds, not the value as a 64-bit integer — this is
/// the "every byte in range" fix noted in spec §9.
fn value_in_range(length: u16, payload: &[u8; 8], lo: u32, hi: u32) -> bool {
    match length {
        1 => (payload[0] as u32) >= lo && (payload[0] as u32) <= hi,
        2 => {
            let v = u16::from_le_bytes([payload[0], payload[1]]) as u32;
            v >= lo && v <= hi
        }
        4 => {
            let v = u32::from_le_bytes([payload[0], payload[1], payload[2], payload[3]]);
            v >= lo && v <= hi
        }
        8 => payload.iter().all(|b| (*b as u32) >= lo && (*b as u32) <= hi),
        _ => false,
    }
}

/// Outcome of sampling `VehicleStatus` for this tick's precondition check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VehicleStatusSample {
    Parked,
    NotParked,
    /// Stale freshness or an out-of-margin speed-vs-park mismatch: the
    /// sample can't be trusted either way, distinct from a genuine
    /// not-parked reading.
    Invalid,
}

/// Sample `VehicleStatus` once per tick: stale freshness or
/// an out-of-margin speed-vs-park mismatch both make the sample
/// untrustworthy for the purposes of this tick's precondition check.
fn sample_vehicle_status(common: &mut CommonState) -> VehicleStatusSample {
    let status = common.vehicle_status;
    if status.park_freshness == Freshness::Outdated || status.speed_freshness == Freshness::Outdated {
        common.raise_event(EventId::VehicleStatusError);
        return VehicleStatusSample::Invalid;
    }
    if status.park_status == Prndl::Park && status.speed.abs() > asi_common::consts::VEHICLE_SPEED_ERROR_MARGIN {
        common.raise_event(EventId::VehicleStatusMismatch);
        return VehicleStatusSample::Invalid;
    }
    if status.park_status == Prndl::Park {
        VehicleStatusSample::Parked
    } else {
        VehicleStatusSample::NotParked
    }
}

fn take_timing(common: &mut CommonState, msg_id: u16, seq: u16) -> Option<Instant> {
    let pos = common.action_request_timing.iter().position(|t| t.msg_id == msg_id && t.seq == seq)?;
    Some(common.action_request_timing.remove(pos).started_at)
}
