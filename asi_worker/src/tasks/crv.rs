//! Calibration Readback Verifier: matches outstanding
//! calibration copies against readback echoes and reports the result.

use crate::shared::{CrvEntry, Shared};
use asi_common::consts::CAL_READBACK_RESPONSE_TIME_LIMIT;
use asi_common::events::{ActionOutcome, EventId, Notification};

pub fn tick(shared: &Shared) {
    let mut common = shared.common.lock().unwrap();
    let now = common.cycle_count;

    // Walk from most-recently-queued to oldest so a late readback always
    // matches the copy it actually answers, not a stale duplicate.
    let mut i = common.crv_copy.len();
    while i > 0 {
        i -= 1;
        let copy = common.crv_copy[i];

        if let Some(pos) = common.crv_readback.iter().position(|r| r.msg_id == copy.msg_id && r.seq == copy.seq) {
            let readback = common.crv_readback.remove(pos);
            common.crv_copy.remove(i);
            let outcome = if readback.payload == copy.payload { ActionOutcome::Approved } else { ActionOutcome::Mismatch };
            if outcome == ActionOutcome::Mismatch {
                common.raise_event(EventId::CalReadbackError);
            }
            let _ = common.notification_queue.push(Notification::Action { msg_id: copy.msg_id, seq: copy.seq, outcome });
            continue;
        }

        if now.saturating_sub(copy.created_at_cycle) > CAL_READBACK_RESPONSE_TIME_LIMIT as u64 {
            common.crv_copy.remove(i);
            common.raise_event(EventId::CalReadbackTimeout);
        }
    }
}

/// Called by ICM-TX when it transmits a calibration write, so CRV has
/// something to match the eventual readback against.
pub fn record_copy(shared: &Shared, entry: CrvEntry) {
    let mut common = shared.common.lock().unwrap();
    if common.crv_copy.push(entry).is_err() {
        common.crv_copy.remove(0);
        let _ = common.crv_copy.push(entry);
    }
}
