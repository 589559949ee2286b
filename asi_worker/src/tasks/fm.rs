//! Fault Manager: drains the event queue in FIFO order,
//! logging each fault with its captured snapshot.

use crate::shared::Shared;
use tracing::{error, info, warn};

pub fn tick(shared: &Shared) {
    let mut common = shared.common.lock().unwrap();
    if common.event_queue.is_empty() {
        return;
    }
    let record = common.event_queue.remove(0);
    drop(common);

    let snap = record.snapshot;
    match record.id.severity() {
        asi_common::events::Severity::Critical => error!(
            event = ?record.id, code = record.id.code(),
            vehicle_speed = snap.vehicle_speed, gear = ?snap.gear,
            asi_state = ?snap.asi_state, timestamp_ms = snap.timestamp_ms,
            "critical fault",
        ),
        asi_common::events::Severity::Normal => warn!(
            event = ?record.id, code = record.id.code(),
            vehicle_speed = snap.vehicle_speed, gear = ?snap.gear,
            asi_state = ?snap.asi_state, timestamp_ms = snap.timestamp_ms,
            "fault",
        ),
        asi_common::events::Severity::Minor => info!(
            event = ?record.id, code = record.id.code(),
            asi_state = ?snap.asi_state, timestamp_ms = snap.timestamp_ms,
            "lifecycle event",
        ),
    }
}
