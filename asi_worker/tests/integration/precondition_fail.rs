//! Scenario 3 (spec §8): Park-required action while not parked.
//!
//! `door_lock` (0x0007) requires Park; with PRNDL = Drive, ARA must
//! reject it with `PreconditionFail` and leave the approved queue
//! untouched.

use super::support::{action_frame, channels, inject_vam_frame, normal_op_shared};
use asi_common::events::{ActionOutcome, EventId, Notification};
use asi_common::state::Prndl;
use asi_worker::tasks::{ara, icm_rx};

#[test]
fn door_lock_rejected_while_driving() {
    let shared = normal_op_shared();
    shared.common.lock().unwrap().vehicle_status.park_status = Prndl::Drive;
    let (vam, cm) = channels();
    inject_vam_frame(&vam, action_frame(0x0007, 1, 1, 1, [0x01, 0, 0, 0, 0, 0, 0, 0]));

    icm_rx::tick(&shared, &vam, &cm);
    ara::tick(&shared);

    let common = shared.common.lock().unwrap();
    assert!(common.approved_queue.is_empty());
    assert!(common.event_queue.iter().any(|r| r.id == EventId::ActionReqPrecondListError));
    assert!(common.notification_queue.iter().any(|n| matches!(
        n,
        Notification::Action { msg_id: 0x0007, seq: 1, outcome: ActionOutcome::PreconditionFail }
    )));
}
