//! Scenario 2 (spec §8): out-of-range payload.
//!
//! Same request as the happy path but with a payload value outside the
//! action's declared range; ARA must reject it and leave the approved
//! queue untouched.

use super::support::{action_frame, channels, inject_vam_frame, normal_op_shared};
use asi_common::events::{ActionOutcome, EventId, Notification};
use asi_worker::tasks::{ara, icm_rx};

#[test]
fn out_of_range_hvac_fan_request_is_rejected() {
    let shared = normal_op_shared();
    let (vam, cm) = channels();
    // hvac_fan's range is 0..=4; 0x05 is one past the top of it.
    inject_vam_frame(&vam, action_frame(0x0000, 7, 1, 1, [0x05, 0, 0, 0, 0, 0, 0, 0]));

    icm_rx::tick(&shared, &vam, &cm);
    ara::tick(&shared);

    let common = shared.common.lock().unwrap();
    assert!(common.approved_queue.is_empty());
    assert!(common.event_queue.iter().any(|r| r.id == EventId::ActionReqRangeCheckError));
    assert!(common.notification_queue.iter().any(|n| matches!(
        n,
        Notification::Action { msg_id: 0x0000, seq: 7, outcome: ActionOutcome::InvalidActionReq }
    )));
}
