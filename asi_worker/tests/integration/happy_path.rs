//! Scenario 1 (spec §8): happy path.
//!
//! State = NormalOp. ICM-RX receives an in-range action request with no
//! precondition; ARA approves it onto the approved queue and emits an
//! `Approved` outcome notification.

use super::support::{action_frame, channels, inject_vam_frame, normal_op_shared};
use asi_common::events::{ActionOutcome, Notification};
use asi_worker::tasks::{ara, icm_rx};

#[test]
fn in_range_hvac_fan_request_is_approved_end_to_end() {
    let shared = normal_op_shared();
    let (vam, cm) = channels();
    inject_vam_frame(&vam, action_frame(0x0000, 7, 1, 1, [0x02, 0, 0, 0, 0, 0, 0, 0]));

    icm_rx::tick(&shared, &vam, &cm);
    ara::tick(&shared);

    let common = shared.common.lock().unwrap();
    assert_eq!(common.approved_queue.len(), 1);
    let approved = common.approved_queue[0];
    assert_eq!((approved.msg_id, approved.seq, approved.payload[0]), (0x0000, 7, 0x02));

    assert!(common.notification_queue.iter().any(|n| matches!(
        n,
        Notification::Action { msg_id: 0x0000, seq: 7, outcome: ActionOutcome::Approved }
    )));
}
