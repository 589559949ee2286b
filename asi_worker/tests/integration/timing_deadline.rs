//! Scenario 4 (spec §8): action-request processing deadline.
//!
//! A request that otherwise passes range and precondition checks must
//! still be rejected if ARA doesn't process it within 50 ms of the
//! timing tracker entry's creation.

use super::support::{action_frame, channels, inject_vam_frame, normal_op_shared};
use asi_common::consts::ACTION_REQUEST_DEADLINE_MS;
use asi_common::events::{ActionOutcome, EventId, Notification};
use asi_worker::tasks::{ara, icm_rx};
use std::time::{Duration, Instant};

#[test]
fn stale_timing_entry_is_rejected_with_timeout() {
    let shared = normal_op_shared();
    let (vam, cm) = channels();
    // seat_pos_driver requires Park (satisfied by normal_op_shared) and
    // accepts 0..=0x64; 0x10 is comfortably in range.
    inject_vam_frame(&vam, action_frame(0x0003, 11, 1, 1, [0x10, 0, 0, 0, 0, 0, 0, 0]));
    icm_rx::tick(&shared, &vam, &cm);

    {
        let mut common = shared.common.lock().unwrap();
        let entry = common
            .action_request_timing
            .iter_mut()
            .find(|t| t.msg_id == 0x0003 && t.seq == 11)
            .expect("timing entry created by ICM-RX");
        // Age it past the 50 ms deadline without a real sleep.
        entry.started_at = Instant::now() - Duration::from_millis(ACTION_REQUEST_DEADLINE_MS + 10);
    }

    ara::tick(&shared);

    let common = shared.common.lock().unwrap();
    assert!(common.approved_queue.is_empty());
    assert!(common.event_queue.iter().any(|r| r.id == EventId::ActionRequestProcessTimeout));
    assert!(common.notification_queue.iter().any(|n| matches!(
        n,
        Notification::Action { msg_id: 0x0003, seq: 11, outcome: ActionOutcome::TimeoutLimit }
    )));
    assert!(!common.action_request_timing.iter().any(|t| t.msg_id == 0x0003 && t.seq == 11));
}
