//! Scenario 5 (spec §8): critical fault drives Safe-State.
//!
//! Raising `EcuCriticalFail` sets the critical fault flag; the next STM
//! tick must transition to `SafeState`, clear the integrity and
//! approved queues, and leave exactly one status notification on the
//! SS queue.

use super::support::normal_op_shared;
use asi_common::events::{EventId, Notification};
use asi_common::state::AsiState;
use asi_worker::shared::ProcessMsg;
use asi_worker::tasks::stm;

#[test]
fn critical_fault_transitions_to_safe_state_and_clears_queues() {
    let shared = normal_op_shared();
    {
        let mut common = shared.common.lock().unwrap();
        common
            .approved_queue
            .push(ProcessMsg { r#type: 0xFF11, length: 1, msg_id: 0, seq: 1, payload: [0; 8] })
            .unwrap();
        common
            .integrity_queue
            .push(ProcessMsg { r#type: 0xFF11, length: 1, msg_id: 0, seq: 2, payload: [0; 8] })
            .unwrap();
        common.raise_event(EventId::EcuCriticalFail);
        assert!(common.critical_fault_flag);
    }

    stm::tick(&shared);

    let common = shared.common.lock().unwrap();
    assert_eq!(common.asi_state, AsiState::SafeState);
    assert!(common.approved_queue.is_empty());
    assert!(common.integrity_queue.is_empty());
    assert_eq!(common.ss_queue.len(), 1);
    assert_eq!(
        common.ss_queue[0],
        Notification::AsiStatus { state_value: AsiState::SafeState.wire_value() }
    );
}
