//! Scenario 6 (spec §8): event queue overflow.
//!
//! Filling the bounded event queue with `Normal`-severity events and
//! then raising a `Critical` one must replace a `Normal` entry rather
//! than drop the new, higher-severity event; queue size never exceeds
//! capacity.

use super::support::normal_op_shared;
use asi_common::consts::EVENT_QUEUE_CAPACITY;
use asi_common::events::EventId;

#[test]
fn critical_event_replaces_a_normal_entry_when_full() {
    let shared = normal_op_shared();
    let mut common = shared.common.lock().unwrap();

    for _ in 0..EVENT_QUEUE_CAPACITY {
        common.raise_event(EventId::AckLoss); // Normal severity
    }
    assert_eq!(common.event_queue.len(), EVENT_QUEUE_CAPACITY);
    assert!(common.event_queue.iter().all(|r| r.id == EventId::AckLoss));

    common.raise_event(EventId::Overrun); // Critical severity

    assert_eq!(common.event_queue.len(), EVENT_QUEUE_CAPACITY);
    assert!(common.event_queue.iter().any(|r| r.id == EventId::Overrun));
    assert_eq!(common.event_queue.iter().filter(|r| r.id == EventId::AckLoss).count(), EVENT_QUEUE_CAPACITY - 1);
}
