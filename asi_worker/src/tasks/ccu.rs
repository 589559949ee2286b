//! Cycle Counter Unit: advances the global cycle counter, drives every
//! outstanding integrity-tracker deadline off it, and decays vehicle
//! status freshness once a sampled value goes stale.

use crate::shared::Shared;
use asi_common::state::Freshness;

pub fn tick(shared: &Shared) {
    let cutoff = shared.freshness_cutoff_cycles();
    let mut common = shared.common.lock().unwrap();
    common.cycle_count += 1;
    let now = common.cycle_count;

    let mut expired = heapless::Vec::<_, { asi_common::consts::QUEUE_CAPACITY }>::new();
    let mut i = 0;
    while i < common.integrity_trackers.len() {
        let rec = common.integrity_trackers[i];
        if now.saturating_sub(rec.created_at_cycle) > rec.clear_condition.deadline_cycles() {
            let removed = common.integrity_trackers.remove(i);
            let _ = expired.push(removed);
        } else {
            i += 1;
        }
    }

    for rec in expired {
        common.raise_event(rec.clear_condition.timeout_event());
    }

    if common.vehicle_status.park_freshness == Freshness::Fresh
        && now.saturating_sub(common.vehicle_status.park_updated_at_cycle) > cutoff
    {
        common.vehicle_status.park_freshness = Freshness::Outdated;
    }
    if common.vehicle_status.speed_freshness == Freshness::Fresh
        && now.saturating_sub(common.vehicle_status.speed_updated_at_cycle) > cutoff
    {
        common.vehicle_status.speed_freshness = Freshness::Outdated;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::{ClearCondition, IntegrityRecord};
    use asi_common::config::AsiConfig;
    use asi_common::dictionary::MessageRole;
    use asi_common::events::EventId;

    #[test]
    fn cycle_count_advances_every_tick() {
        let shared = Shared::new(AsiConfig::default());
        tick(&shared);
        tick(&shared);
        assert_eq!(shared.common.lock().unwrap().cycle_count, 2);
    }

    #[test]
    fn expired_ack_tracker_raises_ack_loss_and_is_removed() {
        let shared = Shared::new(AsiConfig::default());
        {
            let mut common = shared.common.lock().unwrap();
            common
                .integrity_trackers
                .push(IntegrityRecord {
                    msg_id: 0x0200,
                    seq: 1,
                    response_cycle_count: 0,
                    role: MessageRole::AckFromVam,
                    clear_condition: ClearCondition::Ack,
                    r#type: 0xFF11,
                    created_at_cycle: 0,
                })
                .unwrap();
        }
        for _ in 0..=asi_common::consts::ACK_MESG_RESPONSE_TIME_LIMIT as u64 + 1 {
            tick(&shared);
        }
        let common = shared.common.lock().unwrap();
        assert!(common.integrity_trackers.is_empty());
        assert!(common.event_queue.iter().any(|r| r.id == EventId::AckLoss));
    }

    #[test]
    fn stale_vehicle_status_decays_to_outdated() {
        let shared = Shared::new(AsiConfig::default());
        {
            let mut common = shared.common.lock().unwrap();
            common.vehicle_status.park_freshness = asi_common::state::Freshness::Fresh;
            common.vehicle_status.speed_freshness = asi_common::state::Freshness::Fresh;
            common.vehicle_status.park_updated_at_cycle = 0;
            common.vehicle_status.speed_updated_at_cycle = 0;
        }
        let cutoff = shared.freshness_cutoff_cycles();
        for _ in 0..=cutoff + 1 {
            tick(&shared);
        }
        let common = shared.common.lock().unwrap();
        assert_eq!(common.vehicle_status.park_freshness, asi_common::state::Freshness::Outdated);
        assert_eq!(common.vehicle_status.speed_freshness, asi_common::state::Freshness::Outdated);
    }

    #[test]
    fn freshly_updated_vehicle_status_does_not_decay_within_window() {
        let shared = Shared::new(AsiConfig::default());
        for _ in 0..3 {
            tick(&shared);
        }
        {
            let mut common = shared.common.lock().unwrap();
            let cycle = common.cycle_count;
            common.vehicle_status.park_freshness = asi_common::state::Freshness::Fresh;
            common.vehicle_status.park_updated_at_cycle = cycle;
        }
        tick(&shared);
        let common = shared.common.lock().unwrap();
        assert_eq!(common.vehicle_status.park_freshness, asi_common::state::Freshness::Fresh);
    }
}
