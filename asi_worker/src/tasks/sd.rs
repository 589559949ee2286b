//! State-monitor/Diagnostics: cross-checks `AsiState`
//! against an independently-held shadow copy, and periodically pings
//! both endpoints to confirm they're still reachable.

use crate::net::TcpEndpoint;
use crate::shared::Shared;
use crate::tasks::stm::is_legal_transition;
use asi_common::consts::{HEALTH_CHECK_DEADLINE_MS, HEALTH_CHECK_INTERVAL_CYCLES};
use asi_common::events::EventId;
use std::sync::Mutex;
use std::time::Duration;
use tracing::warn;

pub fn tick(shared: &Shared, vam: &Mutex<TcpEndpoint>, cm: &Mutex<TcpEndpoint>) {
    // Private lock first, common second.
    let mut sd_private = shared.sd_private.lock().unwrap();
    let mut common = shared.common.lock().unwrap();
    cross_check(&mut sd_private, &mut common);
    drop(common);

    sd_private.health_check_cycle += 1;
    if sd_private.health_check_cycle % HEALTH_CHECK_INTERVAL_CYCLES != 0 {
        return;
    }

    let deadline = Duration::from_millis(HEALTH_CHECK_DEADLINE_MS);
    if !vam.lock().unwrap().health_check(deadline) {
        warn!(endpoint = "vam", "health check failed");
        shared.raise(EventId::CommLoss);
    }
    if !cm.lock().unwrap().health_check(deadline) {
        warn!(endpoint = "cm", "health check failed");
        shared.raise(EventId::CommLoss);
    }
}

/// The shadow-vs-live comparison against the transition matrix, plus the
/// critical-fault-flag cross-check, factored out of `tick` so it can be
/// unit-tested without a live `TcpEndpoint`.
fn cross_check(sd_private: &mut crate::shared::SdPrivate, common: &mut crate::shared::CommonState) {
    let live_state = common.asi_state;
    if sd_private.shadow_state != live_state && !is_legal_transition(sd_private.shadow_state, live_state) {
        common.raise_event(EventId::SmTransitionError);
        Shared::enter_safe_state(common);
    } else if common.critical_fault_flag && common.asi_state != asi_common::state::AsiState::SafeState {
        common.raise_event(EventId::SmTransitionError);
    }
    sd_private.shadow_state = common.asi_state;
}
