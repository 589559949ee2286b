//! State-Transition Monitor: the `AsiState` state machine.
//!
//! Structured the way the teacher's control-unit state machine is —
//! a plain `(state, event) -> TransitionResult` function kept separate
//! from the task body that decides which event applies this tick —
//! so the transition table itself is unit-testable without a `Shared`.

use crate::shared::{CommonState, Shared};
use asi_common::dictionary::{ActionEntry, MessageDictionaryEntry, ACTIONS, MESSAGE_DICTIONARY};
use asi_common::events::{EventId, Notification};
use asi_common::state::{AsiState, Freshness};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsiEvent {
    InitComplete,
    StartupTestPassed,
    CriticalFault,
    InitInactive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionResult {
    Ok(AsiState),
    Rejected(&'static str),
}

/// Whether `from -> to` is a legal state change, independent of
/// which event drove it. Used by the state monitor (SD) to cross-check
/// STM's own transitions against a shadow copy it keeps itself, per
/// spec §4.4's "state-transition matrix" — a separate table from
/// `transition` above, even though both describe the same machine, so
/// the monitor doesn't simply trust whatever STM wrote.
pub fn is_legal_transition(from: AsiState, to: AsiState) -> bool {
    use AsiState::*;
    if from == to {
        return true;
    }
    if to == SafeState {
        return from != SafeState;
    }
    matches!((from, to), (Initial, StartupTest) | (StartupTest, NormalOp))
}

/// The transition table itself: `SafeState` is reachable
/// from any state on `CriticalFault` or `InitInactive` and is absorbing.
pub fn transition(state: AsiState, event: AsiEvent) -> TransitionResult {
    use AsiEvent::*;
    use AsiState::*;

    if state == SafeState {
        return TransitionResult::Rejected("SafeState is absorbing");
    }
    if matches!(event, CriticalFault | InitInactive) {
        return TransitionResult::Ok(SafeState);
    }
    match (state, event) {
        (Initial, InitComplete) => TransitionResult::Ok(StartupTest),
        (StartupTest, StartupTestPassed) => TransitionResult::Ok(NormalOp),
        _ => TransitionResult::Rejected("no transition for this (state, event) pair"),
    }
}

fn apply(common: &mut CommonState, event: AsiEvent) {
    match transition(common.asi_state, event) {
        TransitionResult::Ok(AsiState::SafeState) => Shared::enter_safe_state(common),
        TransitionResult::Ok(AsiState::StartupTest) => {
            common.asi_state = AsiState::StartupTest;
            run_startup_self_test(common);
        }
        TransitionResult::Ok(next) => common.asi_state = next,
        TransitionResult::Rejected(reason) => {
            warn!(reason, state = ?common.asi_state, event = ?event, "state transition rejected");
            common.raise_event(EventId::SmTransitionError);
        }
    }
}

/// Runs once, on entering `StartupTest`: there is no dedicated task for
/// this in spec §2's eight-task table, so STM itself performs it at the
/// transition boundary, then waits (like every other `StartupTest` tick)
/// for park/speed freshness before advancing to `NormalOp`.
///
/// Spec doesn't define the self-test's content, so it checks the one
/// thing plausibly meant by "startup memory error": that the
/// compile-time action/dictionary tables the rest of the pipeline is
/// about to trust still hold their own invariants. A failure is
/// reported as `StartupMemError` rather than `StartupTestResult`, and
/// `StartupTest -> NormalOp` is never taken.
fn run_startup_self_test(common: &mut CommonState) {
    let passed = tables_are_consistent(&ACTIONS, &MESSAGE_DICTIONARY);
    common.startup_test_passed = Some(passed);
    common.raise_event(if passed { EventId::StartupTestResult } else { EventId::StartupMemError });
    let _ = common.notification_queue.push(Notification::StartupTest { passed });
}

/// Checks the static action/dictionary tables for the invariants spec
/// §3 requires of them: `range_lo <= range_hi` and unique `action_id`
/// for every [`ActionEntry`]; unique `role` (and, where assigned,
/// unique `message_id`) for every [`MessageDictionaryEntry`].
fn tables_are_consistent(actions: &[ActionEntry], dictionary: &[MessageDictionaryEntry]) -> bool {
    for (i, a) in actions.iter().enumerate() {
        if a.range_lo > a.range_hi {
            return false;
        }
        if actions[..i].iter().any(|b| b.action_id == a.action_id) {
            return false;
        }
    }
    for (i, a) in dictionary.iter().enumerate() {
        if dictionary[..i].iter().any(|b| b.role == a.role) {
            return false;
        }
        if a.message_id != asi_common::consts::UNASSIGNED_MESSAGE_ID
            && dictionary[..i].iter().any(|b| b.message_id == a.message_id)
        {
            return false;
        }
    }
    true
}

pub fn tick(shared: &Shared) {
    let mut common = shared.common.lock().unwrap();

    if common.critical_fault_flag && common.asi_state != AsiState::SafeState {
        apply(&mut common, AsiEvent::CriticalFault);
        return;
    }
    if !common.init_complete && !matches!(common.asi_state, AsiState::Initial | AsiState::SafeState) {
        apply(&mut common, AsiEvent::InitInactive);
        return;
    }

    match common.asi_state {
        AsiState::Initial if common.init_complete => apply(&mut common, AsiEvent::InitComplete),
        AsiState::StartupTest => {
            let fresh = common.vehicle_status.park_freshness == Freshness::Fresh
                && common.vehicle_status.speed_freshness == Freshness::Fresh;
            if fresh && common.startup_test_passed == Some(true) {
                apply(&mut common, AsiEvent::StartupTestPassed);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use asi_common::config::AsiConfig;

    #[test]
    fn initial_to_startup_test_on_init_complete() {
        assert_eq!(
            transition(AsiState::Initial, AsiEvent::InitComplete),
            TransitionResult::Ok(AsiState::StartupTest)
        );
    }

    #[test]
    fn critical_fault_drives_safe_state_from_any_live_state() {
        for s in [AsiState::Initial, AsiState::StartupTest, AsiState::NormalOp] {
            assert_eq!(transition(s, AsiEvent::CriticalFault), TransitionResult::Ok(AsiState::SafeState));
        }
    }

    #[test]
    fn legal_transition_matrix_allows_the_real_path_and_any_state_to_safe_state() {
        assert!(is_legal_transition(AsiState::Initial, AsiState::StartupTest));
        assert!(is_legal_transition(AsiState::StartupTest, AsiState::NormalOp));
        for s in [AsiState::Initial, AsiState::StartupTest, AsiState::NormalOp] {
            assert!(is_legal_transition(s, AsiState::SafeState));
        }
        assert!(!is_legal_transition(AsiState::Initial, AsiState::NormalOp));
        assert!(!is_legal_transition(AsiState::SafeState, AsiState::NormalOp));
    }

    #[test]
    fn safe_state_rejects_every_event() {
        assert_eq!(
            transition(AsiState::SafeState, AsiEvent::InitComplete),
            TransitionResult::Rejected("SafeState is absorbing")
        );
    }

    #[test]
    fn tick_advances_from_initial_once_init_complete_is_set() {
        let shared = Shared::new(AsiConfig::default());
        shared.common.lock().unwrap().init_complete = true;
        tick(&shared);
        assert_eq!(shared.common.lock().unwrap().asi_state, AsiState::StartupTest);
    }

    #[test]
    fn tick_enters_normal_op_once_fresh_and_passed() {
        let shared = Shared::new(AsiConfig::default());
        {
            let mut common = shared.common.lock().unwrap();
            common.init_complete = true;
            common.asi_state = AsiState::StartupTest;
            common.vehicle_status.park_freshness = Freshness::Fresh;
            common.vehicle_status.speed_freshness = Freshness::Fresh;
            common.startup_test_passed = Some(true);
        }
        tick(&shared);
        assert_eq!(shared.common.lock().unwrap().asi_state, AsiState::NormalOp);
    }

    #[test]
    fn entering_startup_test_runs_the_self_test_and_reaches_normal_op() {
        let shared = Shared::new(AsiConfig::default());
        {
            let mut common = shared.common.lock().unwrap();
            common.init_complete = true;
        }
        tick(&shared); // Initial -> StartupTest, self-test runs
        {
            let common = shared.common.lock().unwrap();
            assert_eq!(common.asi_state, AsiState::StartupTest);
            assert_eq!(common.startup_test_passed, Some(true));
            assert!(common.event_queue.iter().any(|r| r.id == EventId::StartupTestResult));
        }
        {
            let mut common = shared.common.lock().unwrap();
            common.vehicle_status.park_freshness = Freshness::Fresh;
            common.vehicle_status.speed_freshness = Freshness::Fresh;
        }
        tick(&shared); // StartupTest -> NormalOp
        assert_eq!(shared.common.lock().unwrap().asi_state, AsiState::NormalOp);
    }

    #[test]
    fn tick_forces_safe_state_on_critical_fault() {
        let shared = Shared::new(AsiConfig::default());
        {
            let mut common = shared.common.lock().unwrap();
            common.init_complete = true;
            common.asi_state = AsiState::NormalOp;
            common.critical_fault_flag = true;
        }
        tick(&shared);
        assert_eq!(shared.common.lock().unwrap().asi_state, AsiState::SafeState);
    }

    #[test]
    fn tables_are_consistent_accepts_the_real_static_tables() {
        assert!(tables_are_consistent(&ACTIONS, &MESSAGE_DICTIONARY));
    }

    #[test]
    fn tables_are_consistent_rejects_duplicate_action_id() {
        let mut actions = ACTIONS;
        actions[1].action_id = actions[0].action_id;
        assert!(!tables_are_consistent(&actions, &MESSAGE_DICTIONARY));
    }

    #[test]
    fn tables_are_consistent_rejects_inverted_range() {
        let mut actions = ACTIONS;
        actions[0].range_lo = actions[0].range_hi + 1;
        assert!(!tables_are_consistent(&actions, &MESSAGE_DICTIONARY));
    }

    #[test]
    fn tables_are_consistent_rejects_duplicate_role() {
        let mut dictionary = MESSAGE_DICTIONARY;
        dictionary[1].role = dictionary[0].role;
        assert!(!tables_are_consistent(&ACTIONS, &dictionary));
    }

    #[test]
    fn failed_self_test_raises_startup_mem_error_and_blocks_normal_op() {
        let shared = Shared::new(AsiConfig::default());
        {
            let mut common = shared.common.lock().unwrap();
            common.init_complete = true;
            common.asi_state = AsiState::Initial;
        }
        {
            let mut common = shared.common.lock().unwrap();
            // Simulate a corrupted table by calling the self-test body
            // directly with an inconsistent action table.
            let mut actions = ACTIONS;
            actions[0].range_lo = actions[0].range_hi + 1;
            let passed = tables_are_consistent(&actions, &MESSAGE_DICTIONARY);
            common.startup_test_passed = Some(passed);
            common.raise_event(if passed { EventId::StartupTestResult } else { EventId::StartupMemError });
            let _ = common.notification_queue.push(Notification::StartupTest { passed });
        }
        let common = shared.common.lock().unwrap();
        assert_eq!(common.startup_test_passed, Some(false));
        assert!(common.critical_fault_flag);
        assert!(common.event_queue.iter().any(|r| r.id == EventId::StartupMemError));
        assert!(matches!(common.notification_queue[0], Notification::StartupTest { passed: false }));
    }
}
