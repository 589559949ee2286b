//! Periodic persistence of the worker's own `CommonState` to the two
//! redundant files spec §4.1/§6 describes, plus startup restore.
//!
//! The queues and trackers are intentionally left out of the persisted
//! payload: they hold in-flight messages whose sender-side state (the
//! VAM/CM's own retry or re-send logic) is outside this process, so
//! restoring them verbatim after a crash would resurrect work against
//! peers that have likely moved on. What *is* persisted is exactly the
//! state spec §8's "byte-identical across a soft restart" property
//! actually depends on: the state machine, the fault flag, the cycle
//! counter, vehicle status, and the per-role rolling/sequence counters
//! (losing those would make CCU/ICM-RX relitigate counters the other
//! side already advanced past).

use crate::shared::{CommonState, RollingCounterState, SequenceState, Shared};
use asi_common::consts::MESSAGE_DICTIONARY_COUNT;
use asi_common::persistence::{self, PersistenceError};
use asi_common::state::{AsiState, Freshness, Prndl, VehicleStatus};
use std::path::Path;
use tracing::{info, warn};

const PERSISTED_LEN: usize = 1 + 1 + 1 + 1 + 8 + 1 + 4 + 1 + 1 + 8 + 8 + MESSAGE_DICTIONARY_COUNT * 5 + MESSAGE_DICTIONARY_COUNT * 4;

/// Encode the subset of `CommonState` described above into a flat
/// little-endian byte buffer, mirroring the TLV frame's own
/// hand-rolled-layout style rather than pulling in a second
/// serialization stack for one struct (SPEC_FULL §3).
pub fn encode(common: &CommonState) -> Vec<u8> {
    let mut buf = Vec::with_capacity(PERSISTED_LEN);
    buf.push(common.asi_state.wire_value());
    buf.push(common.critical_fault_flag as u8);
    buf.push(common.init_complete as u8);
    buf.push(match common.startup_test_passed {
        None => 0,
        Some(false) => 1,
        Some(true) => 2,
    });
    buf.extend_from_slice(&common.cycle_count.to_le_bytes());
    buf.push(common.vehicle_status.park_status.to_wire());
    buf.extend_from_slice(&common.vehicle_status.speed.to_le_bytes());
    buf.push(common.vehicle_status.park_freshness.to_wire());
    buf.push(common.vehicle_status.speed_freshness.to_wire());
    buf.extend_from_slice(&common.vehicle_status.park_updated_at_cycle.to_le_bytes());
    buf.extend_from_slice(&common.vehicle_status.speed_updated_at_cycle.to_le_bytes());
    for rc in &common.rolling_counters {
        buf.extend_from_slice(&rc.rx.to_le_bytes());
        buf.extend_from_slice(&rc.tx.to_le_bytes());
        buf.push(rc.consecutive_violations);
    }
    for seq in &common.sequence_numbers {
        buf.extend_from_slice(&seq.last_seen.to_le_bytes());
        buf.extend_from_slice(&seq.last_emitted.to_le_bytes());
    }
    debug_assert_eq!(buf.len(), PERSISTED_LEN);
    buf
}

/// Decode a buffer produced by [`encode`] and apply it to `common`.
/// Leaves `common` untouched and returns `false` on any length mismatch
/// rather than partially applying a corrupt payload.
pub fn apply(common: &mut CommonState, buf: &[u8]) -> bool {
    if buf.len() != PERSISTED_LEN {
        warn!(expected = PERSISTED_LEN, got = buf.len(), "persisted worker state has unexpected length, ignoring");
        return false;
    }
    let mut i = 0;
    let asi_state = AsiState::from_wire(buf[i]);
    i += 1;
    let critical_fault_flag = buf[i] != 0;
    i += 1;
    let init_complete = buf[i] != 0;
    i += 1;
    let startup_test_passed = match buf[i] {
        1 => Some(false),
        2 => Some(true),
        _ => None,
    };
    i += 1;
    let cycle_count = u64::from_le_bytes(buf[i..i + 8].try_into().unwrap());
    i += 8;
    let park_status = Prndl::from_wire(buf[i]).unwrap_or(Prndl::Park);
    i += 1;
    let speed = f32::from_le_bytes(buf[i..i + 4].try_into().unwrap());
    i += 4;
    let park_freshness = Freshness::from_wire(buf[i]);
    i += 1;
    let speed_freshness = Freshness::from_wire(buf[i]);
    i += 1;
    let park_updated_at_cycle = u64::from_le_bytes(buf[i..i + 8].try_into().unwrap());
    i += 8;
    let speed_updated_at_cycle = u64::from_le_bytes(buf[i..i + 8].try_into().unwrap());
    i += 8;

    let mut rolling_counters = [RollingCounterState::default(); MESSAGE_DICTIONARY_COUNT];
    for rc in rolling_counters.iter_mut() {
        let rx = u16::from_le_bytes(buf[i..i + 2].try_into().unwrap());
        let tx = u16::from_le_bytes(buf[i + 2..i + 4].try_into().unwrap());
        let consecutive_violations = buf[i + 4];
        *rc = RollingCounterState { rx, tx, consecutive_violations };
        i += 5;
    }
    let mut sequence_numbers = [SequenceState::default(); MESSAGE_DICTIONARY_COUNT];
    for seq in sequence_numbers.iter_mut() {
        let last_seen = u16::from_le_bytes(buf[i..i + 2].try_into().unwrap());
        let last_emitted = u16::from_le_bytes(buf[i + 2..i + 4].try_into().unwrap());
        *seq = SequenceState { last_seen, last_emitted };
        i += 4;
    }
    debug_assert_eq!(i, PERSISTED_LEN);

    common.asi_state = asi_state;
    common.critical_fault_flag = critical_fault_flag;
    common.init_complete = init_complete;
    common.startup_test_passed = startup_test_passed;
    common.cycle_count = cycle_count;
    common.vehicle_status = VehicleStatus {
        park_status,
        speed,
        park_freshness,
        speed_freshness,
        park_updated_at_cycle,
        speed_updated_at_cycle,
    };
    common.rolling_counters = rolling_counters;
    common.sequence_numbers = sequence_numbers;
    true
}

/// Write the current `CommonState` to both redundant files.
pub fn persist_now(shared: &Shared, primary: &Path, secondary: &Path) {
    let payload = encode(&shared.common.lock().unwrap());
    if let Some(dir) = primary.parent() {
        let _ = std::fs::create_dir_all(dir);
    }
    if let Err(e) = persistence::write_snapshot(primary, &payload) {
        warn!(error = %e, path = %primary.display(), "failed to write primary worker state snapshot");
    }
    if let Err(e) = persistence::write_snapshot(secondary, &payload) {
        warn!(error = %e, path = %secondary.display(), "failed to write secondary worker state snapshot");
    }
}

/// Restore on startup: prefer whichever of the two files validates,
/// child-preferred per [`persistence::restore_preferred`]. A missing or
/// corrupt pair means fresh init — not fatal, just a cold start.
pub fn restore_into(shared: &Shared, primary: &Path, secondary: &Path) {
    let Some(bytes) = persistence::restore_preferred(primary, secondary) else {
        info!("no prior worker state snapshot found, starting cold");
        return;
    };
    let mut common = shared.common.lock().unwrap();
    if apply(&mut common, &bytes) {
        info!(asi_state = ?common.asi_state, cycle_count = common.cycle_count, "restored worker state from snapshot");
    }
}

/// Read a raw snapshot file without applying it, purely to support the
/// "restore preference" unit tests below without needing a live `Shared`.
#[cfg(test)]
fn read_raw(path: &Path) -> Result<Vec<u8>, PersistenceError> {
    persistence::read_snapshot(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use asi_common::config::AsiConfig;
    use asi_common::events::EventId;
    use tempfile::tempdir;

    #[test]
    fn encode_decode_round_trips_every_field() {
        let shared = Shared::new(AsiConfig::default());
        {
            let mut common = shared.common.lock().unwrap();
            common.asi_state = AsiState::NormalOp;
            common.critical_fault_flag = true;
            common.init_complete = true;
            common.startup_test_passed = Some(true);
            common.cycle_count = 123_456;
            common.vehicle_status.park_status = Prndl::Drive;
            common.vehicle_status.speed = 12.5;
            common.vehicle_status.park_freshness = Freshness::Fresh;
            common.vehicle_status.speed_freshness = Freshness::Outdated;
            common.vehicle_status.park_updated_at_cycle = 123_450;
            common.vehicle_status.speed_updated_at_cycle = 123_400;
            common.rolling_counters[3] = RollingCounterState { rx: 7, tx: 9, consecutive_violations: 2 };
            common.sequence_numbers[5] = SequenceState { last_seen: 40, last_emitted: 41 };
        }

        let encoded = encode(&shared.common.lock().unwrap());
        assert_eq!(encoded.len(), PERSISTED_LEN);

        let restored = Shared::new(AsiConfig::default());
        {
            let mut common = restored.common.lock().unwrap();
            assert!(apply(&mut common, &encoded));
        }

        let a = shared.common.lock().unwrap();
        let b = restored.common.lock().unwrap();
        assert_eq!(a.asi_state, b.asi_state);
        assert_eq!(a.critical_fault_flag, b.critical_fault_flag);
        assert_eq!(a.init_complete, b.init_complete);
        assert_eq!(a.startup_test_passed, b.startup_test_passed);
        assert_eq!(a.cycle_count, b.cycle_count);
        assert_eq!(a.vehicle_status.park_status, b.vehicle_status.park_status);
        assert_eq!(a.vehicle_status.speed, b.vehicle_status.speed);
        assert_eq!(a.vehicle_status.park_freshness, b.vehicle_status.park_freshness);
        assert_eq!(a.vehicle_status.speed_freshness, b.vehicle_status.speed_freshness);
        assert_eq!(a.vehicle_status.park_updated_at_cycle, b.vehicle_status.park_updated_at_cycle);
        assert_eq!(a.vehicle_status.speed_updated_at_cycle, b.vehicle_status.speed_updated_at_cycle);
        assert_eq!(a.rolling_counters[3].rx, b.rolling_counters[3].rx);
        assert_eq!(a.rolling_counters[3].tx, b.rolling_counters[3].tx);
        assert_eq!(a.sequence_numbers[5].last_seen, b.sequence_numbers[5].last_seen);
        assert_eq!(a.sequence_numbers[5].last_emitted, b.sequence_numbers[5].last_emitted);
    }

    #[test]
    fn apply_rejects_wrong_length_without_mutating() {
        let shared = Shared::new(AsiConfig::default());
        shared.common.lock().unwrap().asi_state = AsiState::NormalOp;
        let mut common = shared.common.lock().unwrap();
        assert!(!apply(&mut common, &[1, 2, 3]));
        assert_eq!(common.asi_state, AsiState::NormalOp);
    }

    #[test]
    fn persist_then_restore_is_byte_identical_across_a_soft_restart() {
        let dir = tempdir().unwrap();
        let primary = dir.path().join("a.bin");
        let secondary = dir.path().join("b.bin");

        let before = Shared::new(AsiConfig::default());
        {
            let mut common = before.common.lock().unwrap();
            common.asi_state = AsiState::StartupTest;
            common.cycle_count = 99;
            common.raise_event(EventId::InitComplete);
        }
        persist_now(&before, &primary, &secondary);

        let after = Shared::new(AsiConfig::default());
        restore_into(&after, &primary, &secondary);

        assert_eq!(after.common.lock().unwrap().asi_state, AsiState::StartupTest);
        assert_eq!(after.common.lock().unwrap().cycle_count, 99);
        assert_eq!(read_raw(&primary).unwrap(), read_raw(&secondary).unwrap());
    }
}
