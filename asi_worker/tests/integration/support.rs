//! Shared helpers for the integration scenario tests.

use asi_common::config::AsiConfig;
use asi_common::consts::TLV_FRAME_LEN;
use asi_common::dictionary::lookup_kind;
use asi_common::state::{AsiState, Freshness, Prndl};
use asi_common::wire::TlvFrame;
use asi_worker::net::MemoryChannel;
use asi_worker::shared::Shared;
use std::sync::Mutex;

/// A `Shared` already in `NormalOp` with a fresh, parked, stationary
/// vehicle status — the common starting point for ARA scenarios.
pub fn normal_op_shared() -> Shared {
    let shared = Shared::new(AsiConfig::default());
    let mut common = shared.common.lock().unwrap();
    common.asi_state = AsiState::NormalOp;
    common.init_complete = true;
    common.startup_test_passed = Some(true);
    common.vehicle_status.park_status = Prndl::Park;
    common.vehicle_status.speed = 0.0;
    common.vehicle_status.park_freshness = Freshness::Fresh;
    common.vehicle_status.speed_freshness = Freshness::Fresh;
    drop(common);
    shared
}

/// Build a serialized Action-type TLV frame (`msg_id` is the action id).
pub fn action_frame(msg_id: u16, seq: u16, rolling: u16, length: u16, payload: [u8; 8]) -> [u8; TLV_FRAME_LEN] {
    TlvFrame::new(lookup_kind(0xFF11).unwrap().type_id, length, rolling, 0, seq, msg_id, payload).serialize()
}

/// An empty-inbound, capture-outbound channel pair, wired as
/// (VAM, CM) the way `asi_worker::main` wires the real endpoints.
pub fn channels() -> (Mutex<MemoryChannel>, Mutex<MemoryChannel>) {
    (Mutex::new(MemoryChannel::default()), Mutex::new(MemoryChannel::default()))
}

/// Push one inbound frame onto the VAM channel's queue.
pub fn inject_vam_frame(vam: &Mutex<MemoryChannel>, frame: [u8; TLV_FRAME_LEN]) {
    vam.lock().unwrap().inbound.push_back(frame);
}
