//! ASI Common Library
//!
//! Shared constants, wire format, fault taxonomy, and configuration
//! loading utilities used by both the `asi` parent supervisor and the
//! `asi_worker` child process.
//!
//! # Module Structure
//!
//! - [`consts`] — system-wide numeric limits and defaults
//! - [`dictionary`] — static action/message-kind/message-dictionary tables
//! - [`wire`] — TLV frame layout, CRC-16/CCITT, `FrameSource`/`FrameSink`
//! - [`events`] — fault taxonomy (`EventId`, `Severity`, `Notification`)
//! - [`state`] — shared state entities (`AsiState`, `Prndl`, `VehicleStatus`)
//! - [`persistence`] — checksum-verified snapshot read/write
//! - [`ratelimit`] — token-bucket rate limiter
//! - [`config`] — configuration loading traits and types
//! - [`watchdog`] — supervisor contract for worker lifecycle management
//! - [`prelude`] — common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use asi_common::prelude::*;
//! ```

pub mod config;
pub mod consts;
pub mod dictionary;
pub mod events;
pub mod persistence;
pub mod prelude;
pub mod ratelimit;
pub mod state;
pub mod watchdog;
pub mod wire;
