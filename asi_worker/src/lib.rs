//! # ASI Worker
//!
//! Hosts the eight periodic tasks of the safety-interlock pipeline: one
//! OS thread per task, a shared state region guarded by private/common
//! mutexes, and a small supervisor loop that restarts any task thread
//! that panics, up to a bounded number of restarts.
//!
//! Real-time scheduling (`SCHED_FIFO`, `mlockall`) is opt-in behind the
//! `rt` feature; the default build runs every task at normal OS
//! scheduling priority, which is sufficient for development and test.

#![deny(clippy::disallowed_types)]

pub mod net;
pub mod persist;
pub mod scheduler;
pub mod shared;
pub mod tasks;
