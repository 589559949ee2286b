//! The eight periodic tasks that make up the pipeline.
//!
//! Each module exposes a `tick(shared: &Shared, ...)` function matching
//! the `Box<dyn Fn(&Shared) + Send + Sync>` shape the scheduler expects;
//! tasks that need network endpoints take them as extra closure
//! captures wired up in `main.rs`, not through `Shared` itself, so they
//! stay swappable with the in-memory doubles in tests.

pub mod ara;
pub mod ccu;
pub mod crv;
pub mod fm;
pub mod icm_rx;
pub mod icm_tx;
pub mod sd;
pub mod stm;
