//! Integration tests for the ASI worker pipeline.
//!
//! These tests drive the real per-task `tick` functions together
//! against an in-memory `FrameSource`/`FrameSink` and a directly
//! constructed `Shared`, exercising the literal end-to-end scenarios
//! from the safety-interlock specification.

mod integration;
