//! Unit tests for the task queue.
//!
//! Service tests run against the in-memory adapters with a fixed clock so
//! ordering and stuck-task thresholds are deterministic.

mod support;
