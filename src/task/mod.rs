//! Daily article generation task queue.
//!
//! Tasks are enqueued per business date and generation profile, claimed one
//! at a time under a global single-running rule, executed against a
//! generation client with checkpointed progress, and recovered when a worker
//! dies mid-run. The module follows hexagonal architecture:
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - Orchestration services in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
