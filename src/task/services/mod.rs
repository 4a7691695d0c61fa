//! Application services for the article generation task queue.

mod claim;
mod drain;
mod enqueue;
mod execute;
mod queue;

pub use drain::{DrainReport, RecoveryOutcome};
pub use queue::{EnqueuedTask, QueueConfig, TaskQueueError, TaskQueueResult, TaskQueueService};
