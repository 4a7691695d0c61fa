//! Error types for task domain validation and parsing.

use super::{TaskId, TaskStatus};
use thiserror::Error;

/// Errors returned while constructing or transitioning domain values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TaskDomainError {
    /// The business date is not a `YYYY-MM-DD` calendar day.
    #[error("invalid business date '{0}', expected YYYY-MM-DD")]
    InvalidBusinessDate(String),

    /// The version exceeds the persisted range.
    #[error("invalid task version {0}")]
    InvalidVersion(u64),

    /// The profile name is empty after trimming.
    #[error("profile name must not be empty")]
    EmptyProfileName,

    /// The profile concurrency is zero.
    #[error("profile concurrency must be at least 1")]
    InvalidConcurrency,

    /// The requested status transition is not allowed.
    #[error("task {task_id} cannot move from {from} to {to}")]
    InvalidStateTransition {
        /// Task whose transition was rejected.
        task_id: TaskId,
        /// Status at the time of the request.
        from: TaskStatus,
        /// Requested target status.
        to: TaskStatus,
    },
}

/// Error returned while parsing task statuses from persistence.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown task status: {0}")]
pub struct ParseTaskStatusError(pub String);

/// Error returned while parsing trigger sources.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown trigger source: {0}")]
pub struct ParseTriggerSourceError(pub String);

/// Error returned while parsing task types from persistence.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown task type: {0}")]
pub struct ParseTaskTypeError(pub String);

/// Error returned while parsing article statuses from persistence.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown article status: {0}")]
pub struct ParseArticleStatusError(pub String);
