//! Repository port for task persistence and conditional state changes.
//!
//! Every method that changes `status` is a single conditional write. A
//! `false` return means the condition no longer held (another writer got
//! there first), not that anything failed.

use crate::task::domain::{Article, BusinessDate, ProfileId, Task, TaskId, TaskVersion};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

/// Result type for task repository operations.
pub type TaskRepositoryResult<T> = Result<T, TaskRepositoryError>;

/// Terminal success write for a running task.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskCompletion {
    /// Task being completed.
    pub task_id: TaskId,
    /// Result summary that replaces any checkpoint.
    pub result: Value,
    /// Article to insert in the same transaction, if any.
    pub article: Option<Article>,
    /// Completion timestamp.
    pub finished_at: DateTime<Utc>,
}

/// Terminal failure write for a running task.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskFailure {
    /// Task being failed.
    pub task_id: TaskId,
    /// Human-readable failure message.
    pub message: String,
    /// Structured failure context.
    pub context: Value,
    /// Completion timestamp.
    pub finished_at: DateTime<Utc>,
}

/// Task persistence contract.
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// Stores a new task.
    ///
    /// # Errors
    ///
    /// Returns [`TaskRepositoryError::DuplicateTask`] when the task ID already
    /// exists.
    async fn insert(&self, task: &Task) -> TaskRepositoryResult<()>;

    /// Finds a task by identifier.
    async fn find_by_id(&self, id: TaskId) -> TaskRepositoryResult<Option<Task>>;

    /// Returns every task for a business date, oldest first.
    async fn find_by_date(&self, task_date: BusinessDate) -> TaskRepositoryResult<Vec<Task>>;

    /// Returns whether any task, in any status, exists for the profile and
    /// date.
    async fn exists_for_profile_on(
        &self,
        task_date: BusinessDate,
        profile_id: ProfileId,
    ) -> TaskRepositoryResult<bool>;

    /// Counts tasks currently running.
    async fn count_running(&self) -> TaskRepositoryResult<u64>;

    /// Returns every running task.
    async fn find_running(&self) -> TaskRepositoryResult<Vec<Task>>;

    /// Returns the oldest queued task across all dates.
    async fn find_oldest_queued(&self) -> TaskRepositoryResult<Option<Task>>;

    /// Atomically moves a task from queued to running.
    ///
    /// Applies only when the task is still queued at `expected`, and no task
    /// is running at the moment of the write. On success the version becomes
    /// `expected.next()` and `started_at` is stamped.
    async fn try_claim(
        &self,
        id: TaskId,
        expected: TaskVersion,
        started_at: DateTime<Utc>,
    ) -> TaskRepositoryResult<bool>;

    /// Atomically returns a running task at `expected` to the queue, clearing
    /// `started_at`.
    async fn try_requeue(&self, id: TaskId, expected: TaskVersion) -> TaskRepositoryResult<bool>;

    /// Overwrites the payload with a checkpoint.
    ///
    /// This is an unversioned write used only by the running worker.
    async fn save_checkpoint(&self, id: TaskId, checkpoint: &Value) -> TaskRepositoryResult<()>;

    /// Marks a running task as succeeded, inserting the article if present.
    async fn complete(&self, completion: &TaskCompletion) -> TaskRepositoryResult<bool>;

    /// Marks a running task as failed, keeping its payload.
    async fn fail(&self, failure: &TaskFailure) -> TaskRepositoryResult<bool>;

    /// Atomically cancels a queued task at `expected`.
    async fn try_cancel(
        &self,
        id: TaskId,
        expected: TaskVersion,
        finished_at: DateTime<Utc>,
    ) -> TaskRepositoryResult<bool>;

    /// Atomically returns a failed task at `expected` to the queue, clearing
    /// timestamps and error fields but keeping the payload.
    async fn try_reset_failed(&self, id: TaskId, expected: TaskVersion)
    -> TaskRepositoryResult<bool>;

    /// Returns articles generated by a task.
    async fn find_articles_by_task(&self, id: TaskId) -> TaskRepositoryResult<Vec<Article>>;
}

/// Errors returned by task repository implementations.
#[derive(Debug, Clone, Error)]
pub enum TaskRepositoryError {
    /// A task with the same identifier already exists.
    #[error("duplicate task identifier: {0}")]
    DuplicateTask(TaskId),

    /// The task was not found.
    #[error("task not found: {0}")]
    NotFound(TaskId),

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl TaskRepositoryError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
