//! Task aggregate root and related lifecycle types.

use super::{
    BusinessDate, ParseTaskStatusError, ParseTaskTypeError, ParseTriggerSourceError, ProfileId,
    TaskDomainError, TaskId, TaskVersion,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Task lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Waiting to be claimed.
    Queued,
    /// Claimed and executing. At most one task is running at a time.
    Running,
    /// Finished and produced an article.
    Succeeded,
    /// Finished with a recorded error.
    Failed,
    /// Withdrawn before it was claimed.
    Canceled,
}

impl TaskStatus {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
        }
    }

    /// Returns whether the queue may move a task from `self` to `target`.
    ///
    /// `failed -> queued` is only used by the administrative retry.
    #[must_use]
    pub const fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Queued, Self::Running | Self::Canceled)
                | (Self::Running, Self::Succeeded | Self::Failed | Self::Queued)
                | (Self::Failed, Self::Queued)
        )
    }

    /// Returns whether the queue itself never moves a task out of this status.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Canceled)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for TaskStatus {
    type Error = ParseTaskStatusError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "queued" => Ok(Self::Queued),
            "running" => Ok(Self::Running),
            "succeeded" => Ok(Self::Succeeded),
            "failed" => Ok(Self::Failed),
            "canceled" => Ok(Self::Canceled),
            _ => Err(ParseTaskStatusError(value.to_owned())),
        }
    }
}

/// Kind of work a task performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    /// Generate and publish the daily article for a profile.
    ArticleGeneration,
}

impl TaskType {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ArticleGeneration => "article_generation",
        }
    }
}

impl TryFrom<&str> for TaskType {
    type Error = ParseTaskTypeError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim() {
            "article_generation" => Ok(Self::ArticleGeneration),
            _ => Err(ParseTaskTypeError(value.to_owned())),
        }
    }
}

/// Origin of an enqueue call, which decides the duplicate-submission policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerSource {
    /// Operator request; always creates new tasks.
    Manual,
    /// Scheduled run; at most one task per profile and business date.
    Cron,
}

impl TriggerSource {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Cron => "cron",
        }
    }
}

impl fmt::Display for TriggerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for TriggerSource {
    type Error = ParseTriggerSourceError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "manual" => Ok(Self::Manual),
            "cron" => Ok(Self::Cron),
            _ => Err(ParseTriggerSourceError(value.to_owned())),
        }
    }
}

/// Task aggregate root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    id: TaskId,
    task_date: BusinessDate,
    task_type: TaskType,
    trigger_source: TriggerSource,
    profile_id: ProfileId,
    status: TaskStatus,
    version: TaskVersion,
    result_json: Option<Value>,
    error_message: Option<String>,
    error_context: Option<Value>,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    published_at: Option<DateTime<Utc>>,
}

/// Parameter object for reconstructing a persisted task aggregate.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedTaskData {
    /// Persisted task identifier.
    pub id: TaskId,
    /// Persisted business date.
    pub task_date: BusinessDate,
    /// Persisted task kind.
    pub task_type: TaskType,
    /// Persisted trigger source.
    pub trigger_source: TriggerSource,
    /// Persisted owning profile.
    pub profile_id: ProfileId,
    /// Persisted lifecycle status.
    pub status: TaskStatus,
    /// Persisted optimistic-concurrency token.
    pub version: TaskVersion,
    /// Persisted checkpoint or result payload.
    pub result_json: Option<Value>,
    /// Persisted failure message.
    pub error_message: Option<String>,
    /// Persisted failure context.
    pub error_context: Option<Value>,
    /// Persisted creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Persisted claim timestamp.
    pub started_at: Option<DateTime<Utc>>,
    /// Persisted completion timestamp.
    pub finished_at: Option<DateTime<Utc>>,
    /// Persisted publication timestamp.
    pub published_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Creates a queued article generation task.
    #[must_use]
    pub fn new_queued(
        task_date: BusinessDate,
        profile_id: ProfileId,
        trigger_source: TriggerSource,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: TaskId::new(),
            task_date,
            task_type: TaskType::ArticleGeneration,
            trigger_source,
            profile_id,
            status: TaskStatus::Queued,
            version: TaskVersion::INITIAL,
            result_json: None,
            error_message: None,
            error_context: None,
            created_at,
            started_at: None,
            finished_at: None,
            published_at: None,
        }
    }

    /// Reconstructs a task from persisted storage.
    #[must_use]
    pub fn from_persisted(data: PersistedTaskData) -> Self {
        Self {
            id: data.id,
            task_date: data.task_date,
            task_type: data.task_type,
            trigger_source: data.trigger_source,
            profile_id: data.profile_id,
            status: data.status,
            version: data.version,
            result_json: data.result_json,
            error_message: data.error_message,
            error_context: data.error_context,
            created_at: data.created_at,
            started_at: data.started_at,
            finished_at: data.finished_at,
            published_at: data.published_at,
        }
    }

    /// Returns the task identifier.
    #[must_use]
    pub const fn id(&self) -> TaskId {
        self.id
    }

    /// Returns the business date.
    #[must_use]
    pub const fn task_date(&self) -> BusinessDate {
        self.task_date
    }

    /// Returns the task kind.
    #[must_use]
    pub const fn task_type(&self) -> TaskType {
        self.task_type
    }

    /// Returns the trigger source.
    #[must_use]
    pub const fn trigger_source(&self) -> TriggerSource {
        self.trigger_source
    }

    /// Returns the owning profile.
    #[must_use]
    pub const fn profile_id(&self) -> ProfileId {
        self.profile_id
    }

    /// Returns the lifecycle status.
    #[must_use]
    pub const fn status(&self) -> TaskStatus {
        self.status
    }

    /// Returns the optimistic-concurrency token.
    #[must_use]
    pub const fn version(&self) -> TaskVersion {
        self.version
    }

    /// Returns the checkpoint or result payload, if any.
    #[must_use]
    pub const fn result_json(&self) -> Option<&Value> {
        self.result_json.as_ref()
    }

    /// Returns the failure message, if any.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// Returns the failure context, if any.
    #[must_use]
    pub const fn error_context(&self) -> Option<&Value> {
        self.error_context.as_ref()
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the claim timestamp, if running or finished.
    #[must_use]
    pub const fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// Returns the completion timestamp, if finished.
    #[must_use]
    pub const fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    /// Returns the publication timestamp, if an article was published.
    #[must_use]
    pub const fn published_at(&self) -> Option<DateTime<Utc>> {
        self.published_at
    }

    /// Returns whether the task has been running since before `cutoff`.
    ///
    /// A running task without a claim timestamp is treated as stuck.
    #[must_use]
    pub fn is_stuck(&self, cutoff: DateTime<Utc>) -> bool {
        self.status == TaskStatus::Running && self.started_at.is_none_or(|at| at < cutoff)
    }

    /// Moves a queued task to running.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidStateTransition`] unless the task is
    /// queued.
    pub fn claim(&mut self, started_at: DateTime<Utc>) -> Result<(), TaskDomainError> {
        self.ensure_transition(TaskStatus::Running)?;
        self.status = TaskStatus::Running;
        self.started_at = Some(started_at);
        self.bump_version();
        Ok(())
    }

    /// Returns a stuck running task to the queue.
    ///
    /// The payload is kept so the next claim can resume from a checkpoint.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidStateTransition`] unless the task is
    /// running.
    pub fn requeue(&mut self) -> Result<(), TaskDomainError> {
        if self.status != TaskStatus::Running {
            return Err(self.transition_error(TaskStatus::Queued));
        }
        self.status = TaskStatus::Queued;
        self.started_at = None;
        self.bump_version();
        Ok(())
    }

    /// Records a checkpoint without touching status or version.
    pub fn record_checkpoint(&mut self, checkpoint: Value) {
        self.result_json = Some(checkpoint);
    }

    /// Marks a running task as succeeded, replacing any checkpoint.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidStateTransition`] unless the task is
    /// running.
    pub fn succeed(
        &mut self,
        result: Value,
        finished_at: DateTime<Utc>,
        published_at: Option<DateTime<Utc>>,
    ) -> Result<(), TaskDomainError> {
        self.ensure_transition(TaskStatus::Succeeded)?;
        self.status = TaskStatus::Succeeded;
        self.result_json = Some(result);
        self.finished_at = Some(finished_at);
        self.published_at = published_at;
        self.bump_version();
        Ok(())
    }

    /// Marks a running task as failed.
    ///
    /// Any checkpoint already stored in the payload is preserved.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidStateTransition`] unless the task is
    /// running.
    pub fn fail(
        &mut self,
        message: impl Into<String>,
        context: Value,
        finished_at: DateTime<Utc>,
    ) -> Result<(), TaskDomainError> {
        self.ensure_transition(TaskStatus::Failed)?;
        self.status = TaskStatus::Failed;
        self.error_message = Some(message.into());
        self.error_context = Some(context);
        self.finished_at = Some(finished_at);
        self.bump_version();
        Ok(())
    }

    /// Cancels a queued task.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidStateTransition`] unless the task is
    /// queued.
    pub fn cancel(&mut self, finished_at: DateTime<Utc>) -> Result<(), TaskDomainError> {
        self.ensure_transition(TaskStatus::Canceled)?;
        self.status = TaskStatus::Canceled;
        self.finished_at = Some(finished_at);
        self.bump_version();
        Ok(())
    }

    /// Returns a failed task to the queue for another attempt.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidStateTransition`] unless the task
    /// has failed.
    pub fn reset_for_retry(&mut self) -> Result<(), TaskDomainError> {
        if self.status != TaskStatus::Failed {
            return Err(self.transition_error(TaskStatus::Queued));
        }
        self.status = TaskStatus::Queued;
        self.started_at = None;
        self.finished_at = None;
        self.error_message = None;
        self.error_context = None;
        self.bump_version();
        Ok(())
    }

    fn ensure_transition(&self, target: TaskStatus) -> Result<(), TaskDomainError> {
        if self.status.can_transition_to(target) {
            Ok(())
        } else {
            Err(self.transition_error(target))
        }
    }

    const fn transition_error(&self, target: TaskStatus) -> TaskDomainError {
        TaskDomainError::InvalidStateTransition {
            task_id: self.id,
            from: self.status,
            to: target,
        }
    }

    const fn bump_version(&mut self) {
        self.version = self.version.next();
    }
}
