//! Task queue service: construction, errors and the terminal and
//! administrative operations.

use crate::task::{
    domain::{
        Article, BusinessDate, ProfileId, ProfileName, Task, TaskDomainError, TaskId, TaskStatus,
    },
    ports::{
        CatalogRepository, CatalogRepositoryError, GenerationClient, GenerationError,
        TaskCompletion, TaskFailure, TaskRepository, TaskRepositoryError,
    },
};
use chrono::{FixedOffset, TimeDelta};
use mockable::Clock;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Tunables for claiming and stuck-task recovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueConfig {
    /// Age after which a running task is treated as crashed.
    pub stuck_threshold: TimeDelta,
    /// Upper bound on claim retries after lost races on the same candidate.
    pub max_claim_attempts: u32,
}

impl QueueConfig {
    /// Default stuck threshold in seconds.
    pub const DEFAULT_STUCK_THRESHOLD_SECS: i64 = 300;

    /// Default claim retry bound.
    pub const DEFAULT_MAX_CLAIM_ATTEMPTS: u32 = 8;
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            stuck_threshold: TimeDelta::seconds(Self::DEFAULT_STUCK_THRESHOLD_SECS),
            max_claim_attempts: Self::DEFAULT_MAX_CLAIM_ATTEMPTS,
        }
    }
}

/// Descriptor of a task created by [`TaskQueueService::enqueue`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnqueuedTask {
    /// Newly created task.
    pub task_id: TaskId,
    /// Profile the task generates for.
    pub profile_id: ProfileId,
    /// Name of that profile.
    pub profile_name: ProfileName,
}

/// Service-level errors for task queue operations.
#[derive(Debug, Error)]
pub enum TaskQueueError {
    /// Domain validation failed.
    #[error(transparent)]
    Domain(#[from] TaskDomainError),

    /// Task persistence failed.
    #[error(transparent)]
    Repository(#[from] TaskRepositoryError),

    /// Profile or word supply lookup failed.
    #[error(transparent)]
    Catalog(#[from] CatalogRepositoryError),

    /// The generation client failed.
    #[error(transparent)]
    Generation(#[from] GenerationError),

    /// A payload could not be encoded.
    #[error("payload serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// No word supply exists for the business date.
    #[error("no word supply for {0}")]
    WordSupplyMissing(BusinessDate),

    /// The word supply for the business date has no words.
    #[error("word supply for {0} is empty")]
    EmptyWordSupply(BusinessDate),

    /// Every candidate word is already taken by a sibling task.
    #[error("all words used today ({0})")]
    AllWordsUsed(BusinessDate),

    /// The task's profile no longer exists.
    #[error("profile not found: {0}")]
    ProfileNotFound(ProfileId),

    /// The task does not exist.
    #[error("task not found: {0}")]
    NotFound(TaskId),

    /// The task is not running, so it cannot be completed or failed.
    #[error("task {task_id} is {status}, not running")]
    NotRunning {
        /// Task whose terminal write was rejected.
        task_id: TaskId,
        /// Status observed after the rejection.
        status: TaskStatus,
    },

    /// The task changed between read and conditional write.
    #[error("task {0} was modified concurrently")]
    Conflict(TaskId),
}

/// Result type for task queue operations.
pub type TaskQueueResult<T> = Result<T, TaskQueueError>;

/// Article generation task queue.
///
/// Holds every collaborator behind an [`Arc`] so one instance can be shared
/// by the scheduled drivers.
pub struct TaskQueueService<R, K, G, C>
where
    R: TaskRepository,
    K: CatalogRepository,
    G: GenerationClient,
    C: Clock + Send + Sync,
{
    pub(super) tasks: Arc<R>,
    pub(super) catalog: Arc<K>,
    pub(super) generator: Arc<G>,
    pub(super) clock: Arc<C>,
    pub(super) config: QueueConfig,
}

impl<R, K, G, C> TaskQueueService<R, K, G, C>
where
    R: TaskRepository,
    K: CatalogRepository,
    G: GenerationClient,
    C: Clock + Send + Sync,
{
    /// Creates a queue service with default tunables.
    #[must_use]
    pub fn new(tasks: Arc<R>, catalog: Arc<K>, generator: Arc<G>, clock: Arc<C>) -> Self {
        Self {
            tasks,
            catalog,
            generator,
            clock,
            config: QueueConfig::default(),
        }
    }

    /// Replaces the tunables.
    #[must_use]
    pub const fn with_config(mut self, config: QueueConfig) -> Self {
        self.config = config;
        self
    }

    /// Returns the active tunables.
    #[must_use]
    pub const fn config(&self) -> QueueConfig {
        self.config
    }

    /// Returns today's business date in the given fixed timezone.
    #[must_use]
    pub fn business_date(&self, offset: FixedOffset) -> BusinessDate {
        BusinessDate::at(self.clock.utc(), offset)
    }

    /// Marks a running task as succeeded with a caller-supplied result.
    ///
    /// No article is written; [`Self::execute_task`] is the path that
    /// publishes one.
    ///
    /// # Errors
    ///
    /// Returns [`TaskQueueError::NotFound`] or [`TaskQueueError::NotRunning`]
    /// when the conditional write does not apply, or
    /// [`TaskQueueError::Repository`] when persistence fails.
    pub async fn complete(&self, task_id: TaskId, result: Value) -> TaskQueueResult<()> {
        let completion = TaskCompletion {
            task_id,
            result,
            article: None,
            finished_at: self.clock.utc(),
        };
        if !self.tasks.complete(&completion).await? {
            return Err(self.rejected_terminal_write(task_id).await);
        }
        info!(task_id = %task_id, "task completed");
        Ok(())
    }

    /// Marks a running task as failed.
    ///
    /// A checkpoint already stored in `result_json` is kept, so an
    /// administrative retry resumes from it.
    ///
    /// # Errors
    ///
    /// Returns [`TaskQueueError::NotFound`] or [`TaskQueueError::NotRunning`]
    /// when the conditional write does not apply, or
    /// [`TaskQueueError::Repository`] when persistence fails.
    pub async fn fail(
        &self,
        task_id: TaskId,
        message: impl Into<String> + Send,
        context: Value,
    ) -> TaskQueueResult<()> {
        let failure = TaskFailure {
            task_id,
            message: message.into(),
            context,
            finished_at: self.clock.utc(),
        };
        if !self.tasks.fail(&failure).await? {
            return Err(self.rejected_terminal_write(task_id).await);
        }
        info!(task_id = %task_id, error = %failure.message, "task failed");
        Ok(())
    }

    /// Cancels a queued task so it is never claimed.
    ///
    /// # Errors
    ///
    /// Returns [`TaskQueueError::NotFound`] for unknown tasks,
    /// [`TaskQueueError::Domain`] when the task is not queued, or
    /// [`TaskQueueError::Conflict`] when it changed before the write applied.
    pub async fn cancel(&self, task_id: TaskId) -> TaskQueueResult<Task> {
        let current = self.require_task(task_id).await?;
        let now = self.clock.utc();
        let mut canceled = current.clone();
        canceled.cancel(now)?;
        if !self
            .tasks
            .try_cancel(task_id, current.version(), now)
            .await?
        {
            return Err(TaskQueueError::Conflict(task_id));
        }
        info!(task_id = %task_id, "task canceled");
        Ok(canceled)
    }

    /// Returns a failed task to the queue.
    ///
    /// The payload is kept, so a checkpoint written before the failure is
    /// resumed by the next execution.
    ///
    /// # Errors
    ///
    /// Returns [`TaskQueueError::NotFound`] for unknown tasks,
    /// [`TaskQueueError::Domain`] when the task has not failed, or
    /// [`TaskQueueError::Conflict`] when it changed before the write applied.
    pub async fn retry(&self, task_id: TaskId) -> TaskQueueResult<Task> {
        let current = self.require_task(task_id).await?;
        let mut requeued = current.clone();
        requeued.reset_for_retry()?;
        if !self
            .tasks
            .try_reset_failed(task_id, current.version())
            .await?
        {
            return Err(TaskQueueError::Conflict(task_id));
        }
        info!(task_id = %task_id, "failed task requeued for retry");
        Ok(requeued)
    }

    /// Finds a task by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`TaskQueueError::Repository`] when the lookup fails.
    pub async fn find_task(&self, task_id: TaskId) -> TaskQueueResult<Option<Task>> {
        Ok(self.tasks.find_by_id(task_id).await?)
    }

    /// Returns every task for a business date, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`TaskQueueError::Repository`] when the lookup fails.
    pub async fn tasks_for_date(&self, task_date: BusinessDate) -> TaskQueueResult<Vec<Task>> {
        Ok(self.tasks.find_by_date(task_date).await?)
    }

    /// Returns the articles a task published.
    ///
    /// # Errors
    ///
    /// Returns [`TaskQueueError::Repository`] when the lookup fails.
    pub async fn articles_for_task(&self, task_id: TaskId) -> TaskQueueResult<Vec<Article>> {
        Ok(self.tasks.find_articles_by_task(task_id).await?)
    }

    pub(super) async fn require_task(&self, task_id: TaskId) -> TaskQueueResult<Task> {
        self.tasks
            .find_by_id(task_id)
            .await?
            .ok_or(TaskQueueError::NotFound(task_id))
    }

    /// Explains why a terminal write conditioned on `running` did not apply.
    pub(super) async fn rejected_terminal_write(&self, task_id: TaskId) -> TaskQueueError {
        match self.require_task(task_id).await {
            Ok(task) => TaskQueueError::NotRunning {
                task_id,
                status: task.status(),
            },
            Err(err) => err,
        }
    }
}
