//! In-memory task repository.
//!
//! Every conditional write runs under one write lock, which gives it the same
//! all-or-nothing behaviour as a single SQL statement.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::task::{
    domain::{Article, BusinessDate, ProfileId, Task, TaskId, TaskStatus, TaskVersion},
    ports::{
        TaskCompletion, TaskFailure, TaskRepository, TaskRepositoryError, TaskRepositoryResult,
    },
};

/// Thread-safe in-memory task repository.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTaskRepository {
    state: Arc<RwLock<InMemoryTaskState>>,
}

#[derive(Debug, Default)]
struct InMemoryTaskState {
    tasks: HashMap<TaskId, Task>,
    insertion_order: Vec<TaskId>,
    articles: Vec<Article>,
}

impl InMemoryTaskState {
    fn ordered(&self) -> impl Iterator<Item = &Task> {
        self.insertion_order
            .iter()
            .filter_map(|id| self.tasks.get(id))
    }

    fn running_count(&self) -> usize {
        self.tasks
            .values()
            .filter(|task| task.status() == TaskStatus::Running)
            .count()
    }

    /// Returns the task when it is in `status` at `expected`.
    fn matching_mut(
        &mut self,
        id: TaskId,
        status: TaskStatus,
        expected: Option<TaskVersion>,
    ) -> Option<&mut Task> {
        self.tasks.get_mut(&id).filter(|task| {
            task.status() == status && expected.is_none_or(|version| task.version() == version)
        })
    }
}

impl InMemoryTaskRepository {
    /// Creates an empty in-memory repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces a stored task wholesale.
    ///
    /// Test helper for arranging states the queue never produces itself,
    /// such as a task left running by a crashed process.
    ///
    /// # Errors
    ///
    /// Returns [`TaskRepositoryError::NotFound`] when the task does not exist.
    pub fn overwrite(&self, task: Task) -> TaskRepositoryResult<()> {
        let mut state = self.write()?;
        let slot = state
            .tasks
            .get_mut(&task.id())
            .ok_or(TaskRepositoryError::NotFound(task.id()))?;
        *slot = task;
        Ok(())
    }

    fn read(&self) -> TaskRepositoryResult<RwLockReadGuard<'_, InMemoryTaskState>> {
        self.state.read().map_err(|err| {
            TaskRepositoryError::persistence(std::io::Error::other(err.to_string()))
        })
    }

    fn write(&self) -> TaskRepositoryResult<RwLockWriteGuard<'_, InMemoryTaskState>> {
        self.state.write().map_err(|err| {
            TaskRepositoryError::persistence(std::io::Error::other(err.to_string()))
        })
    }
}

/// Applies a domain transition, reporting a rejected transition as "not
/// applied" rather than as an error.
fn apply<F>(task: Option<&mut Task>, transition: F) -> bool
where
    F: FnOnce(&mut Task) -> Result<(), crate::task::domain::TaskDomainError>,
{
    task.is_some_and(|found| transition(found).is_ok())
}

#[async_trait]
impl TaskRepository for InMemoryTaskRepository {
    async fn insert(&self, task: &Task) -> TaskRepositoryResult<()> {
        let mut state = self.write()?;
        if state.tasks.contains_key(&task.id()) {
            return Err(TaskRepositoryError::DuplicateTask(task.id()));
        }
        state.insertion_order.push(task.id());
        state.tasks.insert(task.id(), task.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: TaskId) -> TaskRepositoryResult<Option<Task>> {
        Ok(self.read()?.tasks.get(&id).cloned())
    }

    async fn find_by_date(&self, task_date: BusinessDate) -> TaskRepositoryResult<Vec<Task>> {
        let state = self.read()?;
        let mut tasks: Vec<Task> = state
            .ordered()
            .filter(|task| task.task_date() == task_date)
            .cloned()
            .collect();
        tasks.sort_by_key(Task::created_at);
        Ok(tasks)
    }

    async fn exists_for_profile_on(
        &self,
        task_date: BusinessDate,
        profile_id: ProfileId,
    ) -> TaskRepositoryResult<bool> {
        let state = self.read()?;
        Ok(state
            .tasks
            .values()
            .any(|task| task.task_date() == task_date && task.profile_id() == profile_id))
    }

    async fn count_running(&self) -> TaskRepositoryResult<u64> {
        let count = self.read()?.running_count();
        u64::try_from(count).map_err(TaskRepositoryError::persistence)
    }

    async fn find_running(&self) -> TaskRepositoryResult<Vec<Task>> {
        let state = self.read()?;
        Ok(state
            .ordered()
            .filter(|task| task.status() == TaskStatus::Running)
            .cloned()
            .collect())
    }

    async fn find_oldest_queued(&self) -> TaskRepositoryResult<Option<Task>> {
        let state = self.read()?;
        Ok(state
            .ordered()
            .filter(|task| task.status() == TaskStatus::Queued)
            .min_by_key(|task| task.created_at())
            .cloned())
    }

    async fn try_claim(
        &self,
        id: TaskId,
        expected: TaskVersion,
        started_at: DateTime<Utc>,
    ) -> TaskRepositoryResult<bool> {
        let mut state = self.write()?;
        if state.running_count() > 0 {
            return Ok(false);
        }
        let candidate = state.matching_mut(id, TaskStatus::Queued, Some(expected));
        Ok(apply(candidate, |task| task.claim(started_at)))
    }

    async fn try_requeue(&self, id: TaskId, expected: TaskVersion) -> TaskRepositoryResult<bool> {
        let mut state = self.write()?;
        let candidate = state.matching_mut(id, TaskStatus::Running, Some(expected));
        Ok(apply(candidate, Task::requeue))
    }

    async fn save_checkpoint(&self, id: TaskId, checkpoint: &Value) -> TaskRepositoryResult<()> {
        let mut state = self.write()?;
        let task = state
            .tasks
            .get_mut(&id)
            .ok_or(TaskRepositoryError::NotFound(id))?;
        task.record_checkpoint(checkpoint.clone());
        Ok(())
    }

    async fn complete(&self, completion: &TaskCompletion) -> TaskRepositoryResult<bool> {
        let mut state = self.write()?;
        let published_at = completion.article.as_ref().map(Article::published_at);
        let candidate = state.matching_mut(completion.task_id, TaskStatus::Running, None);
        let applied = apply(candidate, |task| {
            task.succeed(
                completion.result.clone(),
                completion.finished_at,
                published_at,
            )
        });
        if applied && let Some(article) = &completion.article {
            state.articles.push(article.clone());
        }
        Ok(applied)
    }

    async fn fail(&self, failure: &TaskFailure) -> TaskRepositoryResult<bool> {
        let mut state = self.write()?;
        let candidate = state.matching_mut(failure.task_id, TaskStatus::Running, None);
        Ok(apply(candidate, |task| {
            task.fail(
                failure.message.clone(),
                failure.context.clone(),
                failure.finished_at,
            )
        }))
    }

    async fn try_cancel(
        &self,
        id: TaskId,
        expected: TaskVersion,
        finished_at: DateTime<Utc>,
    ) -> TaskRepositoryResult<bool> {
        let mut state = self.write()?;
        let candidate = state.matching_mut(id, TaskStatus::Queued, Some(expected));
        Ok(apply(candidate, |task| task.cancel(finished_at)))
    }

    async fn try_reset_failed(
        &self,
        id: TaskId,
        expected: TaskVersion,
    ) -> TaskRepositoryResult<bool> {
        let mut state = self.write()?;
        let candidate = state.matching_mut(id, TaskStatus::Failed, Some(expected));
        Ok(apply(candidate, Task::reset_for_retry))
    }

    async fn find_articles_by_task(&self, id: TaskId) -> TaskRepositoryResult<Vec<Article>> {
        let state = self.read()?;
        Ok(state
            .articles
            .iter()
            .filter(|article| article.task_id() == id)
            .cloned()
            .collect())
    }
}
