//! Claiming the oldest queued task under global serialization.

use super::queue::{TaskQueueResult, TaskQueueService};
use crate::task::{
    domain::{Task, TaskId, TaskStatus, TaskVersion},
    ports::{CatalogRepository, GenerationClient, TaskRepository},
};
use mockable::Clock;
use tracing::{debug, info, warn};

impl<R, K, G, C> TaskQueueService<R, K, G, C>
where
    R: TaskRepository,
    K: CatalogRepository,
    G: GenerationClient,
    C: Clock + Send + Sync,
{
    /// Claims the oldest queued task across all dates.
    ///
    /// Returns `None` when a task is already running, when nothing is
    /// queued, or when another caller won the race. The transition itself is
    /// a single conditional write that also requires the running count to be
    /// zero at the moment it applies.
    ///
    /// # Errors
    ///
    /// Returns [`super::TaskQueueError::Repository`] when persistence fails.
    pub async fn claim_task(&self) -> TaskQueueResult<Option<Task>> {
        for attempt in 1..=self.config.max_claim_attempts {
            if self.tasks.count_running().await? > 0 {
                return Ok(None);
            }
            let Some(candidate) = self.tasks.find_oldest_queued().await? else {
                return Ok(None);
            };

            let expected = candidate.version();
            let applied = self
                .tasks
                .try_claim(candidate.id(), expected, self.clock.utc())
                .await?;
            if applied && let Some(claimed) = self.confirm_claim(candidate.id(), expected).await? {
                info!(
                    task_id = %claimed.id(),
                    task_date = %claimed.task_date(),
                    profile_id = %claimed.profile_id(),
                    "task claimed"
                );
                return Ok(Some(claimed));
            }

            if self.tasks.count_running().await? > 0 {
                debug!(task_id = %candidate.id(), "claim lost to a concurrent caller");
                return Ok(None);
            }
            debug!(
                task_id = %candidate.id(),
                attempt,
                "claim candidate changed before the write, retrying"
            );
        }

        warn!(
            attempts = self.config.max_claim_attempts,
            "giving up claim after repeated lost races"
        );
        Ok(None)
    }

    /// Re-reads a claimed row and returns it only when this caller's write is
    /// the one that made it running.
    async fn confirm_claim(
        &self,
        task_id: TaskId,
        expected: TaskVersion,
    ) -> TaskQueueResult<Option<Task>> {
        Ok(self.tasks.find_by_id(task_id).await?.filter(|task| {
            task.status() == TaskStatus::Running && task.version() == expected.next()
        }))
    }
}
