//! Stuck-task recovery and the drain loop.

use super::queue::{TaskQueueResult, TaskQueueService};
use crate::task::{
    domain::TaskId,
    ports::{CatalogRepository, GenerationClient, GenerationSettings, TaskRepository},
};
use mockable::Clock;
use serde_json::json;
use tracing::{debug, error, info, warn};

/// Outcome of a stuck-task sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryOutcome {
    /// Tasks returned to the queue.
    pub recovered: Vec<TaskId>,
    /// Whether a running task younger than the threshold remains.
    pub busy: bool,
}

/// Summary of one drain sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Stuck tasks returned to the queue. A sweep that recovers any claims
    /// nothing.
    pub recovered: Vec<TaskId>,
    /// Tasks that published an article.
    pub succeeded: Vec<TaskId>,
    /// Tasks recorded as failed.
    pub failed: Vec<TaskId>,
    /// Whether claiming was skipped because another task was running.
    pub skipped_busy: bool,
}

impl<R, K, G, C> TaskQueueService<R, K, G, C>
where
    R: TaskRepository,
    K: CatalogRepository,
    G: GenerationClient,
    C: Clock + Send + Sync,
{
    /// Requeues running tasks whose claim is older than the stuck threshold.
    ///
    /// A running task without a claim timestamp is treated as stuck. The
    /// payload is untouched, so a requeued task resumes from its checkpoint.
    ///
    /// # Errors
    ///
    /// Returns [`super::TaskQueueError::Repository`] when persistence fails.
    pub async fn recover_stuck_tasks(&self) -> TaskQueueResult<RecoveryOutcome> {
        let cutoff = self.clock.utc() - self.config.stuck_threshold;
        let (stuck, active): (Vec<_>, Vec<_>) = self
            .tasks
            .find_running()
            .await?
            .into_iter()
            .partition(|task| task.is_stuck(cutoff));

        let mut recovered = Vec::with_capacity(stuck.len());
        for task in stuck {
            if self.tasks.try_requeue(task.id(), task.version()).await? {
                warn!(
                    task_id = %task.id(),
                    started_at = ?task.started_at(),
                    "requeued stuck task"
                );
                recovered.push(task.id());
            } else {
                debug!(task_id = %task.id(), "stuck task changed before requeue");
            }
        }

        Ok(RecoveryOutcome {
            recovered,
            busy: !active.is_empty(),
        })
    }

    /// Runs one full sweep: recover stuck tasks, then claim and execute until
    /// nothing is claimable.
    ///
    /// A sweep that requeues stuck tasks ends there; they are claimed by the
    /// next sweep.
    ///
    /// Never fails. Execution errors are recorded on the task and the loop
    /// moves on; infrastructure errors are logged and end the sweep.
    pub async fn process_queue(&self, settings: &GenerationSettings) -> DrainReport {
        let mut report = DrainReport::default();

        match self.recover_stuck_tasks().await {
            Ok(outcome) => {
                report.recovered = outcome.recovered;
                if outcome.busy {
                    info!("another task is running, skipping sweep");
                    report.skipped_busy = true;
                    return report;
                }
                if !report.recovered.is_empty() {
                    info!(
                        recovered = report.recovered.len(),
                        "requeued stuck tasks, claiming on the next sweep"
                    );
                    return report;
                }
            }
            Err(err) => {
                error!(error = %err, "stuck-task sweep failed");
                return report;
            }
        }

        loop {
            let task = match self.claim_task().await {
                Ok(Some(claimed)) => claimed,
                Ok(None) => break,
                Err(err) => {
                    error!(error = %err, "claim failed, ending sweep");
                    break;
                }
            };

            match self.execute_task(&task, settings).await {
                Ok(_) => report.succeeded.push(task.id()),
                Err(err) => {
                    warn!(task_id = %task.id(), error = %err, "task execution failed");
                    let context = json!({ "stage": "execution" });
                    if let Err(fail_err) = self.fail(task.id(), err.to_string(), context).await {
                        error!(
                            task_id = %task.id(),
                            error = %fail_err,
                            "could not record task failure, ending sweep"
                        );
                        break;
                    }
                    report.failed.push(task.id());
                }
            }
        }

        info!(
            recovered = report.recovered.len(),
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            "queue sweep finished"
        );
        report
    }
}
