//! Scheduled entry points for the task queue.
//!
//! The queue expects its caller never to start a drain while another is in
//! progress. [`QueueDriver`] provides that guard for timer-driven callers.

use crate::task::{
    domain::{BusinessDate, TriggerSource},
    ports::{CatalogRepository, GenerationClient, GenerationSettings, TaskRepository},
    services::{DrainReport, EnqueuedTask, TaskQueueResult, TaskQueueService},
};
use chrono::FixedOffset;
use mockable::Clock;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

/// Result of a daily cron run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyRun {
    /// Business date that was enqueued.
    pub task_date: BusinessDate,
    /// Tasks created by the enqueue.
    pub created: Vec<EnqueuedTask>,
    /// Drain outcome, or `None` when a drain was already running.
    pub drain: Option<DrainReport>,
}

/// Single-flight wrapper around a shared [`TaskQueueService`].
pub struct QueueDriver<R, K, G, C>
where
    R: TaskRepository,
    K: CatalogRepository,
    G: GenerationClient,
    C: Clock + Send + Sync,
{
    service: Arc<TaskQueueService<R, K, G, C>>,
    settings: GenerationSettings,
    business_offset: FixedOffset,
    draining: AtomicBool,
}

/// Clears the in-progress flag when a drain ends, including by panic.
struct DrainGuard<'a>(&'a AtomicBool);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<R, K, G, C> QueueDriver<R, K, G, C>
where
    R: TaskRepository,
    K: CatalogRepository,
    G: GenerationClient,
    C: Clock + Send + Sync,
{
    /// Creates a driver for `service`.
    #[must_use]
    pub const fn new(
        service: Arc<TaskQueueService<R, K, G, C>>,
        settings: GenerationSettings,
        business_offset: FixedOffset,
    ) -> Self {
        Self {
            service,
            settings,
            business_offset,
            draining: AtomicBool::new(false),
        }
    }

    /// Returns the wrapped service.
    #[must_use]
    pub const fn service(&self) -> &Arc<TaskQueueService<R, K, G, C>> {
        &self.service
    }

    /// Returns whether a drain is in progress.
    #[must_use]
    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::Acquire)
    }

    /// Runs one drain sweep unless another is already running.
    ///
    /// Returns `None` when the call was skipped.
    pub async fn drain(&self) -> Option<DrainReport> {
        if self
            .draining
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("drain already in progress, skipping");
            return None;
        }
        let _guard = DrainGuard(&self.draining);
        Some(self.service.process_queue(&self.settings).await)
    }

    /// Enqueues `task_date` as a cron run, then drains.
    ///
    /// # Errors
    ///
    /// Returns the enqueue error; nothing is drained in that case.
    pub async fn run_daily(&self, task_date: BusinessDate) -> TaskQueueResult<DailyRun> {
        let created = self
            .service
            .enqueue(task_date, TriggerSource::Cron)
            .await?;
        info!(task_date = %task_date, created = created.len(), "daily enqueue finished");
        let drain = self.drain().await;
        Ok(DailyRun {
            task_date,
            created,
            drain,
        })
    }

    /// Runs [`Self::run_daily`] for the current business date.
    ///
    /// # Errors
    ///
    /// Returns the enqueue error; nothing is drained in that case.
    pub async fn run_today(&self) -> TaskQueueResult<DailyRun> {
        let today = self.service.business_date(self.business_offset);
        self.run_daily(today).await
    }
}
