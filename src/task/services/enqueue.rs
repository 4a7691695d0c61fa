//! Enqueue with per-trigger duplicate policy.

use super::queue::{EnqueuedTask, TaskQueueError, TaskQueueResult, TaskQueueService};
use crate::task::{
    domain::{BusinessDate, Profile, Task, TriggerSource},
    ports::{CatalogRepository, GenerationClient, TaskRepository},
};
use mockable::Clock;
use tracing::{debug, info};

impl<R, K, G, C> TaskQueueService<R, K, G, C>
where
    R: TaskRepository,
    K: CatalogRepository,
    G: GenerationClient,
    C: Clock + Send + Sync,
{
    /// Creates one queued task per profile for `task_date`.
    ///
    /// Cron triggers skip any profile that already has a task for the date,
    /// whatever its status. Manual triggers always create a task. When no
    /// profile exists a default one is created first.
    ///
    /// Each profile's check and insert are independent statements, so two
    /// cron triggers racing within the same instant may both insert. Global
    /// serialization still runs those tasks one after another.
    ///
    /// # Errors
    ///
    /// Returns [`TaskQueueError::WordSupplyMissing`] without creating
    /// anything when the date has no word supply, or a persistence error.
    pub async fn enqueue(
        &self,
        task_date: BusinessDate,
        trigger_source: TriggerSource,
    ) -> TaskQueueResult<Vec<EnqueuedTask>> {
        if self.catalog.find_word_supply(task_date).await?.is_none() {
            return Err(TaskQueueError::WordSupplyMissing(task_date));
        }

        let profiles = self.profiles_or_default().await?;
        let mut created = Vec::with_capacity(profiles.len());
        for profile in profiles {
            if trigger_source == TriggerSource::Cron
                && self
                    .tasks
                    .exists_for_profile_on(task_date, profile.id())
                    .await?
            {
                debug!(
                    task_date = %task_date,
                    profile_id = %profile.id(),
                    "cron task already exists for profile, skipping"
                );
                continue;
            }

            let task = Task::new_queued(task_date, profile.id(), trigger_source, self.clock.utc());
            self.tasks.insert(&task).await?;
            info!(
                task_id = %task.id(),
                task_date = %task_date,
                profile_id = %profile.id(),
                trigger = %trigger_source,
                "task enqueued"
            );
            created.push(EnqueuedTask {
                task_id: task.id(),
                profile_id: profile.id(),
                profile_name: profile.name().clone(),
            });
        }
        Ok(created)
    }

    /// Returns all profiles, bootstrapping the default one when none exist.
    async fn profiles_or_default(&self) -> TaskQueueResult<Vec<Profile>> {
        let existing = self.catalog.list_profiles().await?;
        if !existing.is_empty() {
            return Ok(existing);
        }
        let bootstrap = Profile::default_profile(&*self.clock);
        if self.catalog.insert_profile_if_absent(&bootstrap).await? {
            info!(profile_id = %bootstrap.id(), "created default profile");
        }
        Ok(self.catalog.list_profiles().await?)
    }
}
