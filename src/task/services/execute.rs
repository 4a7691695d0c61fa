//! Executing a claimed task: word exclusion, checkpoint resume and
//! publication.

use super::queue::{TaskQueueError, TaskQueueResult, TaskQueueService};
use crate::task::{
    domain::{Article, GenerationCheckpoint, Task, TaskId, TaskPayload, TaskResultSummary},
    ports::{
        CatalogRepository, CheckpointSink, GenerationClient, GenerationError, GenerationRequest,
        GenerationResult, GenerationSettings, TaskCompletion, TaskRepository,
    },
};
use async_trait::async_trait;
use mockable::Clock;
use std::collections::HashSet;
use tracing::{debug, info};

/// Checkpoint sink that writes straight into the running task's payload.
struct TaskCheckpointWriter<'a, R> {
    tasks: &'a R,
    task_id: TaskId,
}

#[async_trait]
impl<R: TaskRepository> CheckpointSink for TaskCheckpointWriter<'_, R> {
    async fn save(&self, checkpoint: &GenerationCheckpoint) -> GenerationResult<()> {
        let value = serde_json::to_value(checkpoint).map_err(GenerationError::checkpoint)?;
        self.tasks
            .save_checkpoint(self.task_id, &value)
            .await
            .map_err(GenerationError::checkpoint)?;
        debug!(task_id = %self.task_id, stage = %checkpoint.stage, "checkpoint saved");
        Ok(())
    }
}

impl<R, K, G, C> TaskQueueService<R, K, G, C>
where
    R: TaskRepository,
    K: CatalogRepository,
    G: GenerationClient,
    C: Clock + Send + Sync,
{
    /// Generates and publishes the article for a task this caller has
    /// claimed.
    ///
    /// Words already selected by other tasks of the same date are excluded.
    /// A checkpoint left in the payload by an interrupted run is handed back
    /// to the generation client as the resume point, and every new
    /// checkpoint is persisted before the pipeline moves on.
    ///
    /// # Errors
    ///
    /// Returns [`TaskQueueError::ProfileNotFound`],
    /// [`TaskQueueError::WordSupplyMissing`],
    /// [`TaskQueueError::EmptyWordSupply`] or
    /// [`TaskQueueError::AllWordsUsed`] when a precondition does not hold,
    /// [`TaskQueueError::Generation`] when the client fails, and
    /// [`TaskQueueError::NotRunning`] when the task was taken away before
    /// the result could be written.
    pub async fn execute_task(
        &self,
        task: &Task,
        settings: &GenerationSettings,
    ) -> TaskQueueResult<Article> {
        let task_date = task.task_date();
        let profile = self
            .catalog
            .find_profile(task.profile_id())
            .await?
            .ok_or(TaskQueueError::ProfileNotFound(task.profile_id()))?;
        let supply = self
            .catalog
            .find_word_supply(task_date)
            .await?
            .ok_or(TaskQueueError::WordSupplyMissing(task_date))?;
        if supply.is_empty() {
            return Err(TaskQueueError::EmptyWordSupply(task_date));
        }

        let used = self.words_used_by_siblings(task).await?;
        let candidate_words = supply.candidate_words(&used);
        if candidate_words.is_empty() {
            return Err(TaskQueueError::AllWordsUsed(task_date));
        }
        let candidate_count = candidate_words.len();

        let resume_from = task
            .result_json()
            .cloned()
            .and_then(|payload| TaskPayload::from_value(payload).into_checkpoint());
        let resumed_from_stage = resume_from.as_ref().map(|checkpoint| checkpoint.stage.clone());
        debug!(
            task_id = %task.id(),
            candidate_count,
            excluded = used.len(),
            resume_stage = resumed_from_stage.as_deref().unwrap_or("none"),
            "starting generation"
        );

        let request = GenerationRequest {
            settings: settings.clone(),
            task_date,
            topic_preference: profile.topic_preference().to_owned(),
            candidate_words,
            resume_from,
        };
        let sink = TaskCheckpointWriter {
            tasks: &*self.tasks,
            task_id: task.id(),
        };
        let generated = self.generator.generate(request, &sink).await?;

        let published_at = self.clock.utc();
        let article = Article::publish(task, generated.draft, published_at);
        let summary = TaskResultSummary {
            article_id: article.id(),
            title: article.title().to_owned(),
            selected_words: article.selected_words().to_vec(),
            candidate_count,
            selected_count: article.selected_words().len(),
            model: settings.model.clone(),
            resumed_from_stage,
            metadata: generated.metadata,
        };
        let completion = TaskCompletion {
            task_id: task.id(),
            result: serde_json::to_value(&summary)?,
            article: Some(article.clone()),
            finished_at: published_at,
        };
        if !self.tasks.complete(&completion).await? {
            return Err(self.rejected_terminal_write(task.id()).await);
        }

        info!(
            task_id = %task.id(),
            article_id = %article.id(),
            selected = article.selected_words().len(),
            "article published"
        );
        Ok(article)
    }

    /// Collects the words selected by every other task of the same date.
    async fn words_used_by_siblings(&self, task: &Task) -> TaskQueueResult<HashSet<String>> {
        let siblings = self.tasks.find_by_date(task.task_date()).await?;
        Ok(siblings
            .into_iter()
            .filter(|sibling| sibling.id() != task.id())
            .filter_map(|sibling| sibling.result_json().cloned())
            .flat_map(|payload| TaskPayload::from_value(payload).selected_words())
            .collect())
    }
}
