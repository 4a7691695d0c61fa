//! `PostgreSQL` repository implementation for task queue storage.

use super::{
    models::{ArticleRow, NewTaskRow, TaskRow},
    schema::{articles, generation_tasks},
};
use crate::task::{
    domain::{
        Article, ArticleId, ArticleStatus, BusinessDate, PersistedArticleData, PersistedTaskData,
        ProfileId, Task, TaskId, TaskStatus, TaskType, TaskVersion, TriggerSource,
    },
    ports::{
        TaskCompletion, TaskFailure, TaskRepository, TaskRepositoryError, TaskRepositoryResult,
    },
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::sql_types::{BigInt, Timestamptz, Uuid as SqlUuid};
use serde_json::Value;

/// `PostgreSQL` connection pool type used by task queue adapters.
pub type QueuePgPool = Pool<ConnectionManager<PgConnection>>;

/// Queued-to-running compare-and-swap.
///
/// The subquery re-checks the running count inside the same statement, so a
/// claim cannot apply while another claim that already applied is running.
const CLAIM_SQL: &str = concat!(
    "UPDATE generation_tasks ",
    "SET status = 'running', started_at = $1, version = version + 1 ",
    "WHERE id = $2 AND status = 'queued' AND version = $3 ",
    "AND (SELECT COUNT(*) FROM generation_tasks WHERE status = 'running') = 0",
);

/// `PostgreSQL`-backed task repository.
#[derive(Debug, Clone)]
pub struct PostgresTaskRepository {
    pool: QueuePgPool,
}

impl PostgresTaskRepository {
    /// Creates a new repository from a `PostgreSQL` connection pool.
    #[must_use]
    pub const fn new(pool: QueuePgPool) -> Self {
        Self { pool }
    }

    async fn run_blocking<F, T>(&self, f: F) -> TaskRepositoryResult<T>
    where
        F: FnOnce(&mut PgConnection) -> TaskRepositoryResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut connection = pool.get().map_err(TaskRepositoryError::persistence)?;
            f(&mut connection)
        })
        .await
        .map_err(TaskRepositoryError::persistence)?
    }
}

#[async_trait]
impl TaskRepository for PostgresTaskRepository {
    async fn insert(&self, task: &Task) -> TaskRepositoryResult<()> {
        let task_id = task.id();
        let new_row = to_new_row(task)?;
        self.run_blocking(move |connection| {
            diesel::insert_into(generation_tasks::table)
                .values(&new_row)
                .execute(connection)
                .map_err(|err| match err {
                    DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                        TaskRepositoryError::DuplicateTask(task_id)
                    }
                    _ => TaskRepositoryError::persistence(err),
                })?;
            Ok(())
        })
        .await
    }

    async fn find_by_id(&self, id: TaskId) -> TaskRepositoryResult<Option<Task>> {
        self.run_blocking(move |connection| {
            let row = generation_tasks::table
                .filter(generation_tasks::id.eq(id.into_inner()))
                .select(TaskRow::as_select())
                .first::<TaskRow>(connection)
                .optional()
                .map_err(TaskRepositoryError::persistence)?;
            row.map(row_to_task).transpose()
        })
        .await
    }

    async fn find_by_date(&self, task_date: BusinessDate) -> TaskRepositoryResult<Vec<Task>> {
        self.run_blocking(move |connection| {
            generation_tasks::table
                .filter(generation_tasks::task_date.eq(task_date.as_naive()))
                .order((
                    generation_tasks::created_at.asc(),
                    generation_tasks::queue_position.asc(),
                ))
                .select(TaskRow::as_select())
                .load::<TaskRow>(connection)
                .map_err(TaskRepositoryError::persistence)?
                .into_iter()
                .map(row_to_task)
                .collect()
        })
        .await
    }

    async fn exists_for_profile_on(
        &self,
        task_date: BusinessDate,
        profile_id: ProfileId,
    ) -> TaskRepositoryResult<bool> {
        self.run_blocking(move |connection| {
            diesel::select(diesel::dsl::exists(
                generation_tasks::table
                    .filter(generation_tasks::task_date.eq(task_date.as_naive()))
                    .filter(generation_tasks::profile_id.eq(profile_id.into_inner())),
            ))
            .get_result::<bool>(connection)
            .map_err(TaskRepositoryError::persistence)
        })
        .await
    }

    async fn count_running(&self) -> TaskRepositoryResult<u64> {
        self.run_blocking(|connection| {
            let count = generation_tasks::table
                .filter(generation_tasks::status.eq(TaskStatus::Running.as_str()))
                .count()
                .get_result::<i64>(connection)
                .map_err(TaskRepositoryError::persistence)?;
            u64::try_from(count).map_err(TaskRepositoryError::persistence)
        })
        .await
    }

    async fn find_running(&self) -> TaskRepositoryResult<Vec<Task>> {
        self.run_blocking(|connection| {
            generation_tasks::table
                .filter(generation_tasks::status.eq(TaskStatus::Running.as_str()))
                .order(generation_tasks::queue_position.asc())
                .select(TaskRow::as_select())
                .load::<TaskRow>(connection)
                .map_err(TaskRepositoryError::persistence)?
                .into_iter()
                .map(row_to_task)
                .collect()
        })
        .await
    }

    async fn find_oldest_queued(&self) -> TaskRepositoryResult<Option<Task>> {
        self.run_blocking(|connection| {
            let row = generation_tasks::table
                .filter(generation_tasks::status.eq(TaskStatus::Queued.as_str()))
                .order((
                    generation_tasks::created_at.asc(),
                    generation_tasks::queue_position.asc(),
                ))
                .select(TaskRow::as_select())
                .first::<TaskRow>(connection)
                .optional()
                .map_err(TaskRepositoryError::persistence)?;
            row.map(row_to_task).transpose()
        })
        .await
    }

    async fn try_claim(
        &self,
        id: TaskId,
        expected: TaskVersion,
        started_at: DateTime<Utc>,
    ) -> TaskRepositoryResult<bool> {
        let expected_version = version_to_db(expected)?;
        self.run_blocking(move |connection| {
            let result = diesel::sql_query(CLAIM_SQL)
                .bind::<Timestamptz, _>(started_at)
                .bind::<SqlUuid, _>(id.into_inner())
                .bind::<BigInt, _>(expected_version)
                .execute(connection);
            match result {
                Ok(affected) => Ok(affected == 1),
                // Two claims that both saw zero running rows under read
                // committed: the single-running index rejects the second.
                Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
                    Ok(false)
                }
                Err(err) => Err(TaskRepositoryError::persistence(err)),
            }
        })
        .await
    }

    async fn try_requeue(&self, id: TaskId, expected: TaskVersion) -> TaskRepositoryResult<bool> {
        let expected_version = version_to_db(expected)?;
        self.run_blocking(move |connection| {
            let affected = diesel::update(
                generation_tasks::table
                    .filter(generation_tasks::id.eq(id.into_inner()))
                    .filter(generation_tasks::status.eq(TaskStatus::Running.as_str()))
                    .filter(generation_tasks::version.eq(expected_version)),
            )
            .set((
                generation_tasks::status.eq(TaskStatus::Queued.as_str()),
                generation_tasks::started_at.eq(None::<DateTime<Utc>>),
                generation_tasks::version.eq(generation_tasks::version + 1),
            ))
            .execute(connection)
            .map_err(TaskRepositoryError::persistence)?;
            Ok(affected == 1)
        })
        .await
    }

    async fn save_checkpoint(&self, id: TaskId, checkpoint: &Value) -> TaskRepositoryResult<()> {
        let payload = checkpoint.clone();
        self.run_blocking(move |connection| {
            let affected = diesel::update(
                generation_tasks::table.filter(generation_tasks::id.eq(id.into_inner())),
            )
            .set(generation_tasks::result_json.eq(Some(payload)))
            .execute(connection)
            .map_err(TaskRepositoryError::persistence)?;
            if affected == 0 {
                return Err(TaskRepositoryError::NotFound(id));
            }
            Ok(())
        })
        .await
    }

    async fn complete(&self, completion: &TaskCompletion) -> TaskRepositoryResult<bool> {
        let task_id = completion.task_id;
        let result = completion.result.clone();
        let finished_at = completion.finished_at;
        let published_at = completion.article.as_ref().map(Article::published_at);
        let article_row = completion.article.as_ref().map(to_article_row);

        self.run_blocking(move |connection| {
            connection
                .transaction::<_, DieselError, _>(|tx_conn| {
                    let affected = diesel::update(
                        generation_tasks::table
                            .filter(generation_tasks::id.eq(task_id.into_inner()))
                            .filter(generation_tasks::status.eq(TaskStatus::Running.as_str())),
                    )
                    .set((
                        generation_tasks::status.eq(TaskStatus::Succeeded.as_str()),
                        generation_tasks::result_json.eq(Some(result)),
                        generation_tasks::finished_at.eq(Some(finished_at)),
                        generation_tasks::published_at.eq(published_at),
                        generation_tasks::version.eq(generation_tasks::version + 1),
                    ))
                    .execute(tx_conn)?;
                    if affected != 1 {
                        return Ok(false);
                    }
                    if let Some(row) = article_row {
                        diesel::insert_into(articles::table)
                            .values(&row)
                            .execute(tx_conn)?;
                    }
                    Ok(true)
                })
                .map_err(TaskRepositoryError::persistence)
        })
        .await
    }

    async fn fail(&self, failure: &TaskFailure) -> TaskRepositoryResult<bool> {
        let task_id = failure.task_id;
        let message = failure.message.clone();
        let context = failure.context.clone();
        let finished_at = failure.finished_at;
        self.run_blocking(move |connection| {
            let affected = diesel::update(
                generation_tasks::table
                    .filter(generation_tasks::id.eq(task_id.into_inner()))
                    .filter(generation_tasks::status.eq(TaskStatus::Running.as_str())),
            )
            .set((
                generation_tasks::status.eq(TaskStatus::Failed.as_str()),
                generation_tasks::error_message.eq(Some(message)),
                generation_tasks::error_context_json.eq(Some(context)),
                generation_tasks::finished_at.eq(Some(finished_at)),
                generation_tasks::version.eq(generation_tasks::version + 1),
            ))
            .execute(connection)
            .map_err(TaskRepositoryError::persistence)?;
            Ok(affected == 1)
        })
        .await
    }

    async fn try_cancel(
        &self,
        id: TaskId,
        expected: TaskVersion,
        finished_at: DateTime<Utc>,
    ) -> TaskRepositoryResult<bool> {
        let expected_version = version_to_db(expected)?;
        self.run_blocking(move |connection| {
            let affected = diesel::update(
                generation_tasks::table
                    .filter(generation_tasks::id.eq(id.into_inner()))
                    .filter(generation_tasks::status.eq(TaskStatus::Queued.as_str()))
                    .filter(generation_tasks::version.eq(expected_version)),
            )
            .set((
                generation_tasks::status.eq(TaskStatus::Canceled.as_str()),
                generation_tasks::finished_at.eq(Some(finished_at)),
                generation_tasks::version.eq(generation_tasks::version + 1),
            ))
            .execute(connection)
            .map_err(TaskRepositoryError::persistence)?;
            Ok(affected == 1)
        })
        .await
    }

    async fn try_reset_failed(
        &self,
        id: TaskId,
        expected: TaskVersion,
    ) -> TaskRepositoryResult<bool> {
        let expected_version = version_to_db(expected)?;
        self.run_blocking(move |connection| {
            let affected = diesel::update(
                generation_tasks::table
                    .filter(generation_tasks::id.eq(id.into_inner()))
                    .filter(generation_tasks::status.eq(TaskStatus::Failed.as_str()))
                    .filter(generation_tasks::version.eq(expected_version)),
            )
            .set((
                generation_tasks::status.eq(TaskStatus::Queued.as_str()),
                generation_tasks::started_at.eq(None::<DateTime<Utc>>),
                generation_tasks::finished_at.eq(None::<DateTime<Utc>>),
                generation_tasks::error_message.eq(None::<String>),
                generation_tasks::error_context_json.eq(None::<Value>),
                generation_tasks::version.eq(generation_tasks::version + 1),
            ))
            .execute(connection)
            .map_err(TaskRepositoryError::persistence)?;
            Ok(affected == 1)
        })
        .await
    }

    async fn find_articles_by_task(&self, id: TaskId) -> TaskRepositoryResult<Vec<Article>> {
        self.run_blocking(move |connection| {
            articles::table
                .filter(articles::task_id.eq(id.into_inner()))
                .order(articles::created_at.asc())
                .select(ArticleRow::as_select())
                .load::<ArticleRow>(connection)
                .map_err(TaskRepositoryError::persistence)?
                .into_iter()
                .map(row_to_article)
                .collect()
        })
        .await
    }
}

fn version_to_db(version: TaskVersion) -> TaskRepositoryResult<i64> {
    i64::try_from(version.value()).map_err(TaskRepositoryError::persistence)
}

fn to_new_row(task: &Task) -> TaskRepositoryResult<NewTaskRow> {
    Ok(NewTaskRow {
        id: task.id().into_inner(),
        task_date: task.task_date().as_naive(),
        task_type: task.task_type().as_str().to_owned(),
        trigger_source: task.trigger_source().as_str().to_owned(),
        profile_id: task.profile_id().into_inner(),
        status: task.status().as_str().to_owned(),
        version: version_to_db(task.version())?,
        result_json: task.result_json().cloned(),
        created_at: task.created_at(),
    })
}

fn row_to_task(row: TaskRow) -> TaskRepositoryResult<Task> {
    let TaskRow {
        id,
        task_date,
        task_type: persisted_type,
        trigger_source: persisted_trigger,
        profile_id,
        status: persisted_status,
        version: persisted_version,
        result_json,
        error_message,
        error_context_json,
        created_at,
        started_at,
        finished_at,
        published_at,
    } = row;

    let task_type =
        TaskType::try_from(persisted_type.as_str()).map_err(TaskRepositoryError::persistence)?;
    let trigger_source = TriggerSource::try_from(persisted_trigger.as_str())
        .map_err(TaskRepositoryError::persistence)?;
    let status =
        TaskStatus::try_from(persisted_status.as_str()).map_err(TaskRepositoryError::persistence)?;
    let version_value =
        u64::try_from(persisted_version).map_err(TaskRepositoryError::persistence)?;
    let version = TaskVersion::new(version_value).map_err(TaskRepositoryError::persistence)?;

    Ok(Task::from_persisted(PersistedTaskData {
        id: TaskId::from_uuid(id),
        task_date: BusinessDate::from_naive(task_date),
        task_type,
        trigger_source,
        profile_id: ProfileId::from_uuid(profile_id),
        status,
        version,
        result_json,
        error_message,
        error_context: error_context_json,
        created_at,
        started_at,
        finished_at,
        published_at,
    }))
}

fn to_article_row(article: &Article) -> ArticleRow {
    ArticleRow {
        id: article.id().into_inner(),
        task_id: article.task_id().into_inner(),
        profile_id: article.profile_id().into_inner(),
        task_date: article.task_date().as_naive(),
        title: article.title().to_owned(),
        content: article.content().to_owned(),
        selected_words: article.selected_words().to_vec(),
        content_sha256: article.content_sha256().to_owned(),
        status: article.status().as_str().to_owned(),
        published_at: article.published_at(),
        created_at: article.created_at(),
    }
}

fn row_to_article(row: ArticleRow) -> TaskRepositoryResult<Article> {
    let status =
        ArticleStatus::try_from(row.status.as_str()).map_err(TaskRepositoryError::persistence)?;
    Ok(Article::from_persisted(PersistedArticleData {
        id: ArticleId::from_uuid(row.id),
        task_id: TaskId::from_uuid(row.task_id),
        profile_id: ProfileId::from_uuid(row.profile_id),
        task_date: BusinessDate::from_naive(row.task_date),
        title: row.title,
        content: row.content,
        selected_words: row.selected_words,
        content_sha256: row.content_sha256,
        status,
        published_at: row.published_at,
        created_at: row.created_at,
    }))
}
