//! Diesel row models for task queue persistence.

use super::schema::{articles, daily_word_supplies, generation_profiles, generation_tasks};
use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use serde_json::Value;

/// Query result row for task records.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = generation_tasks)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct TaskRow {
    /// Internal task identifier.
    pub id: uuid::Uuid,
    /// Business date.
    pub task_date: NaiveDate,
    /// Task kind.
    pub task_type: String,
    /// Trigger source.
    pub trigger_source: String,
    /// Owning profile.
    pub profile_id: uuid::Uuid,
    /// Lifecycle status.
    pub status: String,
    /// Optimistic-concurrency token.
    pub version: i64,
    /// Checkpoint or result payload.
    pub result_json: Option<Value>,
    /// Failure message.
    pub error_message: Option<String>,
    /// Failure context.
    pub error_context_json: Option<Value>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Claim timestamp.
    pub started_at: Option<DateTime<Utc>>,
    /// Completion timestamp.
    pub finished_at: Option<DateTime<Utc>>,
    /// Publication timestamp.
    pub published_at: Option<DateTime<Utc>>,
}

/// Insert model for task records.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = generation_tasks)]
pub struct NewTaskRow {
    /// Internal task identifier.
    pub id: uuid::Uuid,
    /// Business date.
    pub task_date: NaiveDate,
    /// Task kind.
    pub task_type: String,
    /// Trigger source.
    pub trigger_source: String,
    /// Owning profile.
    pub profile_id: uuid::Uuid,
    /// Lifecycle status.
    pub status: String,
    /// Optimistic-concurrency token.
    pub version: i64,
    /// Checkpoint or result payload.
    pub result_json: Option<Value>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Query and insert row for profiles.
#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = generation_profiles)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ProfileRow {
    /// Profile identifier.
    pub id: uuid::Uuid,
    /// Unique name.
    pub name: String,
    /// Topic preference.
    pub topic_preference: String,
    /// Configured concurrency.
    pub concurrency: i32,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Query and insert row for daily word supplies.
#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = daily_word_supplies)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct WordSupplyRow {
    /// Business date.
    pub task_date: NaiveDate,
    /// New words.
    pub new_words: Vec<String>,
    /// Review words.
    pub review_words: Vec<String>,
    /// Fetch timestamp.
    pub fetched_at: DateTime<Utc>,
}

/// Query and insert row for articles.
#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = articles)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ArticleRow {
    /// Article identifier.
    pub id: uuid::Uuid,
    /// Generating task.
    pub task_id: uuid::Uuid,
    /// Owning profile.
    pub profile_id: uuid::Uuid,
    /// Business date.
    pub task_date: NaiveDate,
    /// Headline.
    pub title: String,
    /// Markdown body.
    pub content: String,
    /// Taught words.
    pub selected_words: Vec<String>,
    /// Content digest.
    pub content_sha256: String,
    /// Publication status.
    pub status: String,
    /// Publication timestamp.
    pub published_at: DateTime<Utc>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}
