//! Articles published by successful generation tasks.

use super::{ArticleId, BusinessDate, ParseArticleStatusError, ProfileId, Task, TaskId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Publication status of an article.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArticleStatus {
    /// Visible to readers.
    Published,
}

impl ArticleStatus {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Published => "published",
        }
    }
}

impl TryFrom<&str> for ArticleStatus {
    type Error = ParseArticleStatusError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim() {
            "published" => Ok(Self::Published),
            _ => Err(ParseArticleStatusError(value.to_owned())),
        }
    }
}

/// Generated article content as returned by the generation client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleDraft {
    /// Article headline.
    pub title: String,
    /// Markdown body.
    pub content: String,
    /// Words the article teaches.
    pub selected_words: Vec<String>,
}

/// Persisted article record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    id: ArticleId,
    task_id: TaskId,
    profile_id: ProfileId,
    task_date: BusinessDate,
    title: String,
    content: String,
    selected_words: Vec<String>,
    content_sha256: String,
    status: ArticleStatus,
    published_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

/// Parameter object for reconstructing a persisted article.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedArticleData {
    /// Persisted article identifier.
    pub id: ArticleId,
    /// Task that generated the article.
    pub task_id: TaskId,
    /// Profile the article was generated for.
    pub profile_id: ProfileId,
    /// Business date of the generating task.
    pub task_date: BusinessDate,
    /// Persisted headline.
    pub title: String,
    /// Persisted markdown body.
    pub content: String,
    /// Persisted taught words.
    pub selected_words: Vec<String>,
    /// Persisted content digest.
    pub content_sha256: String,
    /// Persisted publication status.
    pub status: ArticleStatus,
    /// Persisted publication timestamp.
    pub published_at: DateTime<Utc>,
    /// Persisted creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl Article {
    /// Publishes a draft generated by `task`.
    #[must_use]
    pub fn publish(task: &Task, draft: ArticleDraft, published_at: DateTime<Utc>) -> Self {
        let content_sha256 = content_digest(&draft.content);
        Self {
            id: ArticleId::new(),
            task_id: task.id(),
            profile_id: task.profile_id(),
            task_date: task.task_date(),
            title: draft.title,
            content: draft.content,
            selected_words: draft.selected_words,
            content_sha256,
            status: ArticleStatus::Published,
            published_at,
            created_at: published_at,
        }
    }

    /// Reconstructs an article from persisted storage.
    #[must_use]
    pub fn from_persisted(data: PersistedArticleData) -> Self {
        Self {
            id: data.id,
            task_id: data.task_id,
            profile_id: data.profile_id,
            task_date: data.task_date,
            title: data.title,
            content: data.content,
            selected_words: data.selected_words,
            content_sha256: data.content_sha256,
            status: data.status,
            published_at: data.published_at,
            created_at: data.created_at,
        }
    }

    /// Returns the article identifier.
    #[must_use]
    pub const fn id(&self) -> ArticleId {
        self.id
    }

    /// Returns the generating task.
    #[must_use]
    pub const fn task_id(&self) -> TaskId {
        self.task_id
    }

    /// Returns the owning profile.
    #[must_use]
    pub const fn profile_id(&self) -> ProfileId {
        self.profile_id
    }

    /// Returns the business date.
    #[must_use]
    pub const fn task_date(&self) -> BusinessDate {
        self.task_date
    }

    /// Returns the headline.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Returns the markdown body.
    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Returns the taught words.
    #[must_use]
    pub fn selected_words(&self) -> &[String] {
        &self.selected_words
    }

    /// Returns the hex SHA-256 digest of the body.
    #[must_use]
    pub fn content_sha256(&self) -> &str {
        &self.content_sha256
    }

    /// Returns the publication status.
    #[must_use]
    pub const fn status(&self) -> ArticleStatus {
        self.status
    }

    /// Returns the publication timestamp.
    #[must_use]
    pub const fn published_at(&self) -> DateTime<Utc> {
        self.published_at
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

fn content_digest(content: &str) -> String {
    Sha256::digest(content.as_bytes())
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect()
}
