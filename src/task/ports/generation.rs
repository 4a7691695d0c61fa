//! Port for the external multi-stage article generation pipeline.

use crate::task::domain::{ArticleDraft, BusinessDate, GenerationCheckpoint};
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Result type for generation operations.
pub type GenerationResult<T> = Result<T, GenerationError>;

/// Connection settings passed through to the generation client untouched.
#[derive(Clone, PartialEq, Eq)]
pub struct GenerationSettings {
    /// Model identifier.
    pub model: String,
    /// API key sent as a bearer token.
    pub api_key: String,
    /// Base URL of the chat completions API.
    pub base_url: String,
}

impl GenerationSettings {
    /// Creates generation settings.
    #[must_use]
    pub fn new(
        model: impl Into<String>,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            model: model.into(),
            api_key: api_key.into(),
            base_url: base_url.into(),
        }
    }
}

impl fmt::Debug for GenerationSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationSettings")
            .field("model", &self.model)
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Everything the generation client needs for one article.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    /// Connection settings.
    pub settings: GenerationSettings,
    /// Business date the article is for.
    pub task_date: BusinessDate,
    /// Topic preference of the owning profile.
    pub topic_preference: String,
    /// Candidate words, new words first.
    pub candidate_words: Vec<String>,
    /// Checkpoint to resume from instead of starting fresh.
    pub resume_from: Option<GenerationCheckpoint>,
}

/// Final output of a generation run.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedArticle {
    /// Article content and taught words.
    pub draft: ArticleDraft,
    /// Client-reported metadata (token usage, stages run).
    pub metadata: Value,
}

/// Receives checkpoints emitted mid-pipeline.
#[async_trait]
pub trait CheckpointSink: Send + Sync {
    /// Persists a checkpoint before the pipeline continues.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError::Checkpoint`] when the checkpoint could not
    /// be stored.
    async fn save(&self, checkpoint: &GenerationCheckpoint) -> GenerationResult<()>;
}

/// Multi-stage article generation contract.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Runs (or resumes) the pipeline and returns the finished article.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError`] when the external call fails, returns an
    /// unusable reply, or a checkpoint cannot be stored.
    async fn generate(
        &self,
        request: GenerationRequest,
        checkpoints: &dyn CheckpointSink,
    ) -> GenerationResult<GeneratedArticle>;
}

/// Errors returned by generation clients.
#[derive(Debug, Clone, Error)]
pub enum GenerationError {
    /// The request could not be sent or the connection failed.
    #[error("generation transport error: {0}")]
    Transport(String),

    /// The API answered with a non-success status.
    #[error("generation API error ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },

    /// The reply could not be interpreted.
    #[error("invalid generation response: {0}")]
    InvalidResponse(String),

    /// A prompt template failed to render.
    #[error("prompt rendering failed: {0}")]
    Prompt(String),

    /// A checkpoint could not be stored.
    #[error("checkpoint could not be saved: {0}")]
    Checkpoint(Arc<dyn std::error::Error + Send + Sync>),
}

impl GenerationError {
    /// Wraps a checkpoint persistence error.
    pub fn checkpoint(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Checkpoint(Arc::new(err))
    }
}
