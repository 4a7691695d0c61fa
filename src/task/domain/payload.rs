//! Typed views over the task `result_json` column.
//!
//! The column holds generation checkpoints while a task runs and the final
//! result summary once it succeeds. [`TaskPayload::from_value`] recovers
//! which of the two a stored value is.

use super::ArticleId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

const STAGE_KEY: &str = "stage";
const HISTORY_KEY: &str = "history";
const SELECTED_WORDS_KEY: &str = "selected_words";

/// Resumable snapshot of an in-progress multi-stage generation.
///
/// The queue only relies on `stage` and `history`; every other key is kept
/// verbatim for the generation client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationCheckpoint {
    /// Stage the generation resumes at.
    pub stage: String,
    /// Conversation state accumulated so far.
    pub history: Vec<Value>,
    /// Words chosen by an earlier stage, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_words: Option<Vec<String>>,
    /// Client-specific state.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl GenerationCheckpoint {
    /// Creates a checkpoint for `stage` with the given history.
    #[must_use]
    pub fn new(stage: impl Into<String>, history: Vec<Value>) -> Self {
        Self {
            stage: stage.into(),
            history,
            selected_words: None,
            extra: Map::new(),
        }
    }

    /// Records the words chosen so far.
    #[must_use]
    pub fn with_selected_words(mut self, words: Vec<String>) -> Self {
        self.selected_words = Some(words);
        self
    }
}

/// Summary stored on a succeeded task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResultSummary {
    /// Article published by the task.
    pub article_id: ArticleId,
    /// Article headline.
    pub title: String,
    /// Words the article teaches.
    pub selected_words: Vec<String>,
    /// Number of candidate words offered to the generation client.
    pub candidate_count: usize,
    /// Number of words the generation client selected.
    pub selected_count: usize,
    /// Model identifier used for generation.
    pub model: String,
    /// Stage the run resumed from, when it did not start fresh.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resumed_from_stage: Option<String>,
    /// Client-reported generation metadata.
    #[serde(default)]
    pub metadata: Value,
}

/// Interpretation of a stored `result_json` value.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskPayload {
    /// Mid-execution checkpoint.
    Checkpoint(GenerationCheckpoint),
    /// Final result summary.
    Result(TaskResultSummary),
    /// Any other JSON value.
    Opaque(Value),
}

impl TaskPayload {
    /// Classifies a stored value.
    ///
    /// Objects carrying both `stage` and `history` are read as checkpoints
    /// first; otherwise the value is read as a result summary, falling back
    /// to [`TaskPayload::Opaque`].
    #[must_use]
    pub fn from_value(value: Value) -> Self {
        let looks_like_checkpoint = value.as_object().is_some_and(|object| {
            object.contains_key(STAGE_KEY) && object.contains_key(HISTORY_KEY)
        });
        if looks_like_checkpoint {
            if let Ok(checkpoint) = serde_json::from_value::<GenerationCheckpoint>(value.clone()) {
                return Self::Checkpoint(checkpoint);
            }
            return Self::Opaque(value);
        }
        match serde_json::from_value::<TaskResultSummary>(value.clone()) {
            Ok(summary) => Self::Result(summary),
            Err(_) => Self::Opaque(value),
        }
    }

    /// Returns the checkpoint when the payload is resumable.
    #[must_use]
    pub fn into_checkpoint(self) -> Option<GenerationCheckpoint> {
        match self {
            Self::Checkpoint(checkpoint) => Some(checkpoint),
            Self::Result(_) | Self::Opaque(_) => None,
        }
    }

    /// Returns the words this payload records as selected.
    #[must_use]
    pub fn selected_words(&self) -> Vec<String> {
        match self {
            Self::Checkpoint(checkpoint) => checkpoint.selected_words.clone().unwrap_or_default(),
            Self::Result(summary) => summary.selected_words.clone(),
            Self::Opaque(value) => value
                .get(SELECTED_WORDS_KEY)
                .and_then(Value::as_array)
                .map(|words| {
                    words
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_owned)
                        .collect()
                })
                .unwrap_or_default(),
        }
    }
}
