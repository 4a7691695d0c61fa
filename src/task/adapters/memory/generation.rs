//! Scripted generation client for exercising the queue without a model.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::task::{
    domain::{ArticleDraft, GenerationCheckpoint},
    ports::{
        CheckpointSink, GeneratedArticle, GenerationClient, GenerationError, GenerationRequest,
        GenerationResult,
    },
};

/// One scripted run: checkpoints to emit, then the outcome to return.
#[derive(Debug, Clone)]
pub struct ScriptedRun {
    checkpoints: Vec<GenerationCheckpoint>,
    outcome: ScriptedOutcome,
}

#[derive(Debug, Clone)]
enum ScriptedOutcome {
    Article(ArticleDraft),
    /// Publishes the first `count` candidate words.
    PickCandidates { title: String, count: usize },
    Fail(GenerationError),
}

impl ScriptedRun {
    /// Run that returns `draft` unchanged.
    #[must_use]
    pub const fn article(draft: ArticleDraft) -> Self {
        Self {
            checkpoints: Vec::new(),
            outcome: ScriptedOutcome::Article(draft),
        }
    }

    /// Run that selects the first `count` candidate words it is offered.
    #[must_use]
    pub fn pick_candidates(title: impl Into<String>, count: usize) -> Self {
        Self {
            checkpoints: Vec::new(),
            outcome: ScriptedOutcome::PickCandidates {
                title: title.into(),
                count,
            },
        }
    }

    /// Run that fails with `error`.
    #[must_use]
    pub const fn failure(error: GenerationError) -> Self {
        Self {
            checkpoints: Vec::new(),
            outcome: ScriptedOutcome::Fail(error),
        }
    }

    /// Emits `checkpoint` before the outcome.
    #[must_use]
    pub fn with_checkpoint(mut self, checkpoint: GenerationCheckpoint) -> Self {
        self.checkpoints.push(checkpoint);
        self
    }
}

/// Generation client that replays [`ScriptedRun`]s in order and records
/// every request it receives.
///
/// Once the script is exhausted every call picks all candidate words.
#[derive(Debug, Clone, Default)]
pub struct ScriptedGenerationClient {
    state: Arc<Mutex<ScriptState>>,
}

#[derive(Debug, Default)]
struct ScriptState {
    runs: VecDeque<ScriptedRun>,
    requests: Vec<GenerationRequest>,
}

impl ScriptedGenerationClient {
    /// Creates a client with an empty script.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a client that replays `runs`.
    #[must_use]
    pub fn with_runs(runs: impl IntoIterator<Item = ScriptedRun>) -> Self {
        let client = Self::default();
        if let Ok(mut state) = client.state.lock() {
            state.runs.extend(runs);
        }
        client
    }

    /// Appends a run to the script.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError::Transport`] when the script lock is
    /// poisoned.
    pub fn push(&self, run: ScriptedRun) -> GenerationResult<()> {
        self.lock()?.runs.push_back(run);
        Ok(())
    }

    /// Returns every request received so far.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError::Transport`] when the script lock is
    /// poisoned.
    pub fn requests(&self) -> GenerationResult<Vec<GenerationRequest>> {
        Ok(self.lock()?.requests.clone())
    }

    fn lock(&self) -> GenerationResult<MutexGuard<'_, ScriptState>> {
        self.state
            .lock()
            .map_err(|err| GenerationError::Transport(err.to_string()))
    }

    fn next_run(&self, request: &GenerationRequest) -> GenerationResult<ScriptedRun> {
        let mut state = self.lock()?;
        state.requests.push(request.clone());
        Ok(state.runs.pop_front().unwrap_or_else(|| {
            ScriptedRun::pick_candidates("Scripted article", request.candidate_words.len())
        }))
    }
}

#[async_trait]
impl GenerationClient for ScriptedGenerationClient {
    async fn generate(
        &self,
        request: GenerationRequest,
        checkpoints: &dyn CheckpointSink,
    ) -> GenerationResult<GeneratedArticle> {
        let run = self.next_run(&request)?;
        for checkpoint in &run.checkpoints {
            checkpoints.save(checkpoint).await?;
        }

        let draft = match run.outcome {
            ScriptedOutcome::Article(draft) => draft,
            ScriptedOutcome::PickCandidates { title, count } => {
                let selected_words: Vec<String> =
                    request.candidate_words.into_iter().take(count).collect();
                ArticleDraft {
                    content: format!("# {title}\n\n{}", selected_words.join(", ")),
                    title,
                    selected_words,
                }
            }
            ScriptedOutcome::Fail(error) => return Err(error),
        };

        Ok(GeneratedArticle {
            draft,
            metadata: serde_json::json!({ "client": "scripted" }),
        })
    }
}
