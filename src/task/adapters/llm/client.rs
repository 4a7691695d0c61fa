//! OpenAI-compatible chat completions generation client.
//!
//! Generation runs as three stages over one conversation: `select` picks the
//! words to teach, `draft` writes the article, and `review` returns the
//! corrected article as JSON. After each stage the whole conversation is
//! checkpointed under the name of the stage that runs next, so a resumed run
//! continues exactly where the previous one stopped.

use super::prompts;
use crate::task::{
    domain::{ArticleDraft, GenerationCheckpoint},
    ports::{
        CheckpointSink, GeneratedArticle, GenerationClient, GenerationError, GenerationRequest,
        GenerationResult, GenerationSettings,
    },
};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::fmt;
use tracing::{debug, warn};

/// Pipeline stage names as stored in checkpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Choose the words to teach.
    Select,
    /// Write the article.
    Draft,
    /// Correct the article and return it as JSON.
    Review,
}

impl Stage {
    /// Returns the checkpoint representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Select => "select",
            Self::Draft => "draft",
            Self::Review => "review",
        }
    }

    /// Parses a checkpoint stage name.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError::InvalidResponse`] for unknown stages.
    pub fn parse(value: &str) -> GenerationResult<Self> {
        match value {
            "select" => Ok(Self::Select),
            "draft" => Ok(Self::Draft),
            "review" => Ok(Self::Review),
            other => Err(GenerationError::InvalidResponse(format!(
                "unknown checkpoint stage '{other}'"
            ))),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Serialize)]
struct ChatRequestBody<'a> {
    model: &'a str,
    messages: &'a [Value],
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<Value>,
}

#[derive(Deserialize)]
struct ChatResponseBody {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReplyMessage,
}

#[derive(Deserialize)]
struct ChatReplyMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    #[serde(default)]
    total_tokens: u64,
}

#[derive(Deserialize)]
struct SelectionReply {
    words: Vec<String>,
}

#[derive(Deserialize)]
struct ReviewReply {
    title: String,
    content: String,
}

/// Mutable state carried between stages.
struct Conversation {
    stage: Stage,
    history: Vec<Value>,
    selected_words: Option<Vec<String>>,
    total_tokens: u64,
}

impl Conversation {
    fn push(&mut self, role: &str, content: impl Into<String>) {
        self.history
            .push(json!({ "role": role, "content": content.into() }));
    }

    fn checkpoint(&self) -> GenerationCheckpoint {
        let checkpoint = GenerationCheckpoint::new(self.stage.as_str(), self.history.clone());
        match &self.selected_words {
            Some(words) => checkpoint.with_selected_words(words.clone()),
            None => checkpoint,
        }
    }
}

/// Generation client backed by an OpenAI-compatible chat completions API.
#[derive(Debug, Clone)]
pub struct ChatGenerationClient {
    http_client: Client,
    max_words: usize,
}

impl Default for ChatGenerationClient {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatGenerationClient {
    /// Default upper bound on words taught per article.
    pub const DEFAULT_MAX_WORDS: usize = 5;

    /// Creates a client with a fresh HTTP connection pool.
    #[must_use]
    pub fn new() -> Self {
        Self::with_http_client(Client::new())
    }

    /// Creates a client that reuses an existing HTTP client.
    #[must_use]
    pub const fn with_http_client(http_client: Client) -> Self {
        Self {
            http_client,
            max_words: Self::DEFAULT_MAX_WORDS,
        }
    }

    /// Sets the upper bound on words taught per article.
    #[must_use]
    pub const fn with_max_words(mut self, max_words: usize) -> Self {
        self.max_words = max_words;
        self
    }

    async fn chat(
        &self,
        settings: &GenerationSettings,
        conversation: &mut Conversation,
        json_reply: bool,
    ) -> GenerationResult<String> {
        let body = ChatRequestBody {
            model: &settings.model,
            messages: &conversation.history,
            response_format: json_reply.then(|| json!({ "type": "json_object" })),
        };
        let url = format!("{}/chat/completions", settings.base_url.trim_end_matches('/'));
        let response = self
            .http_client
            .post(url)
            .bearer_auth(&settings.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| {
                warn!(error = %err, "chat completion request failed");
                GenerationError::Transport(err.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            warn!(status = %status, error = %body_text, "chat completion API error");
            return Err(GenerationError::Api {
                status: status.as_u16(),
                body: body_text,
            });
        }

        let reply: ChatResponseBody = response
            .json()
            .await
            .map_err(|err| GenerationError::InvalidResponse(err.to_string()))?;
        if let Some(usage) = &reply.usage {
            conversation.total_tokens =
                conversation.total_tokens.saturating_add(usage.total_tokens);
        }
        let content = reply
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| GenerationError::InvalidResponse("no choices in reply".to_owned()))?;

        debug!(model = %settings.model, stage = %conversation.stage, "chat completion");
        conversation.push("assistant", content.clone());
        Ok(content)
    }

    async fn run_select(
        &self,
        request: &GenerationRequest,
        conversation: &mut Conversation,
    ) -> GenerationResult<()> {
        let prompt = prompts::select(
            &request.topic_preference,
            request.task_date,
            &request.candidate_words,
            self.max_words,
        )?;
        conversation.push("user", prompt);
        let reply = self.chat(&request.settings, conversation, true).await?;
        let words = filter_selection(&reply, &request.candidate_words, self.max_words)?;
        conversation.selected_words = Some(words);
        conversation.stage = Stage::Draft;
        Ok(())
    }

    async fn run_draft(
        &self,
        request: &GenerationRequest,
        conversation: &mut Conversation,
    ) -> GenerationResult<()> {
        let words = self.words_for(request, conversation);
        conversation.push("user", prompts::draft(&words)?);
        self.chat(&request.settings, conversation, false).await?;
        conversation.stage = Stage::Review;
        Ok(())
    }

    async fn run_review(
        &self,
        request: &GenerationRequest,
        conversation: &mut Conversation,
    ) -> GenerationResult<ArticleDraft> {
        let words = self.words_for(request, conversation);
        conversation.push("user", prompts::review(&words)?);
        let reply = self.chat(&request.settings, conversation, true).await?;
        let reviewed: ReviewReply = serde_json::from_str(strip_code_fence(&reply))
            .map_err(|err| GenerationError::InvalidResponse(format!("review reply: {err}")))?;
        if reviewed.content.trim().is_empty() {
            return Err(GenerationError::InvalidResponse(
                "review returned empty content".to_owned(),
            ));
        }
        Ok(ArticleDraft {
            title: reviewed.title.trim().to_owned(),
            content: reviewed.content,
            selected_words: words,
        })
    }

    /// Words chosen by `select`, or the leading candidates when a resumed
    /// checkpoint did not record a selection.
    fn words_for(&self, request: &GenerationRequest, conversation: &Conversation) -> Vec<String> {
        conversation.selected_words.clone().unwrap_or_else(|| {
            request
                .candidate_words
                .iter()
                .take(self.max_words)
                .cloned()
                .collect()
        })
    }
}

#[async_trait]
impl GenerationClient for ChatGenerationClient {
    async fn generate(
        &self,
        request: GenerationRequest,
        checkpoints: &dyn CheckpointSink,
    ) -> GenerationResult<GeneratedArticle> {
        let resumed_from = request
            .resume_from
            .as_ref()
            .map(|checkpoint| checkpoint.stage.clone());
        let mut conversation = match &request.resume_from {
            Some(checkpoint) => Conversation {
                stage: Stage::parse(&checkpoint.stage)?,
                history: checkpoint.history.clone(),
                selected_words: checkpoint.selected_words.clone(),
                total_tokens: 0,
            },
            None => {
                let mut fresh = Conversation {
                    stage: Stage::Select,
                    history: Vec::new(),
                    selected_words: None,
                    total_tokens: 0,
                };
                fresh.push("system", prompts::system(&request.topic_preference)?);
                fresh
            }
        };

        let mut stages_run = Vec::new();
        loop {
            stages_run.push(conversation.stage.as_str());
            match conversation.stage {
                Stage::Select => self.run_select(&request, &mut conversation).await?,
                Stage::Draft => self.run_draft(&request, &mut conversation).await?,
                Stage::Review => {
                    let draft = self.run_review(&request, &mut conversation).await?;
                    return Ok(GeneratedArticle {
                        draft,
                        metadata: json!({
                            "model": request.settings.model,
                            "stages": stages_run,
                            "resumed_from": resumed_from,
                            "total_tokens": conversation.total_tokens,
                        }),
                    });
                }
            }
            checkpoints.save(&conversation.checkpoint()).await?;
        }
    }
}

/// Parses a selection reply, keeping only offered words in reply order.
fn filter_selection(
    reply: &str,
    candidates: &[String],
    max_words: usize,
) -> GenerationResult<Vec<String>> {
    let parsed: SelectionReply = serde_json::from_str(strip_code_fence(reply))
        .map_err(|err| GenerationError::InvalidResponse(format!("selection reply: {err}")))?;
    let mut words: Vec<String> = Vec::new();
    for word in parsed.words {
        let trimmed = word.trim();
        if candidates.iter().any(|candidate| candidate == trimmed)
            && !words.iter().any(|chosen| chosen == trimmed)
        {
            words.push(trimmed.to_owned());
        }
    }
    words.truncate(max_words);
    if words.is_empty() {
        return Err(GenerationError::InvalidResponse(
            "selection contained no candidate words".to_owned(),
        ));
    }
    Ok(words)
}

/// Removes a surrounding Markdown code fence, if present.
fn strip_code_fence(reply: &str) -> &str {
    let trimmed = reply.trim();
    trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|inner| inner.strip_suffix("```"))
        .map_or(trimmed, str::trim)
}
