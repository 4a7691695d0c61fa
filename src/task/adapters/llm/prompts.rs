//! Prompt templates for the three generation stages.

use crate::task::{domain::BusinessDate, ports::GenerationError};
use minijinja::{Environment, context};

const SYSTEM_TEMPLATE: &str = "You write short, engaging daily articles that teach vocabulary \
to language learners. Preferred topic: {{ topic }}. Always use every word you are asked to \
teach, in context, and keep the tone friendly.";

const SELECT_TEMPLATE: &str = "Today is {{ date }}. From the candidate words below, choose up \
to {{ max_words }} that fit naturally into one article about {{ topic }}. New words are listed \
first and should be preferred.\n\nCandidates:\n{% for word in candidates %}- {{ word }}\n\
{% endfor %}\nReply with JSON only: {\"words\": [\"...\"]}";

const DRAFT_TEMPLATE: &str = "Write the article in Markdown. It must use each of these words \
at least once: {{ words | join(\", \") }}. Start with a level-one heading.";

const REVIEW_TEMPLATE: &str = "Review the draft for grammar, accuracy and natural use of the \
words {{ words | join(\", \") }}. Fix any problems. Reply with JSON only: \
{\"title\": \"...\", \"content\": \"<corrected markdown>\"}";

/// Renders the system message.
pub fn system(topic: &str) -> Result<String, GenerationError> {
    render(SYSTEM_TEMPLATE, context! { topic => topic })
}

/// Renders the word selection request.
pub fn select(
    topic: &str,
    task_date: BusinessDate,
    candidates: &[String],
    max_words: usize,
) -> Result<String, GenerationError> {
    render(
        SELECT_TEMPLATE,
        context! {
            topic => topic,
            date => task_date.to_string(),
            candidates => candidates,
            max_words => max_words,
        },
    )
}

/// Renders the drafting request.
pub fn draft(words: &[String]) -> Result<String, GenerationError> {
    render(DRAFT_TEMPLATE, context! { words => words })
}

/// Renders the review request.
pub fn review(words: &[String]) -> Result<String, GenerationError> {
    render(REVIEW_TEMPLATE, context! { words => words })
}

fn render(template: &str, ctx: minijinja::Value) -> Result<String, GenerationError> {
    Environment::new()
        .render_str(template, ctx)
        .map_err(|err| GenerationError::Prompt(err.to_string()))
}
