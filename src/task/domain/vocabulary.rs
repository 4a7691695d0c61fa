//! Daily word supply and candidate selection.

use super::BusinessDate;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Words to teach on one business date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyWordSupply {
    task_date: BusinessDate,
    new_words: Vec<String>,
    review_words: Vec<String>,
    fetched_at: DateTime<Utc>,
}

impl DailyWordSupply {
    /// Creates a word supply record. Blank entries are dropped.
    #[must_use]
    pub fn new(
        task_date: BusinessDate,
        new_words: impl IntoIterator<Item = String>,
        review_words: impl IntoIterator<Item = String>,
        fetched_at: DateTime<Utc>,
    ) -> Self {
        Self {
            task_date,
            new_words: normalize(new_words),
            review_words: normalize(review_words),
            fetched_at,
        }
    }

    /// Returns the business date.
    #[must_use]
    pub const fn task_date(&self) -> BusinessDate {
        self.task_date
    }

    /// Returns words introduced on this date.
    #[must_use]
    pub fn new_words(&self) -> &[String] {
        &self.new_words
    }

    /// Returns words scheduled for review on this date.
    #[must_use]
    pub fn review_words(&self) -> &[String] {
        &self.review_words
    }

    /// Returns when the supply was fetched.
    #[must_use]
    pub const fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }

    /// Returns whether the combined word list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.new_words.is_empty() && self.review_words.is_empty()
    }

    /// Builds the candidate list for a task.
    ///
    /// New words come before review words so they take priority when the
    /// generation client picks a subset. Each word appears once, at its
    /// first position, and words in `used` are left out.
    #[must_use]
    pub fn candidate_words(&self, used: &HashSet<String>) -> Vec<String> {
        let mut seen: HashSet<&String> = HashSet::new();
        self.new_words
            .iter()
            .chain(&self.review_words)
            .filter(|&word| !used.contains(word) && seen.insert(word))
            .cloned()
            .collect()
    }
}

fn normalize(words: impl IntoIterator<Item = String>) -> Vec<String> {
    words
        .into_iter()
        .map(|word| word.trim().to_owned())
        .filter(|word| !word.is_empty())
        .collect()
}
