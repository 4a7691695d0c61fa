//! Generation profiles consumed by the queue.

use super::{ProfileId, TaskDomainError};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique, non-empty profile name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileName(String);

impl ProfileName {
    /// Creates a validated profile name.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::EmptyProfileName`] when the trimmed value is
    /// empty.
    pub fn new(value: impl Into<String>) -> Result<Self, TaskDomainError> {
        let raw = value.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(TaskDomainError::EmptyProfileName);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the name as `str`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProfileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Named generation configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    id: ProfileId,
    name: ProfileName,
    topic_preference: String,
    concurrency: u32,
    created_at: DateTime<Utc>,
}

impl Profile {
    /// Name of the profile created when none exist.
    pub const DEFAULT_NAME: &'static str = "Default";

    /// Topic preference of the bootstrap profile.
    pub const DEFAULT_TOPIC: &'static str = "general";

    /// Creates a new profile.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidConcurrency`] when `concurrency` is
    /// zero.
    pub fn new(
        name: ProfileName,
        topic_preference: impl Into<String>,
        concurrency: u32,
        clock: &impl Clock,
    ) -> Result<Self, TaskDomainError> {
        if concurrency == 0 {
            return Err(TaskDomainError::InvalidConcurrency);
        }
        Ok(Self {
            id: ProfileId::new(),
            name,
            topic_preference: topic_preference.into().trim().to_owned(),
            concurrency,
            created_at: clock.utc(),
        })
    }

    /// Creates the bootstrap profile used when the profile store is empty.
    #[must_use]
    pub fn default_profile(clock: &impl Clock) -> Self {
        Self {
            id: ProfileId::new(),
            name: ProfileName(Self::DEFAULT_NAME.to_owned()),
            topic_preference: Self::DEFAULT_TOPIC.to_owned(),
            concurrency: 1,
            created_at: clock.utc(),
        }
    }

    /// Reconstructs a profile from persisted storage.
    #[must_use]
    pub const fn from_persisted(
        id: ProfileId,
        name: ProfileName,
        topic_preference: String,
        concurrency: u32,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name,
            topic_preference,
            concurrency,
            created_at,
        }
    }

    /// Returns the profile identifier.
    #[must_use]
    pub const fn id(&self) -> ProfileId {
        self.id
    }

    /// Returns the unique profile name.
    #[must_use]
    pub const fn name(&self) -> &ProfileName {
        &self.name
    }

    /// Returns the topic preference handed to the generation client.
    #[must_use]
    pub fn topic_preference(&self) -> &str {
        &self.topic_preference
    }

    /// Returns the configured concurrency.
    ///
    /// Execution is globally serialized, so this is informational only.
    #[must_use]
    pub const fn concurrency(&self) -> u32 {
        self.concurrency
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}
