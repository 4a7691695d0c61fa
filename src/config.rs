//! Environment-driven worker configuration.
//!
//! [`WorkerConfig::from_env`] reads the process environment after loading an
//! optional `.env` file. [`WorkerConfig::from_lookup`] takes any key lookup,
//! which keeps parsing testable without touching the environment.

use crate::task::{ports::GenerationSettings, services::QueueConfig};
use chrono::{FixedOffset, TimeDelta};
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

/// Default chat completions base URL.
pub const DEFAULT_LLM_BASE_URL: &str = "https://api.openai.com/v1";

/// Default schedule for the daily cron enqueue (06:00 every day).
pub const DEFAULT_DAILY_ENQUEUE_CRON: &str = "0 0 6 * * *";

/// Default schedule for the periodic drain (every five minutes).
pub const DEFAULT_DRAIN_CRON: &str = "0 */5 * * * *";

const DEFAULT_POOL_SIZE: u32 = 4;
const MAX_OFFSET_MINUTES: i32 = 14 * 60;

/// Errors raised while reading configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A required variable is unset or blank.
    #[error("{0} must be set")]
    Missing(&'static str),

    /// A variable has a value that cannot be used.
    #[error("{key} has invalid value '{value}': {reason}")]
    Invalid {
        /// Variable name.
        key: &'static str,
        /// Rejected value.
        value: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// The `.env` file exists but could not be loaded.
    #[error("failed to load .env file: {0}")]
    DotEnv(String),
}

/// Settings for the `wordsmith-worker` binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    /// `PostgreSQL` connection URL.
    pub database_url: String,
    /// Maximum pooled connections.
    pub database_pool_size: u32,
    /// Settings passed through to the generation client.
    pub generation: GenerationSettings,
    /// Claim and recovery tunables.
    pub queue: QueueConfig,
    /// Fixed timezone that defines business dates.
    pub business_offset: FixedOffset,
    /// Cron expression for the daily enqueue.
    pub daily_enqueue_cron: String,
    /// Cron expression for the periodic drain.
    pub drain_cron: String,
}

impl WorkerConfig {
    /// Reads configuration from the process environment.
    ///
    /// A `.env` file in the working directory is loaded first when present.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a required variable is missing or a value
    /// is invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(path) => debug!(path = %path.display(), "loaded .env file"),
            Err(err) if err.not_found() => {}
            Err(err) => return Err(ConfigError::DotEnv(err.to_string())),
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads configuration through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a required variable is missing or a value
    /// is invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let reader = Reader { lookup };

        let stuck_secs: i64 = reader.parsed_at_least(
            "QUEUE_STUCK_THRESHOLD_SECS",
            QueueConfig::DEFAULT_STUCK_THRESHOLD_SECS,
            1,
        )?;
        let stuck_threshold =
            TimeDelta::try_seconds(stuck_secs).ok_or_else(|| ConfigError::Invalid {
                key: "QUEUE_STUCK_THRESHOLD_SECS",
                value: stuck_secs.to_string(),
                reason: "out of range".to_owned(),
            })?;

        let offset_minutes: i32 = reader.parsed("BUSINESS_UTC_OFFSET_MINUTES", 0)?;
        let business_offset = (offset_minutes.abs() <= MAX_OFFSET_MINUTES)
            .then(|| FixedOffset::east_opt(offset_minutes * 60))
            .flatten()
            .ok_or_else(|| ConfigError::Invalid {
                key: "BUSINESS_UTC_OFFSET_MINUTES",
                value: offset_minutes.to_string(),
                reason: format!("must be within +/-{MAX_OFFSET_MINUTES} minutes"),
            })?;

        Ok(Self {
            database_url: reader.required("DATABASE_URL")?,
            database_pool_size: reader.parsed_at_least(
                "DATABASE_POOL_SIZE",
                DEFAULT_POOL_SIZE,
                1,
            )?,
            generation: GenerationSettings::new(
                reader.required("LLM_MODEL")?,
                reader.required("LLM_API_KEY")?,
                reader.optional("LLM_BASE_URL", DEFAULT_LLM_BASE_URL),
            ),
            queue: QueueConfig {
                stuck_threshold,
                max_claim_attempts: reader.parsed_at_least(
                    "QUEUE_MAX_CLAIM_ATTEMPTS",
                    QueueConfig::DEFAULT_MAX_CLAIM_ATTEMPTS,
                    1,
                )?,
            },
            business_offset,
            daily_enqueue_cron: reader.optional("DAILY_ENQUEUE_CRON", DEFAULT_DAILY_ENQUEUE_CRON),
            drain_cron: reader.optional("DRAIN_CRON", DEFAULT_DRAIN_CRON),
        })
    }
}

struct Reader<F> {
    lookup: F,
}

impl<F> Reader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn value(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|raw| raw.trim().to_owned())
            .filter(|trimmed| !trimmed.is_empty())
    }

    fn required(&self, key: &'static str) -> Result<String, ConfigError> {
        self.value(key).ok_or(ConfigError::Missing(key))
    }

    fn optional(&self, key: &str, default: &str) -> String {
        self.value(key).unwrap_or_else(|| default.to_owned())
    }

    fn parsed<T>(&self, key: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        let Some(raw) = self.value(key) else {
            return Ok(default);
        };
        raw.parse().map_err(|err: T::Err| ConfigError::Invalid {
            key,
            reason: err.to_string(),
            value: raw.clone(),
        })
    }

    fn parsed_at_least<T>(
        &self,
        key: &'static str,
        default: T,
        minimum: T,
    ) -> Result<T, ConfigError>
    where
        T: FromStr + PartialOrd + std::fmt::Display + Copy,
        T::Err: std::fmt::Display,
    {
        let parsed = self.parsed(key, default)?;
        if parsed < minimum {
            return Err(ConfigError::Invalid {
                key,
                value: parsed.to_string(),
                reason: format!("must be at least {minimum}"),
            });
        }
        Ok(parsed)
    }
}
