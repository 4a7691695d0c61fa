//! Shared test helpers for `PostgreSQL` integration tests.

use chrono::Utc;
use diesel::connection::SimpleConnection;
use mockable::DefaultClock;
use std::sync::{Arc, OnceLock};
use tokio::sync::{Mutex, MutexGuard};
use wordsmith::task::{
    adapters::{
        memory::ScriptedGenerationClient,
        postgres::{PostgresCatalogRepository, PostgresTaskRepository, QueuePgPool, build_pool},
    },
    domain::{BusinessDate, DailyWordSupply},
    ports::{CatalogRepository, GenerationSettings},
    services::{QueueConfig, TaskQueueService},
};

/// Environment variable naming the scratch database.
pub const DATABASE_URL_ENV: &str = "WORDSMITH_TEST_DATABASE_URL";

/// SQL that creates the queue schema.
pub const CREATE_SCHEMA_SQL: &str =
    include_str!("../../migrations/2026-10-01-000000_create_generation_tables/up.sql");

/// SQL that drops the queue schema.
pub const DROP_SCHEMA_SQL: &str =
    include_str!("../../migrations/2026-10-01-000000_create_generation_tables/down.sql");

static DATABASE_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

/// Queue service wired to the `PostgreSQL` adapters.
pub type PgQueueService = TaskQueueService<
    PostgresTaskRepository,
    PostgresCatalogRepository,
    ScriptedGenerationClient,
    DefaultClock,
>;

/// Freshly migrated database plus a service over it.
///
/// Holds the process-wide database lock for its lifetime.
pub struct PgQueue {
    pub service: Arc<PgQueueService>,
    pub tasks: Arc<PostgresTaskRepository>,
    pub catalog: Arc<PostgresCatalogRepository>,
    pub generator: Arc<ScriptedGenerationClient>,
    _lock: MutexGuard<'static, ()>,
}

impl PgQueue {
    /// Stores the word supply for `task_date`.
    ///
    /// # Errors
    ///
    /// Returns an error if the upsert fails.
    pub async fn seed_supply(
        &self,
        task_date: BusinessDate,
        new_words: &[&str],
    ) -> Result<(), eyre::Report> {
        let words = new_words.iter().map(|&word| word.to_owned());
        let supply = DailyWordSupply::new(task_date, words, Vec::new(), Utc::now());
        self.catalog.upsert_word_supply(&supply).await?;
        Ok(())
    }
}

/// Connects to the scratch database and resets its schema.
///
/// Returns `None` when no database is configured.
///
/// # Errors
///
/// Returns an error if the pool cannot be built or migration fails.
pub async fn pg_queue(
    generator: ScriptedGenerationClient,
    config: QueueConfig,
) -> Result<Option<PgQueue>, eyre::Report> {
    let Ok(url) = std::env::var(DATABASE_URL_ENV) else {
        return Ok(None);
    };
    let lock = DATABASE_LOCK.get_or_init(|| Mutex::new(())).lock().await;
    let pool = build_pool(&url, 8)?;
    reset_schema(pool.clone()).await?;

    let tasks = Arc::new(PostgresTaskRepository::new(pool.clone()));
    let catalog = Arc::new(PostgresCatalogRepository::new(pool));
    let generator = Arc::new(generator);
    let service = Arc::new(
        TaskQueueService::new(
            Arc::clone(&tasks),
            Arc::clone(&catalog),
            Arc::clone(&generator),
            Arc::new(DefaultClock),
        )
        .with_config(config),
    );
    Ok(Some(PgQueue {
        service,
        tasks,
        catalog,
        generator,
        _lock: lock,
    }))
}

async fn reset_schema(pool: QueuePgPool) -> Result<(), eyre::Report> {
    tokio::task::spawn_blocking(move || {
        let mut connection = pool.get()?;
        connection.batch_execute(DROP_SCHEMA_SQL)?;
        connection.batch_execute(CREATE_SCHEMA_SQL)?;
        Ok::<(), eyre::Report>(())
    })
    .await?
}

/// Business date shared by the `PostgreSQL` tests.
///
/// # Errors
///
/// Returns an error if the literal is not a valid date.
pub fn test_date() -> Result<BusinessDate, eyre::Report> {
    Ok(BusinessDate::parse("2026-10-19")?)
}

/// Generation settings that no test ever sends over the network.
#[must_use]
pub fn settings() -> GenerationSettings {
    GenerationSettings::new("test-model", "test-key", "http://localhost:9")
}
