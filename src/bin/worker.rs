//! Runs the article generation queue on a schedule.
//!
//! Usage:
//!
//! ```text
//! wordsmith-worker
//! ```
//!
//! Configuration comes from the environment (see
//! [`wordsmith::config::WorkerConfig`]). The worker enqueues the current
//! business date on `DAILY_ENQUEUE_CRON`, drains the queue on `DRAIN_CRON`,
//! and runs one drain at start-up so tasks left by a previous process are
//! picked up immediately.

use mockable::DefaultClock;
use std::sync::Arc;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};
use wordsmith::{
    config::WorkerConfig,
    driver::QueueDriver,
    task::{
        adapters::{
            llm::ChatGenerationClient,
            postgres::{PostgresCatalogRepository, PostgresTaskRepository, build_pool},
        },
        services::TaskQueueService,
    },
    telemetry,
};

/// Boxed error type for the main result.
type BoxError = Box<dyn std::error::Error + Send + Sync>;

type Driver = QueueDriver<
    PostgresTaskRepository,
    PostgresCatalogRepository,
    ChatGenerationClient,
    DefaultClock,
>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    telemetry::init_tracing();
    let config = WorkerConfig::from_env()?;
    info!(model = %config.generation.model, "starting wordsmith worker");

    let pool = build_pool(&config.database_url, config.database_pool_size)?;
    let service = TaskQueueService::new(
        Arc::new(PostgresTaskRepository::new(pool.clone())),
        Arc::new(PostgresCatalogRepository::new(pool)),
        Arc::new(ChatGenerationClient::new()),
        Arc::new(DefaultClock),
    )
    .with_config(config.queue);
    let driver: Arc<Driver> = Arc::new(QueueDriver::new(
        Arc::new(service),
        config.generation.clone(),
        config.business_offset,
    ));

    let mut scheduler = start_scheduler(&config, &driver).await?;

    if let Some(report) = driver.drain().await {
        info!(
            recovered = report.recovered.len(),
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            "start-up drain finished"
        );
    }

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    scheduler.shutdown().await?;
    Ok(())
}

async fn start_scheduler(
    config: &WorkerConfig,
    driver: &Arc<Driver>,
) -> Result<JobScheduler, BoxError> {
    let scheduler = JobScheduler::new().await?;

    let daily_driver = Arc::clone(driver);
    let daily_job = Job::new_async(config.daily_enqueue_cron.as_str(), move |_uuid, _lock| {
        let job_driver = Arc::clone(&daily_driver);
        Box::pin(async move {
            if let Err(err) = job_driver.run_today().await {
                error!(error = %err, "daily enqueue failed");
            }
        })
    })?;
    scheduler.add(daily_job).await?;

    let drain_driver = Arc::clone(driver);
    let drain_job = Job::new_async(config.drain_cron.as_str(), move |_uuid, _lock| {
        let job_driver = Arc::clone(&drain_driver);
        Box::pin(async move {
            if job_driver.drain().await.is_none() {
                info!("previous drain still running");
            }
        })
    })?;
    scheduler.add(drain_job).await?;

    scheduler.start().await?;
    info!(
        daily = %config.daily_enqueue_cron,
        drain = %config.drain_cron,
        "scheduled jobs started"
    );
    Ok(scheduler)
}
