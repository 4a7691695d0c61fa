//! Conditional claims and global serialization against `PostgreSQL`.

use super::helpers::{pg_queue, test_date};
use eyre::ensure;
use rstest::rstest;
use std::sync::Arc;
use wordsmith::task::{
    adapters::memory::ScriptedGenerationClient,
    domain::{TaskId, TaskStatus, TaskVersion, TriggerSource},
    ports::TaskRepository,
    services::{EnqueuedTask, QueueConfig},
};

const RACERS: usize = 8;

fn only_id(created: &[EnqueuedTask]) -> Result<TaskId, eyre::Report> {
    created
        .first()
        .map(|entry| entry.task_id)
        .ok_or_else(|| eyre::eyre!("enqueue created nothing"))
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn claim_is_fifo_and_serialized() -> Result<(), eyre::Report> {
    let Some(pg) = pg_queue(ScriptedGenerationClient::new(), QueueConfig::default()).await? else {
        return Ok(());
    };
    let date = test_date()?;
    pg.seed_supply(date, &["apple"]).await?;
    let first = only_id(&pg.service.enqueue(date, TriggerSource::Manual).await?)?;
    pg.service.enqueue(date, TriggerSource::Manual).await?;

    let claimed = pg
        .service
        .claim_task()
        .await?
        .ok_or_else(|| eyre::eyre!("nothing claimed"))?;
    let blocked = pg.service.claim_task().await?;

    ensure!(claimed.id() == first, "oldest task should be claimed first");
    ensure!(claimed.status() == TaskStatus::Running, "status {}", claimed.status());
    ensure!(
        claimed.version() == TaskVersion::INITIAL.next(),
        "claim should bump the version"
    );
    ensure!(blocked.is_none(), "second claim must wait for the running task");
    ensure!(pg.tasks.count_running().await? == 1, "exactly one running task");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn stale_version_claim_does_not_apply() -> Result<(), eyre::Report> {
    let Some(pg) = pg_queue(ScriptedGenerationClient::new(), QueueConfig::default()).await? else {
        return Ok(());
    };
    let date = test_date()?;
    pg.seed_supply(date, &["apple"]).await?;
    let id = only_id(&pg.service.enqueue(date, TriggerSource::Manual).await?)?;

    let applied = pg
        .tasks
        .try_claim(id, TaskVersion::INITIAL.next(), chrono::Utc::now())
        .await?;

    ensure!(!applied, "stale version must not claim");
    let stored = pg
        .tasks
        .find_by_id(id)
        .await?
        .ok_or_else(|| eyre::eyre!("task missing"))?;
    ensure!(stored.status() == TaskStatus::Queued, "status {}", stored.status());
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_claims_have_one_winner() -> Result<(), eyre::Report> {
    let Some(pg) = pg_queue(ScriptedGenerationClient::new(), QueueConfig::default()).await? else {
        return Ok(());
    };
    let date = test_date()?;
    pg.seed_supply(date, &["apple"]).await?;
    for _ in 0..3 {
        pg.service.enqueue(date, TriggerSource::Manual).await?;
    }

    let barrier = Arc::new(tokio::sync::Barrier::new(RACERS));
    let mut racers = Vec::with_capacity(RACERS);
    for _ in 0..RACERS {
        let service = Arc::clone(&pg.service);
        let start = Arc::clone(&barrier);
        racers.push(tokio::spawn(async move {
            start.wait().await;
            service.claim_task().await
        }));
    }
    let mut winners = 0_usize;
    for racer in racers {
        if racer.await??.is_some() {
            winners += 1;
        }
    }

    ensure!(winners == 1, "expected one winner, found {winners}");
    ensure!(pg.tasks.count_running().await? == 1, "exactly one running task");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn canceled_tasks_are_skipped() -> Result<(), eyre::Report> {
    let Some(pg) = pg_queue(ScriptedGenerationClient::new(), QueueConfig::default()).await? else {
        return Ok(());
    };
    let date = test_date()?;
    pg.seed_supply(date, &["apple"]).await?;
    let first = only_id(&pg.service.enqueue(date, TriggerSource::Manual).await?)?;
    let second = only_id(&pg.service.enqueue(date, TriggerSource::Manual).await?)?;
    pg.service.cancel(first).await?;

    let claimed = pg
        .service
        .claim_task()
        .await?
        .ok_or_else(|| eyre::eyre!("nothing claimed"))?;
    ensure!(claimed.id() == second, "canceled task must be skipped");
    Ok(())
}
