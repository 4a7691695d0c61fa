//! Publication, checkpoints, failure and recovery against `PostgreSQL`.

use super::helpers::{pg_queue, settings, test_date};
use chrono::TimeDelta;
use eyre::ensure;
use rstest::rstest;
use serde_json::json;
use std::time::Duration;
use wordsmith::task::{
    adapters::memory::{ScriptedGenerationClient, ScriptedRun},
    domain::{GenerationCheckpoint, TaskId, TaskPayload, TaskStatus, TriggerSource},
    ports::{GenerationError, TaskRepository},
    services::{EnqueuedTask, QueueConfig},
};

fn only_id(created: &[EnqueuedTask]) -> Result<TaskId, eyre::Report> {
    created
        .first()
        .map(|entry| entry.task_id)
        .ok_or_else(|| eyre::eyre!("enqueue created nothing"))
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn drain_publishes_article_in_the_completion_transaction() -> Result<(), eyre::Report> {
    let generator =
        ScriptedGenerationClient::with_runs([ScriptedRun::pick_candidates("Fruit", 1)]);
    let Some(pg) = pg_queue(generator, QueueConfig::default()).await? else {
        return Ok(());
    };
    let date = test_date()?;
    pg.seed_supply(date, &["apple", "pear"]).await?;
    let id = only_id(&pg.service.enqueue(date, TriggerSource::Cron).await?)?;

    let report = pg.service.process_queue(&settings()).await;

    ensure!(report.succeeded == vec![id], "task should succeed: {report:?}");
    let task = pg
        .tasks
        .find_by_id(id)
        .await?
        .ok_or_else(|| eyre::eyre!("task missing"))?;
    ensure!(task.status() == TaskStatus::Succeeded, "status {}", task.status());
    ensure!(task.published_at().is_some(), "publication time missing");
    let articles = pg.tasks.find_articles_by_task(id).await?;
    let article = articles
        .first()
        .ok_or_else(|| eyre::eyre!("article missing"))?;
    ensure!(articles.len() == 1, "expected one article");
    ensure!(article.title() == "Fruit", "title {}", article.title());
    ensure!(
        article.selected_words() == ["apple".to_owned()],
        "selected {:?}",
        article.selected_words()
    );
    let payload = task
        .result_json()
        .cloned()
        .ok_or_else(|| eyre::eyre!("result missing"))?;
    let TaskPayload::Result(summary) = TaskPayload::from_value(payload) else {
        return Err(eyre::eyre!("result is not a summary"));
    };
    ensure!(summary.article_id == article.id(), "summary names another article");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn failure_keeps_checkpoint_for_retry() -> Result<(), eyre::Report> {
    let progress = GenerationCheckpoint::new("review", vec![json!({ "role": "user" })])
        .with_selected_words(vec!["apple".to_owned()]);
    let generator = ScriptedGenerationClient::with_runs([ScriptedRun::failure(
        GenerationError::Transport("connection reset".to_owned()),
    )
    .with_checkpoint(progress.clone())]);
    let Some(pg) = pg_queue(generator, QueueConfig::default()).await? else {
        return Ok(());
    };
    let date = test_date()?;
    pg.seed_supply(date, &["apple", "pear"]).await?;
    let id = only_id(&pg.service.enqueue(date, TriggerSource::Manual).await?)?;

    let report = pg.service.process_queue(&settings()).await;

    ensure!(report.failed == vec![id], "task should fail: {report:?}");
    let failed = pg
        .tasks
        .find_by_id(id)
        .await?
        .ok_or_else(|| eyre::eyre!("task missing"))?;
    ensure!(failed.status() == TaskStatus::Failed, "status {}", failed.status());
    ensure!(
        failed.result_json() == Some(&serde_json::to_value(&progress)?),
        "checkpoint should survive the failure"
    );
    ensure!(
        failed.error_context() == Some(&json!({ "stage": "execution" })),
        "failure context missing"
    );

    pg.service.retry(id).await?;
    let rerun = pg.service.process_queue(&settings()).await;
    ensure!(rerun.succeeded == vec![id], "retry should succeed: {rerun:?}");
    let requests = pg.generator.requests()?;
    ensure!(
        requests.get(1).and_then(|request| request.resume_from.as_ref()) == Some(&progress),
        "retry should resume from the stored checkpoint"
    );
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn stuck_task_is_recovered_and_rerun() -> Result<(), eyre::Report> {
    let config = QueueConfig {
        stuck_threshold: TimeDelta::milliseconds(50),
        ..QueueConfig::default()
    };
    let Some(pg) = pg_queue(ScriptedGenerationClient::new(), config).await? else {
        return Ok(());
    };
    let date = test_date()?;
    pg.seed_supply(date, &["apple"]).await?;
    let id = only_id(&pg.service.enqueue(date, TriggerSource::Manual).await?)?;
    let claimed = pg
        .service
        .claim_task()
        .await?
        .ok_or_else(|| eyre::eyre!("nothing claimed"))?;

    let fresh = pg.service.recover_stuck_tasks().await?;
    ensure!(fresh.busy, "a fresh claim keeps the queue busy");
    ensure!(fresh.recovered.is_empty(), "a fresh claim is not stuck");

    tokio::time::sleep(Duration::from_millis(120)).await;
    let recovery = pg.service.process_queue(&settings()).await;

    ensure!(recovery.recovered == vec![id], "stuck task should be requeued");
    ensure!(recovery.succeeded.is_empty(), "recovery sweep must not claim");
    let requeued = pg
        .tasks
        .find_by_id(id)
        .await?
        .ok_or_else(|| eyre::eyre!("task missing"))?;
    ensure!(requeued.status() == TaskStatus::Queued, "status {}", requeued.status());
    ensure!(requeued.started_at().is_none(), "claim time must be cleared");
    ensure!(
        requeued.version() == claimed.version().next(),
        "requeue bumps the version once"
    );
    ensure!(
        pg.tasks.find_articles_by_task(id).await?.is_empty(),
        "recovery sweep must not publish"
    );

    let rerun = pg.service.process_queue(&settings()).await;
    ensure!(rerun.succeeded == vec![id], "requeued task should run on the next sweep");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn completion_is_rejected_for_tasks_no_longer_running() -> Result<(), eyre::Report> {
    let Some(pg) = pg_queue(ScriptedGenerationClient::new(), QueueConfig::default()).await? else {
        return Ok(());
    };
    let date = test_date()?;
    pg.seed_supply(date, &["apple"]).await?;
    let id = only_id(&pg.service.enqueue(date, TriggerSource::Manual).await?)?;

    let result = pg.service.complete(id, json!({})).await;

    ensure!(result.is_err(), "queued task cannot be completed");
    let stored = pg
        .tasks
        .find_by_id(id)
        .await?
        .ok_or_else(|| eyre::eyre!("task missing"))?;
    ensure!(stored.status() == TaskStatus::Queued, "status {}", stored.status());
    Ok(())
}
