//! End-to-end queue flows over the in-memory adapters.

use super::helpers::{QueueFixture, owned, queue, settings, test_date};
use chrono::FixedOffset;
use rstest::rstest;
use std::collections::HashSet;
use std::sync::Arc;
use wordsmith::{
    driver::QueueDriver,
    task::{
        adapters::memory::{ScriptedGenerationClient, ScriptedRun},
        domain::{TaskPayload, TaskStatus, TriggerSource},
    },
};

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn daily_run_gives_each_profile_distinct_words() -> Result<(), eyre::Report> {
    let fixture = QueueFixture::with_generator(ScriptedGenerationClient::with_runs([
        ScriptedRun::pick_candidates("Tech words", 2),
        ScriptedRun::pick_candidates("Food words", 2),
    ]));
    let date = test_date()?;
    fixture
        .seed_supply(date, &["apple", "pear", "fig"], &["plum", "apple"])
        .await?;
    fixture.add_profile("Tech", "technology").await?;
    fixture.add_profile("Food", "cooking").await?;

    let created = fixture.service.enqueue(date, TriggerSource::Cron).await?;
    eyre::ensure!(created.len() == 2, "expected one task per profile");
    let report = fixture.service.process_queue(&settings()).await;
    eyre::ensure!(report.succeeded.len() == 2, "both tasks should succeed");

    let mut seen = HashSet::new();
    for entry in &created {
        let articles = fixture.service.articles_for_task(entry.task_id).await?;
        let article = articles
            .first()
            .ok_or_else(|| eyre::eyre!("task {} published nothing", entry.task_id))?;
        for word in article.selected_words() {
            eyre::ensure!(seen.insert(word.clone()), "word {word} was taught twice");
        }
    }
    eyre::ensure!(
        seen == owned(&["apple", "pear", "fig", "plum"]).into_iter().collect(),
        "unexpected word coverage: {seen:?}"
    );
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn rerunning_cron_after_drain_is_a_no_op(queue: QueueFixture) -> Result<(), eyre::Report> {
    let date = test_date()?;
    queue.seed_supply(date, &["apple"], &[]).await?;

    queue.service.enqueue(date, TriggerSource::Cron).await?;
    queue.service.process_queue(&settings()).await;
    let again = queue.service.enqueue(date, TriggerSource::Cron).await?;

    eyre::ensure!(again.is_empty(), "cron must not enqueue a second task");
    let tasks = queue.service.tasks_for_date(date).await?;
    eyre::ensure!(tasks.len() == 1, "expected a single task, found {}", tasks.len());
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn manual_rerun_fails_once_words_run_out(queue: QueueFixture) -> Result<(), eyre::Report> {
    let date = test_date()?;
    queue.seed_supply(date, &["apple", "pear"], &[]).await?;

    queue.service.enqueue(date, TriggerSource::Cron).await?;
    let manual = queue.service.enqueue(date, TriggerSource::Manual).await?;
    let report = queue.service.process_queue(&settings()).await;

    let manual_id = manual
        .first()
        .map(|entry| entry.task_id)
        .ok_or_else(|| eyre::eyre!("manual enqueue created nothing"))?;
    eyre::ensure!(report.failed == vec![manual_id], "manual task should fail");
    let failed = queue
        .service
        .find_task(manual_id)
        .await?
        .ok_or_else(|| eyre::eyre!("manual task missing"))?;
    eyre::ensure!(failed.status() == TaskStatus::Failed, "status {}", failed.status());
    eyre::ensure!(
        failed.error_message() == Some("all words used today (2026-10-19)"),
        "unexpected error message {:?}",
        failed.error_message()
    );
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn driver_runs_enqueue_and_drain_together(queue: QueueFixture) -> Result<(), eyre::Report> {
    let date = test_date()?;
    queue.seed_supply(date, &["apple"], &[]).await?;
    let offset = FixedOffset::east_opt(0).ok_or_else(|| eyre::eyre!("invalid offset"))?;
    let driver = QueueDriver::new(Arc::clone(&queue.service), settings(), offset);

    let run = driver.run_daily(date).await?;

    let drain = run.drain.ok_or_else(|| eyre::eyre!("drain was skipped"))?;
    eyre::ensure!(drain.succeeded.len() == 1, "the default profile task should run");
    let task_id = run
        .created
        .first()
        .map(|entry| entry.task_id)
        .ok_or_else(|| eyre::eyre!("nothing enqueued"))?;
    let task = queue
        .service
        .find_task(task_id)
        .await?
        .ok_or_else(|| eyre::eyre!("task missing"))?;
    let payload = task
        .result_json()
        .cloned()
        .ok_or_else(|| eyre::eyre!("no result stored"))?;
    let TaskPayload::Result(summary) = TaskPayload::from_value(payload) else {
        return Err(eyre::eyre!("stored payload is not a result summary"));
    };
    eyre::ensure!(summary.selected_words == owned(&["apple"]), "selection mismatch");
    eyre::ensure!(
        queue.generator.requests()?.len() == 1,
        "generation should run once"
    );
    Ok(())
}
