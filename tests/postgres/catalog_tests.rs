//! Profile bootstrap and word supply persistence.

use super::helpers::{pg_queue, test_date};
use chrono::Utc;
use eyre::ensure;
use mockable::DefaultClock;
use rstest::rstest;
use wordsmith::task::{
    adapters::memory::ScriptedGenerationClient,
    domain::{DailyWordSupply, Profile, ProfileName, TaskStatus, TriggerSource},
    ports::{CatalogRepository, TaskRepository},
    services::{QueueConfig, TaskQueueError},
};

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn enqueue_bootstraps_default_profile_once() -> Result<(), eyre::Report> {
    let Some(pg) = pg_queue(ScriptedGenerationClient::new(), QueueConfig::default()).await? else {
        return Ok(());
    };
    let date = test_date()?;
    pg.seed_supply(date, &["apple"]).await?;

    pg.service.enqueue(date, TriggerSource::Manual).await?;
    pg.service.enqueue(date, TriggerSource::Manual).await?;

    let profiles = pg.catalog.list_profiles().await?;
    ensure!(profiles.len() == 1, "expected one profile, found {}", profiles.len());
    ensure!(
        profiles.first().map(|profile| profile.name().as_str()) == Some(Profile::DEFAULT_NAME),
        "bootstrap profile should use the default name"
    );
    let duplicate = Profile::default_profile(&DefaultClock);
    ensure!(
        !pg.catalog.insert_profile_if_absent(&duplicate).await?,
        "a second default profile must be skipped"
    );
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn word_supply_upsert_replaces_the_day() -> Result<(), eyre::Report> {
    let Some(pg) = pg_queue(ScriptedGenerationClient::new(), QueueConfig::default()).await? else {
        return Ok(());
    };
    let date = test_date()?;
    pg.seed_supply(date, &["apple"]).await?;
    let replacement = DailyWordSupply::new(
        date,
        vec!["pear".to_owned()],
        vec!["fig".to_owned()],
        Utc::now(),
    );
    pg.catalog.upsert_word_supply(&replacement).await?;

    let stored = pg
        .catalog
        .find_word_supply(date)
        .await?
        .ok_or_else(|| eyre::eyre!("supply missing"))?;
    ensure!(stored.new_words() == ["pear".to_owned()], "new words not replaced");
    ensure!(stored.review_words() == ["fig".to_owned()], "review words not replaced");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn cron_enqueue_is_idempotent_in_storage() -> Result<(), eyre::Report> {
    let Some(pg) = pg_queue(ScriptedGenerationClient::new(), QueueConfig::default()).await? else {
        return Ok(());
    };
    let date = test_date()?;
    pg.seed_supply(date, &["apple"]).await?;
    let tech = Profile::new(ProfileName::new("Tech")?, "technology", 1, &DefaultClock)?;
    pg.catalog.insert_profile_if_absent(&tech).await?;

    let first = pg.service.enqueue(date, TriggerSource::Cron).await?;
    let second = pg.service.enqueue(date, TriggerSource::Cron).await?;

    ensure!(first.len() == 1, "first cron run should create one task");
    ensure!(second.is_empty(), "second cron run must create nothing");
    let stored = pg.tasks.find_by_date(date).await?;
    let task = stored
        .first()
        .ok_or_else(|| eyre::eyre!("task not stored"))?;
    ensure!(stored.len() == 1, "expected one stored task");
    ensure!(task.status() == TaskStatus::Queued, "status {}", task.status());
    ensure!(task.trigger_source() == TriggerSource::Cron, "trigger mismatch");
    ensure!(task.profile_id() == tech.id(), "profile mismatch");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn enqueue_requires_a_word_supply() -> Result<(), eyre::Report> {
    let Some(pg) = pg_queue(ScriptedGenerationClient::new(), QueueConfig::default()).await? else {
        return Ok(());
    };
    let date = test_date()?;

    let result = pg.service.enqueue(date, TriggerSource::Cron).await;

    ensure!(
        matches!(result, Err(TaskQueueError::WordSupplyMissing(_))),
        "expected a missing supply error, got {result:?}"
    );
    ensure!(pg.tasks.find_by_date(date).await?.is_empty(), "nothing may be stored");
    Ok(())
}
