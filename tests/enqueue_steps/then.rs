//! Then steps for queue BDD scenarios.

use super::world::{QueueWorld, run_async};
use rstest_bdd_macros::then;
use wordsmith::task::{
    domain::{BusinessDate, TaskStatus},
    services::TaskQueueError,
};

fn stored_count(world: &QueueWorld, date: &str, expected: usize) -> Result<(), eyre::Report> {
    let task_date = BusinessDate::parse(date)?;
    let stored = run_async(world.service.tasks_for_date(task_date))?;
    if stored.len() != expected {
        return Err(eyre::eyre!(
            "expected {expected} stored tasks, found {}",
            stored.len()
        ));
    }
    Ok(())
}

#[then(r#"{count:usize} task is stored for "{date}""#)]
fn one_task_stored(world: &QueueWorld, count: usize, date: String) -> Result<(), eyre::Report> {
    stored_count(world, &date, count)
}

#[then(r#"{count:usize} tasks are stored for "{date}""#)]
fn tasks_stored(world: &QueueWorld, count: usize, date: String) -> Result<(), eyre::Report> {
    stored_count(world, &date, count)
}

#[then("the last enqueue created {count:usize} tasks")]
fn last_enqueue_created(world: &QueueWorld, count: usize) -> Result<(), eyre::Report> {
    let created = world
        .last_enqueue
        .as_ref()
        .ok_or_else(|| eyre::eyre!("missing enqueue result"))?
        .as_ref()
        .map_err(|err| eyre::eyre!("enqueue failed: {err}"))?;
    if created.len() != count {
        return Err(eyre::eyre!(
            "expected {count} created tasks, found {}",
            created.len()
        ));
    }
    Ok(())
}

#[then("the enqueue fails because the word supply is missing")]
fn enqueue_fails_without_supply(world: &QueueWorld) -> Result<(), eyre::Report> {
    let result = world
        .last_enqueue
        .as_ref()
        .ok_or_else(|| eyre::eyre!("missing enqueue result"))?;
    if !matches!(result, Err(TaskQueueError::WordSupplyMissing(_))) {
        return Err(eyre::eyre!("expected WordSupplyMissing, got {result:?}"));
    }
    Ok(())
}

#[then("the drain reports {succeeded:usize} succeeded and {failed:usize} failed")]
fn drain_reports(world: &QueueWorld, succeeded: usize, failed: usize) -> Result<(), eyre::Report> {
    let report = world
        .last_drain
        .as_ref()
        .ok_or_else(|| eyre::eyre!("queue was not drained"))?;
    if report.succeeded.len() != succeeded || report.failed.len() != failed {
        return Err(eyre::eyre!("unexpected drain report {report:?}"));
    }
    Ok(())
}

#[then(r#"every task for "{date}" has status "{status}""#)]
fn every_task_has_status(
    world: &QueueWorld,
    date: String,
    status: String,
) -> Result<(), eyre::Report> {
    let expected = TaskStatus::try_from(status.as_str())
        .map_err(|err| eyre::eyre!("invalid expected status in scenario: {err}"))?;
    let task_date = BusinessDate::parse(&date)?;
    let stored = run_async(world.service.tasks_for_date(task_date))?;
    if let Some(task) = stored.iter().find(|task| task.status() != expected) {
        return Err(eyre::eyre!(
            "task {} is {}, expected {}",
            task.id(),
            task.status(),
            expected
        ));
    }
    Ok(())
}
