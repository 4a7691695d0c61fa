//! When steps for queue BDD scenarios.

use super::world::{QueueWorld, run_async};
use rstest_bdd_macros::when;
use wordsmith::task::{
    domain::{BusinessDate, TriggerSource},
    ports::GenerationSettings,
};

fn enqueue(world: &mut QueueWorld, date: &str, trigger: TriggerSource) -> Result<(), eyre::Report> {
    let task_date = BusinessDate::parse(date)?;
    world.last_enqueue = Some(run_async(world.service.enqueue(task_date, trigger)));
    Ok(())
}

#[when(r#"the cron trigger enqueues for "{date}""#)]
fn cron_enqueue(world: &mut QueueWorld, date: String) -> Result<(), eyre::Report> {
    enqueue(world, &date, TriggerSource::Cron)
}

#[when(r#"a manual enqueue runs for "{date}""#)]
fn manual_enqueue(world: &mut QueueWorld, date: String) -> Result<(), eyre::Report> {
    enqueue(world, &date, TriggerSource::Manual)
}

#[when("the queue is drained")]
fn drain(world: &mut QueueWorld) {
    let settings = GenerationSettings::new("test-model", "test-key", "http://localhost:9");
    world.last_drain = Some(run_async(world.service.process_queue(&settings)));
}
