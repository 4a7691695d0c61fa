//! Given steps for queue BDD scenarios.

use super::world::{QueueWorld, run_async};
use chrono::Utc;
use mockable::DefaultClock;
use rstest_bdd_macros::given;
use wordsmith::task::{
    domain::{BusinessDate, DailyWordSupply, Profile, ProfileName},
    ports::CatalogRepository,
};

#[given(r#"a word supply for "{date}" with new words "{words}""#)]
fn word_supply(world: &mut QueueWorld, date: String, words: String) -> Result<(), eyre::Report> {
    let task_date = BusinessDate::parse(&date)?;
    let new_words: Vec<String> = words.split(',').map(|word| word.trim().to_owned()).collect();
    let supply = DailyWordSupply::new(task_date, new_words, Vec::new(), Utc::now());
    run_async(world.catalog.upsert_word_supply(&supply))?;
    Ok(())
}

#[given(r#"a profile "{name}" with topic "{topic}""#)]
fn profile(world: &mut QueueWorld, name: String, topic: String) -> Result<(), eyre::Report> {
    let profile = Profile::new(ProfileName::new(name)?, topic, 1, &DefaultClock)?;
    let inserted = run_async(world.catalog.insert_profile_if_absent(&profile))?;
    eyre::ensure!(inserted, "profile already present in scenario world");
    Ok(())
}
