//! Shared fixtures for queue service tests.

use crate::task::{
    adapters::memory::{
        InMemoryCatalogRepository, InMemoryTaskRepository, ScriptedGenerationClient,
    },
    domain::{BusinessDate, DailyWordSupply, Profile, ProfileName},
    ports::{CatalogRepository, GenerationSettings},
    services::TaskQueueService,
};
use chrono::{DateTime, Local, TimeDelta, TimeZone, Utc};
use mockable::Clock;
use rstest::fixture;
use std::sync::{Arc, Mutex};

/// Clock that only moves when told to.
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn advance(&self, delta: TimeDelta) {
        let mut now = self.now.lock().expect("clock lock");
        *now += delta;
    }
}

impl Clock for FixedClock {
    fn local(&self) -> DateTime<Local> {
        self.utc().with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        *self.now.lock().expect("clock lock")
    }
}

pub type TestService = TaskQueueService<
    InMemoryTaskRepository,
    InMemoryCatalogRepository,
    ScriptedGenerationClient,
    FixedClock,
>;

/// Queue service plus handles on each of its collaborators.
pub struct Harness {
    pub service: TestService,
    pub tasks: Arc<InMemoryTaskRepository>,
    pub catalog: Arc<InMemoryCatalogRepository>,
    pub generator: Arc<ScriptedGenerationClient>,
    pub clock: Arc<FixedClock>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_generator(ScriptedGenerationClient::new())
    }

    pub fn with_generator(generator: ScriptedGenerationClient) -> Self {
        let tasks = Arc::new(InMemoryTaskRepository::new());
        let catalog = Arc::new(InMemoryCatalogRepository::new());
        let generator = Arc::new(generator);
        let clock = Arc::new(FixedClock::at(start()));
        let service = TaskQueueService::new(
            Arc::clone(&tasks),
            Arc::clone(&catalog),
            Arc::clone(&generator),
            Arc::clone(&clock),
        );
        Self {
            service,
            tasks,
            catalog,
            generator,
            clock,
        }
    }

    pub async fn seed_supply(&self, new_words: &[&str], review_words: &[&str]) {
        self.seed_supply_on(date(), new_words, review_words).await;
    }

    pub async fn seed_supply_on(
        &self,
        task_date: BusinessDate,
        new_words: &[&str],
        review_words: &[&str],
    ) {
        let supply = DailyWordSupply::new(
            task_date,
            words(new_words),
            words(review_words),
            self.clock.utc(),
        );
        self.catalog
            .upsert_word_supply(&supply)
            .await
            .expect("word supply should be stored");
    }

    pub async fn add_profile(&self, name: &str, topic: &str) -> Profile {
        let profile = Profile::new(
            ProfileName::new(name).expect("valid profile name"),
            topic,
            1,
            &*self.clock,
        )
        .expect("valid profile");
        let inserted = self
            .catalog
            .insert_profile_if_absent(&profile)
            .await
            .expect("profile insert should succeed");
        assert!(inserted, "profile names in tests are unique");
        profile
    }
}

#[fixture]
pub fn harness() -> Harness {
    Harness::new()
}

pub fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 19, 6, 0, 0)
        .single()
        .expect("valid start instant")
}

pub fn date() -> BusinessDate {
    BusinessDate::parse("2026-10-19").expect("valid business date")
}

pub fn next_date() -> BusinessDate {
    BusinessDate::parse("2026-10-20").expect("valid business date")
}

pub fn words(values: &[&str]) -> Vec<String> {
    values.iter().map(|&value| value.to_owned()).collect()
}

pub fn settings() -> GenerationSettings {
    GenerationSettings::new("test-model", "test-key", "http://localhost:9")
}
