//! Shared world state for queue BDD scenarios.

use std::sync::Arc;

use mockable::DefaultClock;
use rstest::fixture;
use wordsmith::task::{
    adapters::memory::{
        InMemoryCatalogRepository, InMemoryTaskRepository, ScriptedGenerationClient,
    },
    services::{DrainReport, EnqueuedTask, TaskQueueError, TaskQueueService},
};

/// Service type used by the BDD world.
pub type ScenarioQueue = TaskQueueService<
    InMemoryTaskRepository,
    InMemoryCatalogRepository,
    ScriptedGenerationClient,
    DefaultClock,
>;

/// Scenario world for queue behaviour tests.
pub struct QueueWorld {
    pub service: ScenarioQueue,
    pub catalog: Arc<InMemoryCatalogRepository>,
    pub last_enqueue: Option<Result<Vec<EnqueuedTask>, TaskQueueError>>,
    pub last_drain: Option<DrainReport>,
}

impl QueueWorld {
    /// Creates a world with empty storage.
    #[must_use]
    pub fn new() -> Self {
        let catalog = Arc::new(InMemoryCatalogRepository::new());
        let service = TaskQueueService::new(
            Arc::new(InMemoryTaskRepository::new()),
            Arc::clone(&catalog),
            Arc::new(ScriptedGenerationClient::new()),
            Arc::new(DefaultClock),
        );

        Self {
            service,
            catalog,
            last_enqueue: None,
            last_drain: None,
        }
    }
}

impl Default for QueueWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixture that creates a new scenario world.
#[fixture]
pub fn world() -> QueueWorld {
    QueueWorld::default()
}

/// Runs an async operation within sync step definitions.
pub fn run_async<T>(future: impl std::future::Future<Output = T>) -> T {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}
