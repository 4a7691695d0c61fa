//! In-memory adapters for every task queue port.
//!
//! Used by unit tests and by local runs that do not need a database.

mod catalog;
mod generation;
mod task;

pub use catalog::InMemoryCatalogRepository;
pub use generation::{ScriptedGenerationClient, ScriptedRun};
pub use task::InMemoryTaskRepository;
