//! Port contracts for the task queue.
//!
//! Ports define infrastructure-agnostic interfaces used by queue services.

pub mod catalog;
pub mod generation;
pub mod repository;

pub use catalog::{CatalogRepository, CatalogRepositoryError, CatalogRepositoryResult};
pub use generation::{
    CheckpointSink, GeneratedArticle, GenerationClient, GenerationError, GenerationRequest,
    GenerationResult, GenerationSettings,
};
pub use repository::{
    TaskCompletion, TaskFailure, TaskRepository, TaskRepositoryError, TaskRepositoryResult,
};
