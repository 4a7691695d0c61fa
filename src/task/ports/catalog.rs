//! Repository port for the reference data the queue reads: generation
//! profiles and daily word supplies.

use crate::task::domain::{BusinessDate, DailyWordSupply, Profile, ProfileId};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for catalog repository operations.
pub type CatalogRepositoryResult<T> = Result<T, CatalogRepositoryError>;

/// Profile and word supply lookup contract.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    /// Returns all profiles, oldest first.
    async fn list_profiles(&self) -> CatalogRepositoryResult<Vec<Profile>>;

    /// Finds a profile by identifier.
    async fn find_profile(&self, id: ProfileId) -> CatalogRepositoryResult<Option<Profile>>;

    /// Stores a profile unless one with the same name exists.
    ///
    /// Returns `false` when the insert was skipped because of a conflict.
    async fn insert_profile_if_absent(&self, profile: &Profile) -> CatalogRepositoryResult<bool>;

    /// Finds the word supply for a business date.
    async fn find_word_supply(
        &self,
        task_date: BusinessDate,
    ) -> CatalogRepositoryResult<Option<DailyWordSupply>>;

    /// Creates or replaces the word supply for its business date.
    async fn upsert_word_supply(&self, supply: &DailyWordSupply) -> CatalogRepositoryResult<()>;
}

/// Errors returned by catalog repository implementations.
#[derive(Debug, Clone, Error)]
pub enum CatalogRepositoryError {
    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl CatalogRepositoryError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
