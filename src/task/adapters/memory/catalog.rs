//! In-memory profile and word supply store.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::task::{
    domain::{BusinessDate, DailyWordSupply, Profile, ProfileId},
    ports::{CatalogRepository, CatalogRepositoryError, CatalogRepositoryResult},
};

/// Thread-safe in-memory catalog repository.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalogRepository {
    state: Arc<RwLock<InMemoryCatalogState>>,
}

#[derive(Debug, Default)]
struct InMemoryCatalogState {
    profiles: Vec<Profile>,
    supplies: HashMap<BusinessDate, DailyWordSupply>,
}

impl InMemoryCatalogRepository {
    /// Creates an empty in-memory catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> CatalogRepositoryResult<RwLockReadGuard<'_, InMemoryCatalogState>> {
        self.state.read().map_err(|err| {
            CatalogRepositoryError::persistence(std::io::Error::other(err.to_string()))
        })
    }

    fn write(&self) -> CatalogRepositoryResult<RwLockWriteGuard<'_, InMemoryCatalogState>> {
        self.state.write().map_err(|err| {
            CatalogRepositoryError::persistence(std::io::Error::other(err.to_string()))
        })
    }
}

#[async_trait]
impl CatalogRepository for InMemoryCatalogRepository {
    async fn list_profiles(&self) -> CatalogRepositoryResult<Vec<Profile>> {
        Ok(self.read()?.profiles.clone())
    }

    async fn find_profile(&self, id: ProfileId) -> CatalogRepositoryResult<Option<Profile>> {
        let state = self.read()?;
        Ok(state
            .profiles
            .iter()
            .find(|profile| profile.id() == id)
            .cloned())
    }

    async fn insert_profile_if_absent(&self, profile: &Profile) -> CatalogRepositoryResult<bool> {
        let mut state = self.write()?;
        if state
            .profiles
            .iter()
            .any(|existing| existing.name() == profile.name() || existing.id() == profile.id())
        {
            return Ok(false);
        }
        state.profiles.push(profile.clone());
        Ok(true)
    }

    async fn find_word_supply(
        &self,
        task_date: BusinessDate,
    ) -> CatalogRepositoryResult<Option<DailyWordSupply>> {
        Ok(self.read()?.supplies.get(&task_date).cloned())
    }

    async fn upsert_word_supply(&self, supply: &DailyWordSupply) -> CatalogRepositoryResult<()> {
        let mut state = self.write()?;
        state.supplies.insert(supply.task_date(), supply.clone());
        Ok(())
    }
}
