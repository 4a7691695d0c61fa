//! `PostgreSQL` repository for profiles and daily word supplies.

use super::{
    models::{ProfileRow, WordSupplyRow},
    repository::QueuePgPool,
    schema::{daily_word_supplies, generation_profiles},
};
use crate::task::{
    domain::{BusinessDate, DailyWordSupply, Profile, ProfileId, ProfileName},
    ports::{CatalogRepository, CatalogRepositoryError, CatalogRepositoryResult},
};
use async_trait::async_trait;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::upsert::excluded;

/// `PostgreSQL`-backed catalog repository.
#[derive(Debug, Clone)]
pub struct PostgresCatalogRepository {
    pool: QueuePgPool,
}

impl PostgresCatalogRepository {
    /// Creates a new repository from a `PostgreSQL` connection pool.
    #[must_use]
    pub const fn new(pool: QueuePgPool) -> Self {
        Self { pool }
    }

    async fn run_blocking<F, T>(&self, f: F) -> CatalogRepositoryResult<T>
    where
        F: FnOnce(&mut PgConnection) -> CatalogRepositoryResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut connection = pool.get().map_err(CatalogRepositoryError::persistence)?;
            f(&mut connection)
        })
        .await
        .map_err(CatalogRepositoryError::persistence)?
    }
}

#[async_trait]
impl CatalogRepository for PostgresCatalogRepository {
    async fn list_profiles(&self) -> CatalogRepositoryResult<Vec<Profile>> {
        self.run_blocking(|connection| {
            generation_profiles::table
                .order((
                    generation_profiles::created_at.asc(),
                    generation_profiles::name.asc(),
                ))
                .select(ProfileRow::as_select())
                .load::<ProfileRow>(connection)
                .map_err(CatalogRepositoryError::persistence)?
                .into_iter()
                .map(row_to_profile)
                .collect()
        })
        .await
    }

    async fn find_profile(&self, id: ProfileId) -> CatalogRepositoryResult<Option<Profile>> {
        self.run_blocking(move |connection| {
            let row = generation_profiles::table
                .filter(generation_profiles::id.eq(id.into_inner()))
                .select(ProfileRow::as_select())
                .first::<ProfileRow>(connection)
                .optional()
                .map_err(CatalogRepositoryError::persistence)?;
            row.map(row_to_profile).transpose()
        })
        .await
    }

    async fn insert_profile_if_absent(&self, profile: &Profile) -> CatalogRepositoryResult<bool> {
        let row = to_profile_row(profile)?;
        self.run_blocking(move |connection| {
            let inserted = diesel::insert_into(generation_profiles::table)
                .values(&row)
                .on_conflict(generation_profiles::name)
                .do_nothing()
                .execute(connection)
                .map_err(CatalogRepositoryError::persistence)?;
            Ok(inserted == 1)
        })
        .await
    }

    async fn find_word_supply(
        &self,
        task_date: BusinessDate,
    ) -> CatalogRepositoryResult<Option<DailyWordSupply>> {
        self.run_blocking(move |connection| {
            let row = daily_word_supplies::table
                .filter(daily_word_supplies::task_date.eq(task_date.as_naive()))
                .select(WordSupplyRow::as_select())
                .first::<WordSupplyRow>(connection)
                .optional()
                .map_err(CatalogRepositoryError::persistence)?;
            Ok(row.map(|found| {
                DailyWordSupply::new(
                    BusinessDate::from_naive(found.task_date),
                    found.new_words,
                    found.review_words,
                    found.fetched_at,
                )
            }))
        })
        .await
    }

    async fn upsert_word_supply(&self, supply: &DailyWordSupply) -> CatalogRepositoryResult<()> {
        let row = WordSupplyRow {
            task_date: supply.task_date().as_naive(),
            new_words: supply.new_words().to_vec(),
            review_words: supply.review_words().to_vec(),
            fetched_at: supply.fetched_at(),
        };
        self.run_blocking(move |connection| {
            diesel::insert_into(daily_word_supplies::table)
                .values(&row)
                .on_conflict(daily_word_supplies::task_date)
                .do_update()
                .set((
                    daily_word_supplies::new_words.eq(excluded(daily_word_supplies::new_words)),
                    daily_word_supplies::review_words
                        .eq(excluded(daily_word_supplies::review_words)),
                    daily_word_supplies::fetched_at.eq(excluded(daily_word_supplies::fetched_at)),
                ))
                .execute(connection)
                .map_err(CatalogRepositoryError::persistence)?;
            Ok(())
        })
        .await
    }
}

fn to_profile_row(profile: &Profile) -> CatalogRepositoryResult<ProfileRow> {
    Ok(ProfileRow {
        id: profile.id().into_inner(),
        name: profile.name().as_str().to_owned(),
        topic_preference: profile.topic_preference().to_owned(),
        concurrency: i32::try_from(profile.concurrency())
            .map_err(CatalogRepositoryError::persistence)?,
        created_at: profile.created_at(),
    })
}

fn row_to_profile(row: ProfileRow) -> CatalogRepositoryResult<Profile> {
    let name = ProfileName::new(row.name).map_err(CatalogRepositoryError::persistence)?;
    let concurrency =
        u32::try_from(row.concurrency).map_err(CatalogRepositoryError::persistence)?;
    Ok(Profile::from_persisted(
        ProfileId::from_uuid(row.id),
        name,
        row.topic_preference,
        concurrency,
        row.created_at,
    ))
}
