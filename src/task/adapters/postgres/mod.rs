//! `PostgreSQL` adapters for task queue persistence.

mod catalog;
mod models;
mod repository;
mod schema;

pub use catalog::PostgresCatalogRepository;
pub use repository::{PostgresTaskRepository, QueuePgPool};

use diesel::pg::PgConnection;
use diesel::r2d2::{ConnectionManager, Pool, PoolError};

/// Builds a connection pool for the queue adapters.
///
/// # Errors
///
/// Returns [`PoolError`] when the initial connections cannot be established.
pub fn build_pool(database_url: &str, max_size: u32) -> Result<QueuePgPool, PoolError> {
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    Pool::builder().max_size(max_size).build(manager)
}
