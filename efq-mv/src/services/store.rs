//! Material record store
//!
//! Paginated, read-only access to the emission-factor reference table.

use axum::async_trait;
use efq_common::db::materials;
use efq_common::MaterialRecord;
use sqlx::SqlitePool;
use thiserror::Error;

/// Record store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Query failed: {0}")]
    Query(String),
}

impl From<efq_common::Error> for StoreError {
    fn from(err: efq_common::Error) -> Self {
        match err {
            efq_common::Error::Database(e) => StoreError::Query(e.to_string()),
            other => StoreError::Unavailable(other.to_string()),
        }
    }
}

/// Paginated record source
#[async_trait]
pub trait MaterialStore: Send + Sync {
    /// Fetch up to `limit` records starting at `offset`
    ///
    /// Pages are stable across calls within one run: the same offset always
    /// addresses the same records.
    async fn fetch_page(&self, offset: usize, limit: usize)
        -> Result<Vec<MaterialRecord>, StoreError>;
}

/// SQLite-backed store over the `materials_epd` table
#[derive(Clone)]
pub struct SqliteMaterialStore {
    pool: SqlitePool,
}

impl SqliteMaterialStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MaterialStore for SqliteMaterialStore {
    async fn fetch_page(
        &self,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<MaterialRecord>, StoreError> {
        Ok(materials::fetch_page(&self.pool, offset, limit).await?)
    }
}
