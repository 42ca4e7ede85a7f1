//! Persistence gateway.
//!
//! Every call is one transaction. Natural-key conflict clauses are what keep concurrent runs
//! correct; nothing here takes external locks.

mod geo_trends;
mod hashflags;
mod locations;
pub mod memory;
mod trends;

use async_trait::async_trait;
use std::collections::HashSet;
use thiserror::Error;

use crate::models::{GeoBatchInsert, GeoTrendRecord, HashflagRecord, LocationRecord, TrendRecord};
use crate::util::db::Db;

pub use memory::MemoryStore;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("store error: {0}")]
    Store(String),
}

#[async_trait]
pub trait TrendStore: Send + Sync {
    /// Insert-if-absent by `place_id`. Returns rows actually inserted.
    async fn insert_if_absent_locations(
        &self,
        batch: &[LocationRecord],
    ) -> Result<u64, PersistenceError>;

    /// Trend names already stored for `location_id`.
    async fn existing_trend_names(
        &self,
        location_id: &str,
    ) -> Result<HashSet<String>, PersistenceError>;

    /// Insert-if-absent by (`name`, `location_id`); every row is written under `location_id`.
    /// Returns rows actually inserted.
    async fn insert_if_absent_trends(
        &self,
        batch: &[TrendRecord],
        location_id: &str,
    ) -> Result<u64, PersistenceError>;

    /// Upsert-with-overwrite by hashtag, refreshing `last_updated`. Returns rows written.
    async fn upsert_hashflags(&self, batch: &[HashflagRecord]) -> Result<u64, PersistenceError>;

    /// Parent batch row, then its keywords, in one transaction. A failed keyword insert
    /// rolls the parent back.
    async fn insert_geo_trend_batch(
        &self,
        batch: &GeoTrendRecord,
    ) -> Result<GeoBatchInsert, PersistenceError>;
}

#[async_trait]
impl TrendStore for Db {
    async fn insert_if_absent_locations(
        &self,
        batch: &[LocationRecord],
    ) -> Result<u64, PersistenceError> {
        self.insert_locations(batch).await
    }

    async fn existing_trend_names(
        &self,
        location_id: &str,
    ) -> Result<HashSet<String>, PersistenceError> {
        self.trend_names_for_location(location_id).await
    }

    async fn insert_if_absent_trends(
        &self,
        batch: &[TrendRecord],
        location_id: &str,
    ) -> Result<u64, PersistenceError> {
        self.insert_trends(batch, location_id).await
    }

    async fn upsert_hashflags(&self, batch: &[HashflagRecord]) -> Result<u64, PersistenceError> {
        self.upsert_hashflag_rows(batch).await
    }

    async fn insert_geo_trend_batch(
        &self,
        batch: &GeoTrendRecord,
    ) -> Result<GeoBatchInsert, PersistenceError> {
        self.insert_geo_batch(batch).await
    }
}
