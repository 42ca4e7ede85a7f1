//! In-process `TrendStore` with the same conflict rules as the Postgres tables.
//!
//! Backs `--dry-run` and the pipeline tests. Text containing NUL is rejected the way Postgres
//! rejects it, which also gives callers a way to provoke a failed write.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use super::{PersistenceError, TrendStore};
use crate::dedup::{select_new_trends, trend_key, TrendKey};
use crate::models::{GeoBatchInsert, GeoTrendRecord, HashflagRecord, LocationRecord, TrendRecord};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredHashflag {
    pub record: HashflagRecord,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Tables {
    locations: BTreeMap<String, LocationRecord>,
    trends: Vec<TrendRecord>,
    trend_keys: HashSet<TrendKey>,
    hashflags: BTreeMap<String, StoredHashflag>,
    geo_batches: Vec<(i64, GeoTrendRecord)>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

fn check_text<'a>(values: impl IntoIterator<Item = &'a str>) -> Result<(), PersistenceError> {
    match values.into_iter().find(|v| v.contains('\0')) {
        Some(bad) => Err(PersistenceError::Store(format!(
            "invalid byte sequence 0x00 in {:?}",
            bad.replace('\0', "\\0")
        ))),
        None => Ok(()),
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>, PersistenceError> {
        self.tables
            .lock()
            .map_err(|_| PersistenceError::Store("memory store lock poisoned".into()))
    }

    pub fn locations(&self) -> Vec<LocationRecord> {
        self.tables()
            .map(|t| t.locations.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn trends(&self) -> Vec<TrendRecord> {
        self.tables().map(|t| t.trends.clone()).unwrap_or_default()
    }

    pub fn trends_for(&self, location_id: &str) -> Vec<TrendRecord> {
        self.trends()
            .into_iter()
            .filter(|t| t.location_id == location_id)
            .collect()
    }

    pub fn hashflags(&self) -> Vec<StoredHashflag> {
        self.tables()
            .map(|t| t.hashflags.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn geo_batches(&self) -> Vec<(i64, GeoTrendRecord)> {
        self.tables().map(|t| t.geo_batches.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl TrendStore for MemoryStore {
    async fn insert_if_absent_locations(
        &self,
        batch: &[LocationRecord],
    ) -> Result<u64, PersistenceError> {
        check_text(batch.iter().flat_map(|l| [l.id.as_str(), l.name.as_str()]))?;
        let mut t = self.tables()?;
        let mut inserted = 0;
        for loc in batch {
            if !t.locations.contains_key(&loc.id) {
                t.locations.insert(loc.id.clone(), loc.clone());
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    async fn existing_trend_names(
        &self,
        location_id: &str,
    ) -> Result<HashSet<String>, PersistenceError> {
        let t = self.tables()?;
        Ok(t.trend_keys
            .iter()
            .filter(|(_, loc)| loc == location_id)
            .map(|(name, _)| name.clone())
            .collect())
    }

    async fn insert_if_absent_trends(
        &self,
        batch: &[TrendRecord],
        location_id: &str,
    ) -> Result<u64, PersistenceError> {
        check_text(batch.iter().flat_map(|r| {
            [
                r.name.as_str(),
                r.description.as_str(),
                r.domain_context.as_str(),
                r.url.as_str(),
                r.impression_id.as_str(),
            ]
            .into_iter()
            .chain(r.related_terms.iter().map(String::as_str))
        }))?;
        let mut t = self.tables()?;
        if !t.locations.contains_key(location_id) {
            return Err(PersistenceError::Store(format!(
                "location {location_id} does not exist"
            )));
        }
        let rows: Vec<TrendRecord> = batch
            .iter()
            .cloned()
            .map(|mut r| {
                r.location_id = location_id.to_string();
                r
            })
            .collect();
        let fresh = select_new_trends(&t.trend_keys, rows);
        let inserted = fresh.len() as u64;
        for row in fresh {
            t.trend_keys.insert(trend_key(&row));
            t.trends.push(row);
        }
        Ok(inserted)
    }

    async fn upsert_hashflags(&self, batch: &[HashflagRecord]) -> Result<u64, PersistenceError> {
        check_text(batch.iter().flat_map(|h| {
            [Some(h.hashtag.as_str()), h.asset_url.as_deref()]
                .into_iter()
                .flatten()
        }))?;
        let mut t = self.tables()?;
        let now = Utc::now();
        let mut written = HashSet::new();
        for flag in batch {
            t.hashflags.insert(
                flag.hashtag.clone(),
                StoredHashflag {
                    record: flag.clone(),
                    last_updated: now,
                },
            );
            written.insert(flag.hashtag.as_str());
        }
        Ok(written.len() as u64)
    }

    async fn insert_geo_trend_batch(
        &self,
        batch: &GeoTrendRecord,
    ) -> Result<GeoBatchInsert, PersistenceError> {
        // Validate children before the parent becomes visible.
        check_text([batch.country.as_str(), batch.message.as_str()])?;
        check_text(batch.keywords.iter().map(String::as_str))?;
        let mut t = self.tables()?;
        let batch_id = t.geo_batches.last().map(|(id, _)| id + 1).unwrap_or(1);
        t.geo_batches.push((batch_id, batch.clone()));
        Ok(GeoBatchInsert {
            batch_id,
            keywords_inserted: batch.keywords.len() as u64,
        })
    }
}
