use sqlx::QueryBuilder;
use std::collections::HashMap;
use tracing::{info, instrument};

use super::PersistenceError;
use crate::models::HashflagRecord;
use crate::util::db::Db;

impl Db {
    #[instrument(skip(self, rows), fields(rows = rows.len()))]
    pub(crate) async fn upsert_hashflag_rows(
        &self,
        rows: &[HashflagRecord],
    ) -> Result<u64, PersistenceError> {
        if rows.is_empty() {
            return Ok(0);
        }
        // A multi-row upsert cannot touch the same key twice; keep the last occurrence.
        let mut latest: HashMap<&str, &HashflagRecord> = HashMap::new();
        for r in rows {
            latest.insert(r.hashtag.as_str(), r);
        }
        let uniques: Vec<&HashflagRecord> = latest.into_values().collect();

        let mut tx = self.pool.begin().await?;
        let mut qb: QueryBuilder<'_, sqlx::Postgres> = QueryBuilder::new(
            "INSERT INTO twitter_hashflags (hashtag, starting_timestamp_ms, ending_timestamp_ms, asset_url, is_hashfetti_enabled) ",
        );
        qb.push_values(&uniques, |mut b, r| {
            b.push_bind(&r.hashtag)
                .push_bind(r.start_timestamp)
                .push_bind(r.end_timestamp)
                .push_bind(r.asset_url.as_deref())
                .push_bind(r.hashfetti_enabled);
        });
        qb.push(
            " ON CONFLICT (hashtag)
              DO UPDATE SET starting_timestamp_ms = EXCLUDED.starting_timestamp_ms,
                            ending_timestamp_ms = EXCLUDED.ending_timestamp_ms,
                            asset_url = EXCLUDED.asset_url,
                            is_hashfetti_enabled = EXCLUDED.is_hashfetti_enabled,
                            last_updated = CURRENT_TIMESTAMP",
        );
        let written = qb.build().execute(&mut *tx).await?.rows_affected();
        tx.commit().await?;
        info!(written, "hashflags upserted");
        Ok(written)
    }
}
