use sqlx::QueryBuilder;
use std::collections::HashSet;
use tracing::{debug, instrument};

use super::PersistenceError;
use crate::models::TrendRecord;
use crate::util::db::Db;

impl Db {
    pub(crate) async fn trend_names_for_location(
        &self,
        location_id: &str,
    ) -> Result<HashSet<String>, PersistenceError> {
        let names: Vec<String> =
            sqlx::query_scalar("SELECT trend_name FROM twitter_trends WHERE location_id = $1")
                .bind(location_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(names.into_iter().collect())
    }

    /// One statement, one transaction. `ON CONFLICT DO NOTHING` keeps the first write when
    /// two runs race past the existing-name check for the same pair.
    #[instrument(skip(self, rows), fields(rows = rows.len()))]
    pub(crate) async fn insert_trends(
        &self,
        rows: &[TrendRecord],
        location_id: &str,
    ) -> Result<u64, PersistenceError> {
        if rows.is_empty() {
            return Ok(0);
        }
        let mut tx = self.pool.begin().await?;
        let mut qb: QueryBuilder<'_, sqlx::Postgres> = QueryBuilder::new(
            "INSERT INTO twitter_trends (trend_name, position, meta_description, domain_context, url, impression_id, related_terms, location_id) ",
        );
        qb.push_values(rows, |mut b, r| {
            b.push_bind(&r.name)
                .push_bind(r.position)
                .push_bind(&r.description)
                .push_bind(&r.domain_context)
                .push_bind(&r.url)
                .push_bind(&r.impression_id)
                .push_bind(&r.related_terms)
                .push_bind(location_id);
        });
        qb.push(" ON CONFLICT (trend_name, location_id) DO NOTHING");
        let inserted = qb.build().execute(&mut *tx).await?.rows_affected();
        tx.commit().await?;
        debug!(location_id, inserted, "trends stored");
        Ok(inserted)
    }
}
