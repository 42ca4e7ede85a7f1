use tracing::{debug, instrument};

use super::PersistenceError;
use crate::models::{GeoBatchInsert, GeoTrendRecord};
use crate::util::db::Db;

impl Db {
    /// Parent row first, its generated id captured in the same transaction, then the keywords.
    /// Any error drops `tx` uncommitted, so no parent is left without its children.
    #[instrument(skip(self, batch), fields(country = %batch.country, keywords = batch.keywords.len()))]
    pub(crate) async fn insert_geo_batch(
        &self,
        batch: &GeoTrendRecord,
    ) -> Result<GeoBatchInsert, PersistenceError> {
        let mut tx = self.pool.begin().await?;
        let batch_id: i64 = sqlx::query_scalar(
            "INSERT INTO google_locations (success, message, country, lastupdate, scrapedat)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING id",
        )
        .bind(batch.success)
        .bind(&batch.message)
        .bind(&batch.country)
        .bind(batch.last_update)
        .bind(batch.scraped_at)
        .fetch_one(&mut *tx)
        .await?;

        let keywords_inserted = sqlx::query(
            "INSERT INTO google_trend (google_location_id, keyword)
             SELECT $1, kw FROM UNNEST($2::text[]) AS kw",
        )
        .bind(batch_id)
        .bind(&batch.keywords)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        tx.commit().await?;
        debug!(batch_id, keywords_inserted, "geo-trend batch stored");
        Ok(GeoBatchInsert {
            batch_id,
            keywords_inserted,
        })
    }
}
