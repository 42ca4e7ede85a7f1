use sqlx::QueryBuilder;
use tracing::{info, instrument};

use super::PersistenceError;
use crate::models::LocationRecord;
use crate::util::db::Db;

impl Db {
    #[instrument(skip(self, rows), fields(rows = rows.len()))]
    pub(crate) async fn insert_locations(
        &self,
        rows: &[LocationRecord],
    ) -> Result<u64, PersistenceError> {
        if rows.is_empty() {
            return Ok(0);
        }
        let mut tx = self.pool.begin().await?;
        let mut qb: QueryBuilder<'_, sqlx::Postgres> =
            QueryBuilder::new("INSERT INTO twitter_locations (place_id, country_name, kind) ");
        qb.push_values(rows, |mut b, r| {
            b.push_bind(&r.id)
                .push_bind(&r.name)
                .push_bind(r.kind.as_str());
        });
        qb.push(" ON CONFLICT (place_id) DO NOTHING");
        let inserted = qb.build().execute(&mut *tx).await?.rows_affected();
        tx.commit().await?;
        info!(inserted, skipped = (rows.len() as u64).saturating_sub(inserted), "locations stored");
        Ok(inserted)
    }
}
