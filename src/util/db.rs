use anyhow::{Context, Result};
use sqlx::{
    postgres::{PgConnectOptions, PgPoolOptions, PgSslMode},
    PgPool, Row,
};
use std::collections::HashSet;
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, instrument};

use crate::config::{is_identifier, DatabaseConfig};

/// Schema files, applied in order and recorded in `_trend_ingest_migrations`.
const MIGRATIONS: &[(i64, &str, &str)] = &[(
    1,
    "trend_ingest",
    include_str!("../../migrations/0001_trend_ingest.sql"),
)];

#[derive(Clone)]
pub struct Db {
    pub pool: PgPool,
}

impl Db {
    // SECURITY: never include raw DSNs in tracing spans (they may contain credentials).
    #[instrument(skip(cfg), fields(schema = %cfg.schema, max_connections = cfg.max_connections))]
    pub async fn connect(cfg: &DatabaseConfig) -> Result<Self> {
        let mut connect_options =
            PgConnectOptions::from_str(&cfg.url).context("invalid database url")?;

        // Ensure TLS is enabled when DSN contains sslmode=require
        if cfg.url.contains("sslmode=require") && !cfg.url.contains("sslmode=disable") {
            connect_options = connect_options.ssl_mode(PgSslMode::Require);
        }

        anyhow::ensure!(is_identifier(&cfg.schema), "invalid schema name");
        let search_path = format!("SET search_path TO {}", cfg.schema);
        let pool = PgPoolOptions::new()
            .max_connections(cfg.max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(600))
            .after_connect(move |conn, _meta| {
                let stmt = search_path.clone();
                Box::pin(async move {
                    sqlx::query(&stmt).execute(&mut *conn).await?;
                    Ok(())
                })
            })
            .connect_with(connect_options)
            .await
            .context("connecting to postgres")?;
        info!("connected to db");

        let db = Self { pool };
        if cfg.auto_migrate {
            info!("running migrations (AUTO_MIGRATE=on)");
            db.run_migrations().await?;
        }
        Ok(db)
    }

    /// Apply every embedded migration not yet recorded. Each file runs in its own transaction.
    pub async fn run_migrations(&self) -> Result<usize> {
        sqlx::raw_sql(
            "CREATE TABLE IF NOT EXISTS _trend_ingest_migrations (
                version BIGINT PRIMARY KEY,
                description TEXT,
                installed_at TIMESTAMPTZ DEFAULT now()
             )",
        )
        .execute(&self.pool)
        .await?;

        let applied: HashSet<i64> = sqlx::query("SELECT version FROM _trend_ingest_migrations")
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(|r| r.try_get::<i64, _>(0))
            .collect::<Result<_, _>>()?;

        let mut count = 0;
        for &(version, desc, sql) in MIGRATIONS {
            if applied.contains(&version) {
                continue;
            }
            info!(version, desc, "applying migration");
            let mut tx = self.pool.begin().await?;
            sqlx::raw_sql(sql)
                .execute(&mut *tx)
                .await
                .with_context(|| format!("migration {version}_{desc} failed"))?;
            sqlx::query("INSERT INTO _trend_ingest_migrations (version, description) VALUES ($1, $2)")
                .bind(version)
                .bind(desc)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
            count += 1;
        }
        if count == 0 {
            info!("migrations up-to-date");
        }
        Ok(count)
    }
}
