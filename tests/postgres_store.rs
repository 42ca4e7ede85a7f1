//! Store round-trips against a live Postgres. Skipped unless TEST_DATABASE_URL is set.
//! Each test migrates into its own throwaway schema.

use chrono::{DateTime, Utc};
use trend_ingest::models::{
    GeoTrendRecord, HashflagRecord, LocationKind, LocationRecord, TrendRecord,
};
use trend_ingest::{DatabaseConfig, Db, TrendStore};

async fn test_db(tag: &str) -> Option<Db> {
    let url = std::env::var("TEST_DATABASE_URL").ok()?;
    let schema = format!(
        "ti_{tag}_{}",
        Utc::now().timestamp_nanos_opt().unwrap_or_default().unsigned_abs()
    );
    let admin = sqlx::PgPool::connect(&url).await.unwrap();
    sqlx::raw_sql(&format!("CREATE SCHEMA {schema}"))
        .execute(&admin)
        .await
        .unwrap();
    admin.close().await;

    let cfg = DatabaseConfig {
        url,
        max_connections: 2,
        schema,
        auto_migrate: true,
    };
    Some(Db::connect(&cfg).await.unwrap())
}

fn kenya() -> LocationRecord {
    LocationRecord {
        id: "23424863".into(),
        name: "Kenya".into(),
        kind: LocationKind::Country,
    }
}

fn trend(name: &str, position: i32) -> TrendRecord {
    TrendRecord {
        name: name.into(),
        position,
        description: "5K posts".into(),
        domain_context: "Sports".into(),
        url: format!("twitter://search?query={name}"),
        impression_id: "imp".into(),
        related_terms: vec!["x".into(), "y".into()],
        location_id: "23424863".into(),
    }
}

fn flag(tag: &str, asset: Option<&str>) -> HashflagRecord {
    HashflagRecord {
        hashtag: tag.into(),
        start_timestamp: DateTime::from_timestamp(1_609_459_200, 0).unwrap(),
        end_timestamp: DateTime::from_timestamp(1_609_545_600, 0).unwrap(),
        asset_url: asset.map(str::to_string),
        hashfetti_enabled: true,
    }
}

#[tokio::test]
async fn migrations_are_recorded_once() {
    let Some(db) = test_db("migr").await else {
        return;
    };
    assert_eq!(db.run_migrations().await.unwrap(), 0);
}

#[tokio::test]
async fn pooled_connections_use_configured_schema() {
    let Some(db) = test_db("path").await else {
        return;
    };
    let schema: String = sqlx::query_scalar("SELECT current_schema()::text")
        .fetch_one(&db.pool)
        .await
        .unwrap();
    assert!(schema.starts_with("ti_path_"), "search_path not applied: {schema}");
}

#[tokio::test]
async fn locations_keep_first_write() {
    let Some(db) = test_db("loc").await else {
        return;
    };
    assert_eq!(db.insert_if_absent_locations(&[kenya()]).await.unwrap(), 1);
    let mut renamed = kenya();
    renamed.name = "Renamed".into();
    assert_eq!(db.insert_if_absent_locations(&[renamed]).await.unwrap(), 0);
    let name: String =
        sqlx::query_scalar("SELECT country_name FROM twitter_locations WHERE place_id = $1")
            .bind("23424863")
            .fetch_one(&db.pool)
            .await
            .unwrap();
    assert_eq!(name, "Kenya");
}

#[tokio::test]
async fn trend_inserts_are_idempotent_per_location() {
    let Some(db) = test_db("trend").await else {
        return;
    };
    db.insert_if_absent_locations(&[kenya()]).await.unwrap();
    let batch = vec![trend("#A", 1), trend("#B", 2), trend("#A", 3)];
    assert_eq!(db.insert_if_absent_trends(&batch, "23424863").await.unwrap(), 2);
    assert_eq!(db.insert_if_absent_trends(&batch, "23424863").await.unwrap(), 0);

    let names = db.existing_trend_names("23424863").await.unwrap();
    assert_eq!(names.len(), 2);
    assert!(names.contains("#A") && names.contains("#B"));

    let terms: Vec<String> = sqlx::query_scalar(
        "SELECT related_terms FROM twitter_trends WHERE trend_name = '#B'",
    )
    .fetch_one(&db.pool)
    .await
    .unwrap();
    assert_eq!(terms, vec!["x".to_string(), "y".to_string()]);
}

#[tokio::test]
async fn trends_for_unknown_location_are_rejected() {
    let Some(db) = test_db("fk").await else {
        return;
    };
    assert!(db.insert_if_absent_trends(&[trend("#A", 1)], "nowhere").await.is_err());
}

#[tokio::test]
async fn hashflag_upsert_overwrites_and_refreshes_timestamp() {
    let Some(db) = test_db("flag").await else {
        return;
    };
    db.upsert_hashflags(&[flag("#F", None)]).await.unwrap();
    let first: DateTime<Utc> =
        sqlx::query_scalar("SELECT last_updated FROM twitter_hashflags WHERE hashtag = '#F'")
            .fetch_one(&db.pool)
            .await
            .unwrap();

    db.upsert_hashflags(&[flag("#F", Some("https://a.png")), flag("#F", Some("https://b.png"))])
        .await
        .unwrap();
    let (count, asset, second): (i64, Option<String>, DateTime<Utc>) = sqlx::query_as(
        "SELECT COUNT(*) OVER (), asset_url, last_updated FROM twitter_hashflags",
    )
    .fetch_one(&db.pool)
    .await
    .unwrap();
    assert_eq!(count, 1);
    assert_eq!(asset.as_deref(), Some("https://b.png"));
    assert!(second >= first);
}

#[tokio::test]
async fn geo_batch_rolls_back_when_a_keyword_fails() {
    let Some(db) = test_db("geo").await else {
        return;
    };
    let mut batch = GeoTrendRecord {
        success: true,
        message: "ok".into(),
        country: "Kenya".into(),
        last_update: Utc::now(),
        scraped_at: Utc::now(),
        keywords: vec!["Safari Rally".into(), "Nairobi".into()],
    };
    let ok = db.insert_geo_trend_batch(&batch).await.unwrap();
    assert_eq!(ok.keywords_inserted, 2);

    // Postgres refuses NUL in text, failing the keyword insert after the parent went in.
    batch.keywords.push("bad\0keyword".into());
    assert!(db.insert_geo_trend_batch(&batch).await.is_err());

    let parents: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM google_locations")
        .fetch_one(&db.pool)
        .await
        .unwrap();
    let children: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM google_trend")
        .fetch_one(&db.pool)
        .await
        .unwrap();
    assert_eq!(parents, 1);
    assert_eq!(children, 2);
}
