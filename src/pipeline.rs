//! End-to-end ingestion run: locations → per-location trends, alongside hashflags and
//! general-web trends.
//!
//! The location chain, hashflags and geo-trends run concurrently and share nothing mutable.
//! Only a failed location fetch fails the run; everything else is isolated, recorded in the
//! summary and the run moves on. Nothing is retried.

use chrono::{DateTime, Utc};
use futures::{stream, StreamExt};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

use crate::config::IngestConfig;
use crate::database_ops::{PersistenceError, TrendStore};
use crate::dedup::select_new_for_location;
use crate::models::LocationRecord;
use crate::normalization::{
    normalize_geo_trends, normalize_hashflags, normalize_locations, normalize_trends,
};
use crate::providers::{
    ErrorClass, GoogleTrendsClient, ProviderError, SocialTrendsSource, TwitterClient,
    WebTrendsSource,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Locations,
    Trends,
    Hashflags,
    GeoTrends,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Fetch,
    Normalize,
    Persist,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageFailure {
    pub stage: Stage,
    pub step: Step,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_id: Option<String>,
    pub class: ErrorClass,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
    pub detail: String,
}

impl StageFailure {
    fn provider(stage: Stage, step: Step, location_id: Option<&str>, err: &ProviderError) -> Self {
        Self {
            stage,
            step,
            location_id: location_id.map(str::to_string),
            class: err.class(),
            http_status: err.http_status(),
            detail: err.to_string(),
        }
    }

    fn persistence(stage: Stage, location_id: Option<&str>, err: &PersistenceError) -> Self {
        Self {
            stage,
            step: Step::Persist,
            location_id: location_id.map(str::to_string),
            class: ErrorClass::PersistenceFailure,
            http_status: None,
            detail: err.to_string(),
        }
    }

    fn dropped(stage: Stage, location_id: Option<&str>, dropped: usize) -> Self {
        Self {
            stage,
            step: Step::Normalize,
            location_id: location_id.map(str::to_string),
            class: ErrorClass::ParseFailure,
            http_status: None,
            detail: format!("{dropped} malformed record(s) dropped"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    CompletedWithWarnings,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Countries returned by the location directory.
    pub locations_fetched: usize,
    /// Countries whose trends were fetched, normalized and stored without error.
    pub locations_processed: usize,
    pub trends_inserted: u64,
    pub hashflags_upserted: u64,
    pub geo_batches_inserted: u64,
    pub keywords_inserted: u64,
    pub records_dropped: usize,
    pub failures: Vec<StageFailure>,
}

#[derive(Debug, Default)]
struct LocationChain {
    fatal: bool,
    fetched: usize,
    processed: usize,
    trends_inserted: u64,
    dropped: usize,
    failures: Vec<StageFailure>,
}

#[derive(Debug, Default)]
struct StageTally {
    written: u64,
    children: u64,
    dropped: usize,
    failures: Vec<StageFailure>,
}

#[derive(Debug, Default)]
struct LocationOutcome {
    inserted: u64,
    dropped: usize,
    failure: Option<StageFailure>,
}

pub struct Pipeline {
    social: Arc<dyn SocialTrendsSource>,
    web: Arc<dyn WebTrendsSource>,
    store: Arc<dyn TrendStore>,
    concurrency: usize,
    cancel: Arc<AtomicBool>,
}

impl Pipeline {
    pub fn new(
        social: Arc<dyn SocialTrendsSource>,
        web: Arc<dyn WebTrendsSource>,
        store: Arc<dyn TrendStore>,
        concurrency: usize,
    ) -> Self {
        Self {
            social,
            web,
            store,
            concurrency: concurrency.max(1),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Build the production provider clients from `cfg`.
    pub fn from_config(
        cfg: &IngestConfig,
        store: Arc<dyn TrendStore>,
    ) -> Result<Self, ProviderError> {
        let social = TwitterClient::new(&cfg.twitter, cfg.provider_timeout)?;
        let web = GoogleTrendsClient::new(&cfg.google, cfg.provider_timeout)?;
        Ok(Self::new(
            Arc::new(social),
            Arc::new(web),
            store,
            cfg.trend_concurrency,
        ))
    }

    /// Share an externally owned cancel flag (e.g. set from a Ctrl+C handler).
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    /// Setting the flag stops new provider calls; transactions already started finish.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    /// Run one full ingestion. Never returns an error: failures land in the summary.
    pub async fn run_ingestion(&self) -> RunSummary {
        let started_at = Utc::now();
        let start = Instant::now();
        info!(concurrency = self.concurrency, "ingestion run start");

        let (chain, hashflags, geo) = tokio::join!(
            self.ingest_locations_and_trends(),
            self.ingest_hashflags(),
            self.ingest_geo_trends(),
        );

        let mut failures = chain.failures;
        failures.extend(hashflags.failures);
        failures.extend(geo.failures);

        let status = if chain.fatal {
            RunStatus::Failed
        } else if failures.is_empty() {
            RunStatus::Completed
        } else {
            RunStatus::CompletedWithWarnings
        };

        let summary = RunSummary {
            status,
            started_at,
            finished_at: Utc::now(),
            locations_fetched: chain.fetched,
            locations_processed: chain.processed,
            trends_inserted: chain.trends_inserted,
            hashflags_upserted: hashflags.written,
            geo_batches_inserted: geo.written,
            keywords_inserted: geo.children,
            records_dropped: chain.dropped + hashflags.dropped + geo.dropped,
            failures,
        };
        info!(
            status = ?summary.status,
            locations = summary.locations_processed,
            trends = summary.trends_inserted,
            hashflags = summary.hashflags_upserted,
            keywords = summary.keywords_inserted,
            failures = summary.failures.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "ingestion run done"
        );
        summary
    }

    async fn ingest_locations_and_trends(&self) -> LocationChain {
        let mut chain = LocationChain::default();
        let start = Instant::now();
        info!("stage=locations action=start");

        let fetched = if self.cancelled() {
            Err(ProviderError::cancelled())
        } else {
            self.social.fetch_locations().await
        };
        let normalized = match fetched {
            Ok(raw) => normalize_locations(&raw).map_err(|e| (Step::Normalize, e)),
            Err(e) => Err((Step::Fetch, e)),
        };
        let normalized = match normalized {
            Ok(n) => n,
            Err((step, e)) => {
                error!(error = %e, "location fetch failed; skipping trend ingestion");
                chain.fatal = true;
                chain
                    .failures
                    .push(StageFailure::provider(Stage::Locations, step, None, &e));
                return chain;
            }
        };
        if normalized.dropped > 0 {
            chain.dropped += normalized.dropped;
            chain.failures.push(StageFailure::dropped(
                Stage::Locations,
                None,
                normalized.dropped,
            ));
        }

        let mut seen = HashSet::new();
        let countries: Vec<LocationRecord> = normalized
            .records
            .into_iter()
            .filter(|l| seen.insert(l.id.clone()))
            .collect();
        chain.fetched = countries.len();

        match self.store.insert_if_absent_locations(&countries).await {
            Ok(inserted) => info!(countries = countries.len(), inserted, "locations persisted"),
            Err(e) => {
                // Trends still go ahead for the returned countries; their inserts will
                // surface per location if the parents are missing.
                warn!(error = %e, "location persistence failed");
                chain
                    .failures
                    .push(StageFailure::persistence(Stage::Locations, None, &e));
            }
        }
        info!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            "stage=locations action=done"
        );

        info!(locations = countries.len(), "stage=trends action=start");
        let outcomes: Vec<(String, LocationOutcome)> = stream::iter(countries)
            .map(|loc| async move {
                let outcome = self.ingest_location(&loc.id).await;
                (loc.id, outcome)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        for (location_id, outcome) in outcomes {
            chain.trends_inserted += outcome.inserted;
            if outcome.dropped > 0 {
                chain.dropped += outcome.dropped;
                chain.failures.push(StageFailure::dropped(
                    Stage::Trends,
                    Some(&location_id),
                    outcome.dropped,
                ));
            }
            match outcome.failure {
                Some(f) => chain.failures.push(f),
                None => chain.processed += 1,
            }
        }
        info!(
            processed = chain.processed,
            inserted = chain.trends_inserted,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "stage=trends action=done"
        );
        chain
    }

    /// Fetch → normalize → dedupe → insert for one location. Errors stay local.
    async fn ingest_location(&self, location_id: &str) -> LocationOutcome {
        let mut outcome = LocationOutcome::default();
        let fail = |step, e: &ProviderError| {
            warn!(location_id, error = %e, "trend ingestion failed for location");
            Some(StageFailure::provider(Stage::Trends, step, Some(location_id), e))
        };

        if self.cancelled() {
            outcome.failure = fail(Step::Fetch, &ProviderError::cancelled());
            return outcome;
        }
        let raw = match self.social.fetch_trends(location_id).await {
            Ok(raw) => raw,
            Err(e) => {
                outcome.failure = fail(Step::Fetch, &e);
                return outcome;
            }
        };
        let normalized = match normalize_trends(&raw, location_id) {
            Ok(n) => n,
            Err(e) => {
                outcome.failure = fail(Step::Normalize, &e);
                return outcome;
            }
        };
        outcome.dropped = normalized.dropped;

        let persisted: Result<u64, PersistenceError> = async {
            let existing = self.store.existing_trend_names(location_id).await?;
            let fresh = select_new_for_location(&existing, normalized.records);
            if fresh.is_empty() {
                return Ok(0);
            }
            self.store.insert_if_absent_trends(&fresh, location_id).await
        }
        .await;
        match persisted {
            Ok(inserted) => outcome.inserted = inserted,
            Err(e) => {
                warn!(location_id, error = %e, "trend persistence failed for location");
                outcome.failure = Some(StageFailure::persistence(
                    Stage::Trends,
                    Some(location_id),
                    &e,
                ));
            }
        }
        outcome
    }

    async fn ingest_hashflags(&self) -> StageTally {
        let mut tally = StageTally::default();
        info!("stage=hashflags action=start");
        if self.cancelled() {
            tally.failures.push(StageFailure::provider(
                Stage::Hashflags,
                Step::Fetch,
                None,
                &ProviderError::cancelled(),
            ));
            return tally;
        }
        let normalized = match self.social.fetch_hashflags().await {
            Ok(raw) => normalize_hashflags(&raw).map_err(|e| (Step::Normalize, e)),
            Err(e) => Err((Step::Fetch, e)),
        };
        let normalized = match normalized {
            Ok(n) => n,
            Err((step, e)) => {
                warn!(error = %e, "hashflag ingestion failed");
                tally
                    .failures
                    .push(StageFailure::provider(Stage::Hashflags, step, None, &e));
                return tally;
            }
        };
        if normalized.dropped > 0 {
            tally.dropped = normalized.dropped;
            tally.failures.push(StageFailure::dropped(
                Stage::Hashflags,
                None,
                normalized.dropped,
            ));
        }
        match self.store.upsert_hashflags(&normalized.records).await {
            Ok(written) => tally.written = written,
            Err(e) => {
                warn!(error = %e, "hashflag persistence failed");
                tally
                    .failures
                    .push(StageFailure::persistence(Stage::Hashflags, None, &e));
            }
        }
        info!(upserted = tally.written, "stage=hashflags action=done");
        tally
    }

    async fn ingest_geo_trends(&self) -> StageTally {
        let mut tally = StageTally::default();
        info!("stage=geo_trends action=start");
        if self.cancelled() {
            tally.failures.push(StageFailure::provider(
                Stage::GeoTrends,
                Step::Fetch,
                None,
                &ProviderError::cancelled(),
            ));
            return tally;
        }
        let normalized = match self.web.fetch_geo_trends().await {
            Ok(raw) => normalize_geo_trends(&raw).map_err(|e| (Step::Normalize, e)),
            Err(e) => Err((Step::Fetch, e)),
        };
        let normalized = match normalized {
            Ok(n) => n,
            Err((step, e)) => {
                warn!(error = %e, "geo-trend ingestion failed");
                tally
                    .failures
                    .push(StageFailure::provider(Stage::GeoTrends, step, None, &e));
                return tally;
            }
        };
        if normalized.dropped > 0 {
            tally.dropped = normalized.dropped;
            tally.failures.push(StageFailure::dropped(
                Stage::GeoTrends,
                None,
                normalized.dropped,
            ));
        }
        // Each batch is its own transaction; one failed batch does not stop the others.
        for batch in &normalized.records {
            match self.store.insert_geo_trend_batch(batch).await {
                Ok(ins) => {
                    tally.written += 1;
                    tally.children += ins.keywords_inserted;
                }
                Err(e) => {
                    warn!(country = %batch.country, error = %e, "geo-trend batch persistence failed");
                    let mut failure = StageFailure::persistence(Stage::GeoTrends, None, &e);
                    failure.detail = format!("country {}: {}", batch.country, failure.detail);
                    tally.failures.push(failure);
                }
            }
        }
        info!(
            batches = tally.written,
            keywords = tally.children,
            "stage=geo_trends action=done"
        );
        tally
    }
}
