use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

use super::http::{build_client, get_json};
use super::{ProviderError, WebTrendsSource};
use crate::config::GoogleConfig;

/// Google realtime trends (RapidAPI). A single GET /trends returns every country block.
#[derive(Debug, Clone)]
pub struct GoogleTrendsClient {
    base_url: String,
    http: Client,
    api_key: String,
    api_host: String,
    timeout: Duration,
}

impl GoogleTrendsClient {
    pub fn new(cfg: &GoogleConfig, timeout: Duration) -> Result<Self, ProviderError> {
        Ok(Self {
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            http: build_client("trend-ingest/google", timeout)?,
            api_key: cfg.api_key.clone(),
            api_host: cfg.api_host.clone(),
            timeout,
        })
    }
}

#[async_trait]
impl WebTrendsSource for GoogleTrendsClient {
    async fn fetch_geo_trends(&self) -> Result<Value, ProviderError> {
        let req = self
            .http
            .get(format!("{}/trends", self.base_url))
            .header("X-RapidAPI-Host", &self.api_host)
            .header("X-RapidAPI-Key", &self.api_key);
        get_json(req, self.timeout, "google trends").await
    }
}
