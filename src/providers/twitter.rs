use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

use super::http::{build_client, get_json};
use super::{ProviderError, SocialTrendsSource};
use crate::config::TwitterConfig;

/// RapidAPI-hosted Twitter v1.1 proxy.
///
/// Endpoints:
/// - GET /v1.1/Locations/ - location directory (countries, towns, ...)
/// - GET /v1.1/Trends/?location_id=..&count=.. - trend timeline for one location
/// - GET /v1.1/Hashflags/ - currently active branded hashtags
#[derive(Debug, Clone)]
pub struct TwitterClient {
    base_url: String,
    http: Client,
    api_key: String,
    api_host: String,
    hashflags_key: String,
    hashflags_host: String,
    trends_count: u32,
    timeout: Duration,
}

impl TwitterClient {
    pub fn new(cfg: &TwitterConfig, timeout: Duration) -> Result<Self, ProviderError> {
        Ok(Self {
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            http: build_client("trend-ingest/twitter", timeout)?,
            api_key: cfg.api_key.clone(),
            api_host: cfg.api_host.clone(),
            hashflags_key: cfg.hashflags_key.clone(),
            hashflags_host: cfg.hashflags_host.clone(),
            trends_count: cfg.trends_count,
            timeout,
        })
    }

    fn get(&self, resource: &str, key: &str, host: &str) -> reqwest::RequestBuilder {
        self.http
            .get(format!("{}/v1.1/{resource}/", self.base_url))
            .header("x-rapidapi-key", key)
            .header("x-rapidapi-host", host)
    }
}

#[async_trait]
impl SocialTrendsSource for TwitterClient {
    async fn fetch_locations(&self) -> Result<Value, ProviderError> {
        let req = self.get("Locations", &self.api_key, &self.api_host);
        get_json(req, self.timeout, "twitter locations").await
    }

    async fn fetch_trends(&self, location_id: &str) -> Result<Value, ProviderError> {
        let count = self.trends_count.to_string();
        let req = self
            .get("Trends", &self.api_key, &self.api_host)
            .query(&[("location_id", location_id), ("count", count.as_str())]);
        get_json(req, self.timeout, "twitter trends").await
    }

    async fn fetch_hashflags(&self) -> Result<Value, ProviderError> {
        let req = self.get("Hashflags", &self.hashflags_key, &self.hashflags_host);
        get_json(req, self.timeout, "twitter hashflags").await
    }
}
