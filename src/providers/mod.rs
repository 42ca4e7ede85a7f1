//! Provider clients: one per external trend source.
//!
//! Clients only fetch; they hand back the raw JSON payload (or a typed failure) and leave
//! shape validation to `crate::normalization`. Nothing here retries.

pub mod google;
mod http;
pub mod twitter;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use thiserror::Error;

pub use google::GoogleTrendsClient;
pub use twitter::TwitterClient;

/// Transport-level classification of a failed provider call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Network,
    HttpStatus(u16),
    Timeout,
    Parse,
    Cancelled,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network => f.write_str("network error"),
            Self::HttpStatus(code) => write!(f, "http status {code}"),
            Self::Timeout => f.write_str("timeout"),
            Self::Parse => f.write_str("parse error"),
            Self::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// Pipeline-wide failure taxonomy carried on every recorded stage failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    TransportFailure,
    ProviderError,
    ParseFailure,
    PersistenceFailure,
    Cancelled,
}

#[derive(Debug, Clone, Error)]
#[error("{kind}: {detail}")]
pub struct ProviderError {
    pub kind: FailureKind,
    pub detail: String,
}

impl ProviderError {
    pub fn new(kind: FailureKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    pub fn parse(detail: impl Into<String>) -> Self {
        Self::new(FailureKind::Parse, detail)
    }

    pub fn cancelled() -> Self {
        Self::new(FailureKind::Cancelled, "run cancelled before request was issued")
    }

    /// Network and timeout failures may succeed on a later run; the caller decides.
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind, FailureKind::Network | FailureKind::Timeout)
    }

    pub fn class(&self) -> ErrorClass {
        match self.kind {
            FailureKind::Network | FailureKind::Timeout => ErrorClass::TransportFailure,
            FailureKind::HttpStatus(_) => ErrorClass::ProviderError,
            FailureKind::Parse => ErrorClass::ParseFailure,
            FailureKind::Cancelled => ErrorClass::Cancelled,
        }
    }

    pub fn http_status(&self) -> Option<u16> {
        match self.kind {
            FailureKind::HttpStatus(code) => Some(code),
            _ => None,
        }
    }
}

/// Social-trends provider: location directory, per-location trends and hashflags.
#[async_trait]
pub trait SocialTrendsSource: Send + Sync {
    async fn fetch_locations(&self) -> Result<Value, ProviderError>;
    async fn fetch_trends(&self, location_id: &str) -> Result<Value, ProviderError>;
    async fn fetch_hashflags(&self) -> Result<Value, ProviderError>;
}

/// General-web-trends provider: one batch per country block.
#[async_trait]
pub trait WebTrendsSource: Send + Sync {
    async fn fetch_geo_trends(&self) -> Result<Value, ProviderError>;
}
