//! Explicit runtime configuration, built once at startup and handed to constructors.

use anyhow::{anyhow, bail, Context, Result};
use std::time::Duration;

use crate::util::env::{env_flag, env_opt, env_parse, env_req};

pub const DEFAULT_TWITTER_BASE_URL: &str = "https://twitter135.p.rapidapi.com";
pub const DEFAULT_TWITTER_HOST: &str = "twitter135.p.rapidapi.com";
pub const DEFAULT_GOOGLE_BASE_URL: &str = "https://google-realtime-trends-data-api.p.rapidapi.com";
pub const DEFAULT_GOOGLE_HOST: &str = "google-realtime-trends-data-api.p.rapidapi.com";

#[derive(Debug, Clone)]
pub struct TwitterConfig {
    pub base_url: String,
    pub api_key: String,
    pub api_host: String,
    /// Hashflags may be served under a separate RapidAPI subscription.
    pub hashflags_key: String,
    pub hashflags_host: String,
    pub trends_count: u32,
}

#[derive(Debug, Clone)]
pub struct GoogleConfig {
    pub base_url: String,
    pub api_key: String,
    pub api_host: String,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub schema: String,
    pub auto_migrate: bool,
}

#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub twitter: TwitterConfig,
    pub google: GoogleConfig,
    /// Upper bound for every provider call.
    pub provider_timeout: Duration,
    /// Max in-flight per-location trend fetches.
    pub trend_concurrency: usize,
}

impl IngestConfig {
    pub fn from_env() -> Result<Self> {
        let api_key = env_req("TWITTER_API_KEY")?;
        let api_host = env_opt("TWITTER_API_HOST").unwrap_or_else(|| DEFAULT_TWITTER_HOST.into());
        let twitter = TwitterConfig {
            base_url: env_opt("TWITTER_BASE_URL")
                .unwrap_or_else(|| DEFAULT_TWITTER_BASE_URL.into()),
            hashflags_key: env_opt("TWITTER_HASHFLAGS_KEY").unwrap_or_else(|| api_key.clone()),
            hashflags_host: env_opt("TWITTER_HASHFLAGS_HOST").unwrap_or_else(|| api_host.clone()),
            api_key,
            api_host,
            trends_count: env_parse("TWITTER_TRENDS_COUNT", 20u32),
        };
        let google = GoogleConfig {
            base_url: env_opt("GOOGLE_BASE_URL").unwrap_or_else(|| DEFAULT_GOOGLE_BASE_URL.into()),
            api_key: env_req("GOOGLE_API_KEY")?,
            api_host: env_opt("GOOGLE_API_HOST").unwrap_or_else(|| DEFAULT_GOOGLE_HOST.into()),
        };
        Ok(Self {
            twitter,
            google,
            provider_timeout: Duration::from_secs(env_parse("PROVIDER_TIMEOUT_SECS", 15u64).max(1)),
            trend_concurrency: env_parse("TREND_FETCH_CONCURRENCY", 4usize).max(1),
        })
    }
}

impl DatabaseConfig {
    pub fn from_env() -> Result<Self> {
        let url = match env_opt("DATABASE_URL") {
            Some(url) => url,
            None => dsn_from_parts().context("set DATABASE_URL or DB_HOST/DB_NAME/DB_USER")?,
        };
        let schema = env_opt("DB_SCHEMA").unwrap_or_else(|| "public".into());
        if !is_identifier(&schema) {
            bail!("DB_SCHEMA must be a plain identifier, got {schema:?}");
        }
        Ok(Self {
            url,
            max_connections: env_parse("DB_MAX_CONNS", 5u32).max(1),
            schema,
            auto_migrate: env_flag("AUTO_MIGRATE", false),
        })
    }
}

/// Credentials are percent-encoded by `Url`, so passwords may contain `@` or `/`.
fn dsn_from_parts() -> Result<String> {
    let host = env_req("DB_HOST")?;
    let port = env_parse("DB_PORT", 5432u16);
    let mut url = url::Url::parse(&format!("postgres://{host}:{port}/"))
        .with_context(|| format!("invalid DB_HOST {host:?}"))?;
    url.set_path(&env_req("DB_NAME")?);
    url.set_username(&env_req("DB_USER")?)
        .map_err(|_| anyhow!("cannot set DB_USER on {host}"))?;
    if let Some(pass) = env_opt("DB_PASS") {
        url.set_password(Some(&pass))
            .map_err(|_| anyhow!("cannot set DB_PASS on {host}"))?;
    }
    Ok(url.to_string())
}

pub(crate) fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
