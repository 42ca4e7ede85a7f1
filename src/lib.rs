pub mod config;
pub mod database_ops;
pub mod dedup;
pub mod models;
pub mod normalization;
pub mod pipeline;
pub mod providers;
pub mod tracing;

pub mod util {
    pub mod db;
    pub mod env;
}

pub use config::{DatabaseConfig, IngestConfig};
pub use database_ops::{MemoryStore, PersistenceError, TrendStore};
pub use pipeline::{Pipeline, RunStatus, RunSummary, StageFailure};
pub use util::db::Db;
