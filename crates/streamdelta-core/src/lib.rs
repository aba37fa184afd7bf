//! Shared domain types for streamdelta.
//!
//! Holds the playlist data model, target-URL normalization, stream-count
//! parsing, daily schedule times, and environment configuration. Everything
//! here is synchronous and I/O free apart from reading env vars.

pub mod app_config;
pub mod config;
pub mod model;
pub mod schedule;
pub mod streams;
pub mod units;

use thiserror::Error;

pub use app_config::{AppConfig, Environment, StoreConfig};
pub use config::{load_app_config, load_app_config_from_env};
pub use model::{
    DailySnapshot, ExtractionMethod, PlaylistSnapshot, TenantId, TotalStreams, TrackRecord,
};
pub use schedule::{DailyTime, TriggerState};
pub use streams::parse_stream_count;
pub use units::{extract_unit_id, normalize_url, CollectionUnit};

/// Configuration loading failures. Always fatal for the process.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}

/// Input rejected synchronously before any state is touched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid schedule time \"{0}\": expected HH:MM (24-hour)")]
    InvalidScheduleTime(String),

    #[error("unsupported playlist URL \"{0}\"")]
    UnsupportedUrl(String),

    #[error("invalid tenant id \"{0}\"")]
    InvalidTenant(String),
}
