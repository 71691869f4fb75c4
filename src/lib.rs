//! Media-Harvest: a bounded media acquisition pipeline
//!
//! This crate scans an incrementally-loading, reverse-chronological feed for
//! media references and downloads them under bounded concurrency, with
//! time-window filtering, deduplication, graceful shutdown and a post-run
//! reconciliation against what actually landed on disk.

pub mod config;
pub mod feed;
pub mod media;
pub mod output;
pub mod pipeline;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Main error type for Media-Harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Feed error: {0}")]
    Feed(#[from] feed::FeedError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] pipeline::FetchError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Variant error: {0}")]
    Variant(#[from] media::VariantError),

    #[error("Transcript error at {path}: {source}")]
    Transcript {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid session transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: state::SessionPhase,
        to: state::SessionPhase,
    },

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
///
/// These are fatal and are always raised before any pipeline task starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid time window: {0}")]
    InvalidWindow(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for Media-Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use feed::{FeedSource, HttpFeed, MemoryFeed};
pub use media::{classify_url, media_file_name, resolve_variants, EncodedVariant, MediaKind};
pub use output::{RunReport, Reconciliation};
pub use pipeline::{Session, SessionHandle, WindowPolicy};
pub use state::SessionPhase;
pub use storage::{LocalStorage, OutputLayout, Storage};
