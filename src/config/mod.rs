//! Configuration module for Media-Harvest
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Validation runs before any pipeline task is started, so an invalid window or
//! pool size is always reported as a [`ConfigError`](crate::ConfigError).
//!
//! # Example
//!
//! ```no_run
//! use media_harvest::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvest.toml")).unwrap();
//! println!("Harvesting into: {}", config.output.directory);
//! ```

mod parser;
mod types;
mod validation;

pub use types::{
    Config, DispatcherConfig, DrainConfig, FeedConfig, HttpConfig, MediaConfig, OutputConfig,
    VariantPassPolicy, WindowConfig, WorkerConfig,
};

pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::validate;
