//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to move {from} into place: {source}")]
    Rename {
        from: PathBuf,
        source: std::io::Error,
    },

    #[error("{0} already exists")]
    AlreadyExists(PathBuf),

    #[error("Invalid destination path: {0}")]
    InvalidPath(PathBuf),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// Implementations must be safe to share between concurrently running
/// download workers.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Returns true if a finished file exists at `path`
    ///
    /// Partially written files never count as existing.
    async fn exists(&self, path: &Path) -> bool;

    /// Writes `bytes` to `path` so that readers never observe a partial file
    ///
    /// An existing file at `path` is left untouched.
    ///
    /// # Arguments
    ///
    /// * `path` - Final destination of the file
    /// * `bytes` - Complete file content
    ///
    /// # Returns
    ///
    /// * `Ok(())` - The file is in place
    /// * `Err(StorageError::AlreadyExists)` - Another writer got there first
    /// * `Err(StorageError)` - Nothing was written at `path`
    async fn write_atomic(&self, path: &Path, bytes: &[u8]) -> StorageResult<()>;
}
