//! Storage module for persisting downloaded media
//!
//! This module handles where and how media bytes are written, including:
//! - The `Storage` trait consumed by the download workers and the reconciler
//! - A local filesystem backend with atomic, non-replacing writes
//! - The output directory layout shared by workers and reconciler

mod layout;
mod local;
mod traits;

pub use layout::OutputLayout;
pub use local::LocalStorage;
pub use traits::{Storage, StorageError, StorageResult};
