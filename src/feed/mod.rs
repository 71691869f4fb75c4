//! Feed source abstraction
//!
//! The pipeline never looks at how a feed is rendered. It only needs a handle
//! that can list the currently materialized elements, ask the feed to grow,
//! read a few facts off each element, and hand over the buffered network
//! transcript for the variant pass.
//!
//! Two implementations are provided:
//! - [`HttpFeed`]: a cursor-paginated JSON endpoint
//! - [`MemoryFeed`]: pre-loaded pages revealed one growth at a time

mod http;
mod memory;

pub use http::{build_http_client, HttpFeed};
pub use memory::{MemoryElement, MemoryFeed};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Opaque handle to one element of the feed
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FeedElement {
    /// Identity of the element, stable across scan cycles
    pub id: String,
}

impl FeedElement {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// One buffered network response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptEntry {
    /// URL the response was received from
    pub url: String,
    /// Response MIME type
    pub mime_type: String,
    /// Response body
    pub body: String,
}

/// Feed access errors
#[derive(Debug, Error)]
pub enum FeedError {
    /// The feed source cannot be reached at all; the scan ends
    #[error("feed source unreachable: {0}")]
    Unreachable(String),

    /// A single read failed; the caller may retry or skip
    #[error("feed access failed: {0}")]
    Access(String),

    /// The feed answered with something that could not be understood
    #[error("malformed feed data: {0}")]
    Malformed(String),
}

impl FeedError {
    /// Returns true if the feed source should be considered lost
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Unreachable(_))
    }
}

/// A live, steadily-growing, reverse-chronological feed
///
/// Only the feed scanner calls into a feed source while a run is active.
#[async_trait]
pub trait FeedSource: Send {
    /// Returns the currently materialized elements, newest first
    async fn visible_elements(&mut self) -> Result<Vec<FeedElement>, FeedError>;

    /// Asks the feed to load more content; returns whether anything changed
    async fn grow_feed(&mut self) -> Result<bool, FeedError>;

    /// Publication instant of an element, if it carries one
    async fn element_timestamp(
        &mut self,
        element: &FeedElement,
    ) -> Result<Option<DateTime<Utc>>, FeedError>;

    /// Link to the post the element represents, if any
    async fn element_link(&mut self, element: &FeedElement) -> Result<Option<String>, FeedError>;

    /// Media URLs referenced by the element
    async fn element_media_refs(&mut self, element: &FeedElement)
        -> Result<Vec<String>, FeedError>;

    /// Network responses buffered since the last reset
    async fn network_transcript(&mut self) -> Result<Vec<TranscriptEntry>, FeedError>;

    /// Drops client-side state left by a previous run and starts from a fresh view
    async fn reset_client_state(&mut self) -> Result<(), FeedError>;

    /// Returns false once the feed source can no longer be used
    async fn is_alive(&mut self) -> bool;
}
