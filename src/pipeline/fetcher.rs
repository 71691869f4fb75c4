//! HTTP fetch collaborator used by the download workers
//!
//! Every fetch is bounded by a per-call timeout, and a timeout is reported as
//! its own error variant so that workers can tell a slow server from a
//! broken one.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;

/// Errors raised by a single fetch
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Timed out fetching {url}")]
    Timeout { url: String },

    #[error("Request to {url} failed: {message}")]
    Http { url: String, message: String },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },
}

impl FetchError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Status and body of a completed request
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

/// Fetches the bytes behind a URL
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Performs one GET, giving up after `timeout`
    ///
    /// # Arguments
    ///
    /// * `url` - The URL to fetch
    /// * `timeout` - Upper bound for the whole request, body included
    ///
    /// # Returns
    ///
    /// * `Ok(FetchResponse)` - A response arrived, whatever its status
    /// * `Err(FetchError::Timeout)` - The deadline passed first
    /// * `Err(FetchError::Http)` - The request could not be completed
    async fn get(&self, url: &str, timeout: Duration) -> Result<FetchResponse, FetchError>;
}

/// [`Fetcher`] backed by a shared `reqwest` client
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn get(&self, url: &str, timeout: Duration) -> Result<FetchResponse, FetchError> {
        let request = async {
            let response = self.client.get(url).send().await?;
            let status = response.status().as_u16();
            let body = response.bytes().await?;
            Ok::<_, reqwest::Error>(FetchResponse {
                status,
                body: body.to_vec(),
            })
        };

        match tokio::time::timeout(timeout, request).await {
            Err(_) => Err(FetchError::Timeout {
                url: url.to_string(),
            }),
            Ok(Err(e)) if e.is_timeout() => Err(FetchError::Timeout {
                url: url.to_string(),
            }),
            Ok(Err(e)) => Err(FetchError::Http {
                url: url.to_string(),
                message: e.to_string(),
            }),
            Ok(Ok(response)) => Ok(response),
        }
    }
}
