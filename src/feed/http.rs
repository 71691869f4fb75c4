//! Cursor-paginated JSON feed
//!
//! Each page of the feed is a JSON document:
//!
//! ```json
//! {
//!   "entries": [
//!     { "id": "1801", "link": "https://site.example/p/1801",
//!       "created_at": "2025-06-10T09:00:07Z", "media": ["https://img.example/m/A.jpg"] }
//!   ],
//!   "next_cursor": "c2"
//! }
//! ```
//!
//! Growing the feed requests the next page with the cursor as a query
//! parameter. Every response body is kept as a [`TranscriptEntry`] so that
//! the variant pass can search payloads the entry list does not expose.

use crate::config::{FeedConfig, HttpConfig};
use crate::feed::{FeedElement, FeedError, FeedSource, TranscriptEntry};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use url::Url;

/// Builds the HTTP client shared by the feed and the download workers
pub fn build_http_client(config: &HttpConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .gzip(true)
        .brotli(true)
        .build()
}

#[derive(Debug, Deserialize)]
struct FeedPage {
    #[serde(default)]
    entries: Vec<FeedEntry>,
    #[serde(default)]
    next_cursor: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct FeedEntry {
    id: String,
    #[serde(default)]
    link: Option<String>,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    media: Vec<String>,
}

/// Feed source reading a paginated JSON endpoint
pub struct HttpFeed {
    client: Client,
    endpoint: Url,
    cursor_param: String,
    page_delay: Duration,
    entries: Vec<FeedEntry>,
    index: HashMap<String, usize>,
    next_cursor: Option<String>,
    started: bool,
    transcript: Vec<TranscriptEntry>,
    alive: bool,
}

impl HttpFeed {
    /// Creates a feed for the configured endpoint; nothing is fetched yet
    pub fn new(client: Client, config: &FeedConfig) -> Result<Self, url::ParseError> {
        Ok(Self {
            client,
            endpoint: Url::parse(&config.endpoint)?,
            cursor_param: config.cursor_param.clone(),
            page_delay: Duration::from_millis(config.page_delay_ms),
            entries: Vec::new(),
            index: HashMap::new(),
            next_cursor: None,
            started: false,
            transcript: Vec::new(),
            alive: true,
        })
    }

    /// Fetches one page and appends the entries not seen before
    ///
    /// Returns the number of new entries.
    async fn load_page(&mut self, cursor: Option<&str>) -> Result<usize, FeedError> {
        let mut url = self.endpoint.clone();
        if let Some(cursor) = cursor {
            url.query_pairs_mut().append_pair(&self.cursor_param, cursor);
        }

        tracing::debug!("Loading feed page {}", url);

        let response = match self.client.get(url.clone()).send().await {
            Ok(response) => response,
            Err(e) if e.is_connect() => {
                self.alive = false;
                return Err(FeedError::Unreachable(format!("{}: {}", url, e)));
            }
            Err(e) => return Err(FeedError::Access(format!("{}: {}", url, e))),
        };

        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::Access(format!("{} returned HTTP {}", url, status)));
        }

        let mime_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        let body = response
            .text()
            .await
            .map_err(|e| FeedError::Access(format!("{}: {}", url, e)))?;

        self.transcript.push(TranscriptEntry {
            url: url.to_string(),
            mime_type,
            body: body.clone(),
        });

        let page: FeedPage = serde_json::from_str(&body)
            .map_err(|e| FeedError::Malformed(format!("{}: {}", url, e)))?;

        let mut added = 0;
        for entry in page.entries {
            if self.index.contains_key(&entry.id) {
                continue;
            }
            self.index.insert(entry.id.clone(), self.entries.len());
            self.entries.push(entry);
            added += 1;
        }

        self.next_cursor = page.next_cursor.filter(|c| !c.is_empty());
        Ok(added)
    }

    async fn ensure_started(&mut self) -> Result<(), FeedError> {
        if !self.started {
            self.load_page(None).await?;
            self.started = true;
        }
        Ok(())
    }

    fn entry(&self, element: &FeedElement) -> Result<&FeedEntry, FeedError> {
        self.index
            .get(&element.id)
            .map(|&i| &self.entries[i])
            .ok_or_else(|| FeedError::Access(format!("unknown feed element {}", element.id)))
    }
}

#[async_trait]
impl FeedSource for HttpFeed {
    async fn visible_elements(&mut self) -> Result<Vec<FeedElement>, FeedError> {
        self.ensure_started().await?;
        Ok(self
            .entries
            .iter()
            .map(|entry| FeedElement::new(entry.id.clone()))
            .collect())
    }

    async fn grow_feed(&mut self) -> Result<bool, FeedError> {
        if !self.started {
            self.ensure_started().await?;
            return Ok(!self.entries.is_empty());
        }

        let Some(cursor) = self.next_cursor.clone() else {
            return Ok(false);
        };

        let added = self.load_page(Some(&cursor)).await?;

        if !self.page_delay.is_zero() {
            tokio::time::sleep(self.page_delay).await;
        }

        Ok(added > 0)
    }

    async fn element_timestamp(
        &mut self,
        element: &FeedElement,
    ) -> Result<Option<DateTime<Utc>>, FeedError> {
        let entry = self.entry(element)?;
        match &entry.created_at {
            None => Ok(None),
            Some(raw) => DateTime::parse_from_rfc3339(raw)
                .map(|t| Some(t.with_timezone(&Utc)))
                .map_err(|e| {
                    FeedError::Malformed(format!("timestamp '{}' of {}: {}", raw, entry.id, e))
                }),
        }
    }

    async fn element_link(&mut self, element: &FeedElement) -> Result<Option<String>, FeedError> {
        Ok(self.entry(element)?.link.clone())
    }

    async fn element_media_refs(
        &mut self,
        element: &FeedElement,
    ) -> Result<Vec<String>, FeedError> {
        Ok(self.entry(element)?.media.clone())
    }

    async fn network_transcript(&mut self) -> Result<Vec<TranscriptEntry>, FeedError> {
        Ok(self.transcript.clone())
    }

    async fn reset_client_state(&mut self) -> Result<(), FeedError> {
        self.entries.clear();
        self.index.clear();
        self.transcript.clear();
        self.next_cursor = None;
        self.started = false;
        self.alive = true;
        self.ensure_started().await
    }

    async fn is_alive(&mut self) -> bool {
        self.alive
    }
}
