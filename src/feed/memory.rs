//! In-process feed source
//!
//! Pages are loaded up front (or appended while a run is in progress through
//! a clone of the feed) and revealed one at a time by [`FeedSource::grow_feed`],
//! much like scrolling a page that lazily loads older posts. Every reveal
//! re-lists all elements materialized so far, so the same element is seen on
//! many scan cycles.

use crate::feed::{FeedElement, FeedError, FeedSource, TranscriptEntry};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// One element of a [`MemoryFeed`]
#[derive(Debug, Clone, Default)]
pub struct MemoryElement {
    pub id: String,
    pub timestamp: Option<DateTime<Utc>>,
    pub link: Option<String>,
    pub media: Vec<String>,
    /// Reading this element fails with a transient access error
    pub broken: bool,
}

impl MemoryElement {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }

    pub fn media(mut self, url: impl Into<String>) -> Self {
        self.media.push(url.into());
        self
    }

    pub fn broken(mut self) -> Self {
        self.broken = true;
        self
    }
}

#[derive(Debug, Default)]
struct Page {
    elements: Vec<MemoryElement>,
    transcript: Vec<TranscriptEntry>,
}

/// Call counters, for inspecting how a run used the feed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryFeedCalls {
    pub visible_reads: u32,
    pub growths: u32,
    pub transcript_reads: u32,
    pub resets: u32,
}

#[derive(Debug, Default)]
struct MemoryState {
    pages: Vec<Page>,
    revealed: usize,
    elements: HashMap<String, MemoryElement>,
    failing_reads: u32,
    alive: bool,
    grow_delay: Duration,
    calls: MemoryFeedCalls,
}

impl MemoryState {
    fn reveal_next(&mut self) -> bool {
        if self.revealed >= self.pages.len() {
            return false;
        }
        for element in &self.pages[self.revealed].elements {
            self.elements.insert(element.id.clone(), element.clone());
        }
        self.revealed += 1;
        true
    }

    fn check_alive(&self) -> Result<(), FeedError> {
        if self.alive {
            Ok(())
        } else {
            Err(FeedError::Unreachable("memory feed disconnected".to_string()))
        }
    }

    fn element(&self, element: &FeedElement) -> Result<&MemoryElement, FeedError> {
        self.check_alive()?;
        let found = self
            .elements
            .get(&element.id)
            .ok_or_else(|| FeedError::Access(format!("element {} is detached", element.id)))?;
        if found.broken {
            return Err(FeedError::Access(format!(
                "element {} could not be read",
                element.id
            )));
        }
        Ok(found)
    }
}

/// A feed source backed by pre-loaded pages
///
/// Clones share the same underlying feed.
#[derive(Debug, Clone)]
pub struct MemoryFeed {
    state: Arc<Mutex<MemoryState>>,
}

impl Default for MemoryFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryFeed {
    /// Creates an empty feed; the first page added becomes visible immediately
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState {
                alive: true,
                ..MemoryState::default()
            })),
        }
    }

    /// Creates a feed from pages of elements, newest page first
    pub fn with_pages(pages: Vec<Vec<MemoryElement>>) -> Self {
        let feed = Self::new();
        for page in pages {
            feed.push_page(page);
        }
        feed
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        // Every update leaves the state consistent, so a poisoned lock is still usable
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Appends a page of older elements
    pub fn push_page(&self, elements: Vec<MemoryElement>) {
        self.push_page_with_transcript(elements, Vec::new());
    }

    /// Appends a page together with the network responses that loading it produces
    pub fn push_page_with_transcript(
        &self,
        elements: Vec<MemoryElement>,
        transcript: Vec<TranscriptEntry>,
    ) {
        let mut state = self.lock();
        state.pages.push(Page {
            elements,
            transcript,
        });
        if state.revealed == 0 {
            state.reveal_next();
        }
    }

    /// Makes the next `count` element listings fail with an access error
    pub fn fail_next_reads(&self, count: u32) {
        self.lock().failing_reads = count;
    }

    /// Simulates losing the feed source
    pub fn disconnect(&self) {
        self.lock().alive = false;
    }

    /// Delay applied to every growth request
    pub fn set_grow_delay(&self, delay: Duration) {
        self.lock().grow_delay = delay;
    }

    /// Number of pages currently revealed
    pub fn revealed_pages(&self) -> usize {
        self.lock().revealed
    }

    pub fn calls(&self) -> MemoryFeedCalls {
        self.lock().calls
    }
}

#[async_trait]
impl FeedSource for MemoryFeed {
    async fn visible_elements(&mut self) -> Result<Vec<FeedElement>, FeedError> {
        let mut state = self.lock();
        state.calls.visible_reads += 1;
        state.check_alive()?;

        if state.failing_reads > 0 {
            state.failing_reads -= 1;
            return Err(FeedError::Access("element listing failed".to_string()));
        }

        Ok(state.pages[..state.revealed]
            .iter()
            .flat_map(|page| page.elements.iter())
            .map(|element| FeedElement::new(element.id.clone()))
            .collect())
    }

    async fn grow_feed(&mut self) -> Result<bool, FeedError> {
        let delay = {
            let mut state = self.lock();
            state.calls.growths += 1;
            state.check_alive()?;
            state.grow_delay
        };

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        Ok(self.lock().reveal_next())
    }

    async fn element_timestamp(
        &mut self,
        element: &FeedElement,
    ) -> Result<Option<DateTime<Utc>>, FeedError> {
        Ok(self.lock().element(element)?.timestamp)
    }

    async fn element_link(&mut self, element: &FeedElement) -> Result<Option<String>, FeedError> {
        Ok(self.lock().element(element)?.link.clone())
    }

    async fn element_media_refs(
        &mut self,
        element: &FeedElement,
    ) -> Result<Vec<String>, FeedError> {
        Ok(self.lock().element(element)?.media.clone())
    }

    async fn network_transcript(&mut self) -> Result<Vec<TranscriptEntry>, FeedError> {
        let mut state = self.lock();
        state.calls.transcript_reads += 1;
        state.check_alive()?;
        Ok(state.pages[..state.revealed]
            .iter()
            .flat_map(|page| page.transcript.iter().cloned())
            .collect())
    }

    async fn reset_client_state(&mut self) -> Result<(), FeedError> {
        let mut state = self.lock();
        state.calls.resets += 1;
        state.check_alive()?;
        state.revealed = 0;
        state.elements.clear();
        state.reveal_next();
        Ok(())
    }

    async fn is_alive(&mut self) -> bool {
        self.lock().alive
    }
}
