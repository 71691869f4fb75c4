//! Per-run deduplication of feed elements and media URLs

use std::collections::HashSet;
use std::sync::Mutex;

/// Elements and URLs already handled in the current run
///
/// The two sets are locked independently; each check is an atomic
/// check-and-insert, so two callers can never both claim the same key.
#[derive(Debug, Default)]
pub struct DedupSet {
    elements: Mutex<HashSet<String>>,
    urls: Mutex<HashSet<String>>,
}

impl DedupSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks an element as visited; returns false if it already was
    pub fn visit_element(&self, id: &str) -> bool {
        let mut elements = self.elements.lock().unwrap_or_else(|e| e.into_inner());
        elements.insert(id.to_string())
    }

    /// Claims a URL for enqueueing; returns false if it was already claimed
    pub fn claim_url(&self, url: &str) -> bool {
        let mut urls = self.urls.lock().unwrap_or_else(|e| e.into_inner());
        urls.insert(url.to_string())
    }

    pub fn has_url(&self, url: &str) -> bool {
        let urls = self.urls.lock().unwrap_or_else(|e| e.into_inner());
        urls.contains(url)
    }

    pub fn visited_elements(&self) -> usize {
        self.elements.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn claimed_urls(&self) -> usize {
        self.urls.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}
