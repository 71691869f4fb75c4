//! Feed scanner (producer)
//!
//! The scanner walks a reverse-chronological feed from newest to oldest,
//! turning the media of every element inside the time window into download
//! tasks. It stops for good at the first element at or before the window's
//! start, since everything further down is older still.
//!
//! A scanner is built for a single run and is consumed by [`FeedScanner::run`].

use crate::config::{Config, MediaConfig, VariantPassPolicy};
use crate::feed::{FeedElement, FeedError, FeedSource};
use crate::media::{classify_url, find_variant_lists, resolve_variants, with_query, MediaKind};
use crate::output::{ProgressEvent, ProgressSink, TranscriptLog};
use crate::pipeline::{CandidateReference, DownloadTask, TaskSender, WindowPolicy, WindowVerdict};
use crate::state::{RunState, Tally};
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// How a scan ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    /// An element at or before the window start was reached
    WindowStop,
    /// The feed stopped growing
    Exhausted,
    /// The run was stopped
    Cancelled,
    /// The feed source became unreachable
    FeedLost,
}

impl ScanOutcome {
    /// Returns true if the variant pass should run after this outcome
    pub fn allows_variant_pass(&self, policy: VariantPassPolicy) -> bool {
        match policy {
            VariantPassPolicy::Never => false,
            VariantPassPolicy::NaturalOnly => matches!(self, Self::Exhausted),
            VariantPassPolicy::Always => matches!(self, Self::Exhausted | Self::WindowStop),
        }
    }
}

impl fmt::Display for ScanOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::WindowStop => "stopped at window start",
            Self::Exhausted => "feed exhausted",
            Self::Cancelled => "cancelled",
            Self::FeedLost => "feed source lost",
        };
        f.write_str(text)
    }
}

/// Decides which media references become tasks and in what form
#[derive(Debug, Clone)]
pub struct MediaFilter {
    images: bool,
    videos: bool,
    animated: bool,
    exclude_patterns: Vec<String>,
    image_query: Option<String>,
}

impl MediaFilter {
    pub fn new(config: &MediaConfig) -> Self {
        Self {
            images: config.images,
            videos: config.videos,
            animated: config.animated,
            exclude_patterns: config.exclude_patterns.clone(),
            image_query: config.image_query.clone(),
        }
    }

    /// Returns the URL to download and its kind, or None if the reference is not wanted
    pub fn admit(&self, raw: &str) -> Option<(String, MediaKind)> {
        let raw = raw.trim();
        if raw.is_empty() || self.exclude_patterns.iter().any(|p| raw.contains(p.as_str())) {
            return None;
        }

        let kind = classify_url(raw);
        let wanted = match kind {
            MediaKind::Image => self.images,
            MediaKind::Video => self.videos,
            MediaKind::AnimatedImage => self.animated,
        };
        if !wanted {
            return None;
        }

        let url = match (kind, &self.image_query) {
            (MediaKind::Image, Some(query)) => with_query(raw, query),
            _ => raw.to_string(),
        };
        Some((url, kind))
    }
}

/// Scan tuning taken from the configuration
#[derive(Debug, Clone)]
pub struct ScanSettings {
    pub growth_attempts: u32,
    pub access_retries: u32,
    pub retry_backoff: Duration,
    pub transcript_keyword: String,
    pub variant_pass: VariantPassPolicy,
    pub filter: MediaFilter,
}

impl ScanSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            growth_attempts: config.feed.growth_attempts.max(1),
            access_retries: config.feed.access_retries.max(1),
            retry_backoff: Duration::from_millis(config.feed.retry_backoff_ms),
            transcript_keyword: config.feed.transcript_keyword.clone(),
            variant_pass: config.feed.variant_pass,
            filter: MediaFilter::new(&config.media),
        }
    }
}

/// What to do after looking at one element
enum ElementStep {
    Continue,
    Stop,
}

/// Producer of download tasks for one run
pub struct FeedScanner {
    window: WindowPolicy,
    settings: ScanSettings,
    run: Arc<RunState>,
    queue: TaskSender,
    transcript: TranscriptLog,
    progress: Arc<dyn ProgressSink>,
}

impl FeedScanner {
    pub fn new(
        window: WindowPolicy,
        settings: ScanSettings,
        run: Arc<RunState>,
        queue: TaskSender,
        transcript: TranscriptLog,
        progress: Arc<dyn ProgressSink>,
    ) -> Self {
        Self {
            window,
            settings,
            run,
            queue,
            transcript,
            progress,
        }
    }

    /// Scans the feed until a stop condition, then queues end-of-stream
    ///
    /// # Arguments
    ///
    /// * `feed` - The feed source; the scanner is its only user for the whole run
    ///
    /// # Returns
    ///
    /// How the scan ended. End-of-stream has been queued in every case.
    pub async fn run<F: FeedSource + ?Sized>(mut self, feed: &mut F) -> ScanOutcome {
        let outcome = self.scan(feed).await;
        tracing::info!(
            "Scan ended ({}), {} tasks recorded",
            outcome,
            self.transcript.recorded()
        );

        if outcome.allows_variant_pass(self.settings.variant_pass) && self.run.is_running() {
            self.variant_pass(feed).await;
        }

        self.queue.finish();
        outcome
    }

    async fn scan<F: FeedSource + ?Sized>(&mut self, feed: &mut F) -> ScanOutcome {
        let mut fruitless_growths = 0;

        loop {
            if !self.run.is_running() {
                return ScanOutcome::Cancelled;
            }
            if !feed.is_alive().await {
                self.progress.emit(&ProgressEvent::FeedLost {
                    reason: "feed source is not alive".to_string(),
                });
                return ScanOutcome::FeedLost;
            }

            let elements = match self.read_visible(feed).await {
                Ok(elements) => elements,
                Err(outcome) => return outcome,
            };

            for element in &elements {
                if !self.run.is_running() {
                    return ScanOutcome::Cancelled;
                }
                if !self.run.dedup.visit_element(&element.id) {
                    continue;
                }

                match self.process_element(feed, element).await {
                    Ok(ElementStep::Continue) => {}
                    Ok(ElementStep::Stop) => return ScanOutcome::WindowStop,
                    Err(e) if e.is_fatal() => {
                        self.progress.emit(&ProgressEvent::FeedLost {
                            reason: e.to_string(),
                        });
                        return ScanOutcome::FeedLost;
                    }
                    Err(e) => {
                        tracing::warn!("Skipping element {}: {}", element.id, e);
                        self.progress.emit(&ProgressEvent::ElementSkipped {
                            element: element.id.clone(),
                            reason: e.to_string(),
                        });
                    }
                }
            }

            if !self.run.is_running() {
                return ScanOutcome::Cancelled;
            }

            let grew = match feed.grow_feed().await {
                Ok(grew) => grew,
                Err(e) if e.is_fatal() => {
                    self.progress.emit(&ProgressEvent::FeedLost {
                        reason: e.to_string(),
                    });
                    return ScanOutcome::FeedLost;
                }
                Err(e) => {
                    tracing::warn!("Feed growth failed: {}", e);
                    false
                }
            };

            if grew {
                fruitless_growths = 0;
            } else {
                fruitless_growths += 1;
                tracing::debug!(
                    "Feed did not grow ({}/{})",
                    fruitless_growths,
                    self.settings.growth_attempts
                );
                if fruitless_growths >= self.settings.growth_attempts {
                    self.progress.emit(&ProgressEvent::FeedExhausted);
                    return ScanOutcome::Exhausted;
                }
            }
        }
    }

    /// Reads the visible elements, retrying transient failures with backoff
    ///
    /// After the last failed attempt the cycle continues with no elements.
    async fn read_visible<F: FeedSource + ?Sized>(
        &mut self,
        feed: &mut F,
    ) -> Result<Vec<FeedElement>, ScanOutcome> {
        let attempts = self.settings.access_retries;

        for attempt in 0..attempts {
            match feed.visible_elements().await {
                Ok(elements) => return Ok(elements),
                Err(e) if e.is_fatal() => {
                    self.progress.emit(&ProgressEvent::FeedLost {
                        reason: e.to_string(),
                    });
                    return Err(ScanOutcome::FeedLost);
                }
                Err(e) => {
                    tracing::warn!(
                        "Reading feed elements failed (attempt {}/{}): {}",
                        attempt + 1,
                        attempts,
                        e
                    );
                }
            }

            if attempt + 1 < attempts {
                let backoff = self.settings.retry_backoff * 2u32.saturating_pow(attempt);
                tokio::select! {
                    _ = self.run.token().cancelled() => return Err(ScanOutcome::Cancelled),
                    _ = tokio::time::sleep(backoff) => {}
                }
            }
        }

        Ok(Vec::new())
    }

    async fn process_element<F: FeedSource + ?Sized>(
        &mut self,
        feed: &mut F,
        element: &FeedElement,
    ) -> Result<ElementStep, FeedError> {
        let timestamp = feed.element_timestamp(element).await?;

        if let Some(ts) = timestamp {
            match self.window.judge(ts) {
                WindowVerdict::AtOrBeforeStart => {
                    tracing::info!(
                        "Element {} at {} is at or before the window start",
                        element.id,
                        ts.to_rfc3339()
                    );
                    self.progress.emit(&ProgressEvent::WindowStop {
                        element: element.id.clone(),
                    });
                    return Ok(ElementStep::Stop);
                }
                WindowVerdict::After => {
                    self.progress.emit(&ProgressEvent::ElementSkipped {
                        element: element.id.clone(),
                        reason: format!("{} is after the window", ts.to_rfc3339()),
                    });
                    return Ok(ElementStep::Continue);
                }
                WindowVerdict::Within => {}
            }
        }

        let link = feed.element_link(element).await?;
        let media = feed.element_media_refs(element).await?;

        for raw in media {
            self.offer(&raw, link.clone(), timestamp).await;
        }

        Ok(ElementStep::Continue)
    }

    /// Turns one raw reference into a task unless it is filtered or already queued
    ///
    /// Returns true if a task was queued.
    async fn offer(
        &mut self,
        raw: &str,
        source_context: Option<String>,
        timestamp: Option<DateTime<Utc>>,
    ) -> bool {
        let Some((url, kind)) = self.settings.filter.admit(raw) else {
            tracing::trace!("Filtered out {}", raw);
            return false;
        };

        if !self.run.dedup.claim_url(&url) {
            return false;
        }

        let reference = CandidateReference {
            source_context,
            url,
            timestamp,
            kind,
        };

        if let Err(e) = self.transcript.record_task(&reference).await {
            tracing::error!("Could not record {} in the transcript: {}", reference.url, e);
        }

        self.run.counters.record(kind, Tally::Enqueued);
        self.progress.emit(&ProgressEvent::TaskQueued {
            kind,
            url: reference.url.clone(),
        });

        if !self.queue.push(DownloadTask::Fetch(reference)) {
            tracing::debug!("Dispatcher is gone, task dropped");
        }
        true
    }

    /// Queues the best variant of every variant list found in the network transcript
    async fn variant_pass<F: FeedSource + ?Sized>(&mut self, feed: &mut F) {
        let entries = match feed.network_transcript().await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("Could not read the network transcript: {}", e);
                return;
            }
        };

        let keyword = self.settings.transcript_keyword.clone();
        let mut lists = 0;
        let mut queued = 0;

        for entry in entries
            .iter()
            .filter(|e| e.mime_type.contains("json") && e.url.contains(keyword.as_str()))
        {
            if !self.run.is_running() {
                break;
            }

            let document: serde_json::Value = match serde_json::from_str(&entry.body) {
                Ok(document) => document,
                Err(e) => {
                    tracing::debug!("Skipping unparsable response from {}: {}", entry.url, e);
                    continue;
                }
            };

            for variants in find_variant_lists(&document) {
                lists += 1;
                match resolve_variants(&variants) {
                    Ok(best) => {
                        let url = best.url.clone();
                        if self.offer(&url, None, None).await {
                            queued += 1;
                        }
                    }
                    Err(e) => tracing::debug!("Skipping variant list from {}: {}", entry.url, e),
                }
            }
        }

        self.progress
            .emit(&ProgressEvent::VariantPass { lists, queued });
    }
}
