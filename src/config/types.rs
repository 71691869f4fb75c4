use serde::Deserialize;

/// Main configuration structure for Media-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub window: WindowConfig,
    pub feed: FeedConfig,
    #[serde(default)]
    pub media: MediaConfig,
    #[serde(default)]
    pub workers: WorkerConfig,
    #[serde(default)]
    pub dispatcher: DispatcherConfig,
    #[serde(default)]
    pub drain: DrainConfig,
    #[serde(default)]
    pub http: HttpConfig,
    pub output: OutputConfig,
}

/// Time window applied to feed elements
#[derive(Debug, Clone, Deserialize)]
pub struct WindowConfig {
    /// Oldest instant of interest (`YYYY-MM-DD` or RFC 3339)
    pub start: Option<String>,

    /// Newest instant of interest (`YYYY-MM-DD` or RFC 3339)
    pub end: Option<String>,

    /// Whether the window filters and terminates scanning at all
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            start: None,
            end: None,
            enabled: false,
        }
    }
}

/// When the out-of-band variant extraction pass runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum VariantPassPolicy {
    /// Only when the feed is exhausted naturally
    #[default]
    NaturalOnly,
    /// Also after a hard window stop
    Always,
    /// Never
    Never,
}

/// Feed source and scanning configuration
#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    /// Paginated JSON endpoint of the feed
    pub endpoint: String,

    /// Query parameter carrying the pagination cursor
    #[serde(rename = "cursor-param", default = "default_cursor_param")]
    pub cursor_param: String,

    /// Substring a transcript URL must contain to be searched for variants
    #[serde(rename = "transcript-keyword")]
    pub transcript_keyword: String,

    /// Delay after each page fetch (milliseconds)
    #[serde(rename = "page-delay-ms", default = "default_page_delay_ms")]
    pub page_delay_ms: u64,

    /// Consecutive fruitless growth attempts before the feed counts as exhausted
    #[serde(rename = "growth-attempts", default = "default_growth_attempts")]
    pub growth_attempts: u32,

    /// Attempts at reading the visible elements before giving up on a cycle
    #[serde(rename = "access-retries", default = "default_access_retries")]
    pub access_retries: u32,

    /// Base backoff between element read attempts (milliseconds)
    #[serde(rename = "retry-backoff-ms", default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    #[serde(rename = "variant-pass", default)]
    pub variant_pass: VariantPassPolicy,
}

/// Which media are harvested and how their references are normalized
#[derive(Debug, Clone, Deserialize)]
pub struct MediaConfig {
    #[serde(default = "default_true")]
    pub images: bool,

    #[serde(default = "default_true")]
    pub videos: bool,

    #[serde(default = "default_true")]
    pub animated: bool,

    /// References containing any of these substrings are ignored
    #[serde(rename = "exclude-patterns", default = "default_exclude_patterns")]
    pub exclude_patterns: Vec<String>,

    /// Query string that replaces the query of image references
    #[serde(rename = "image-query", default)]
    pub image_query: Option<String>,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            images: true,
            videos: true,
            animated: true,
            exclude_patterns: default_exclude_patterns(),
            image_query: None,
        }
    }
}

/// Download worker pool configuration
#[derive(Debug, Clone, Deserialize)]
pub struct WorkerConfig {
    #[serde(rename = "image-concurrency", default = "default_image_concurrency")]
    pub image_concurrency: u32,

    #[serde(rename = "video-concurrency", default = "default_video_concurrency")]
    pub video_concurrency: u32,

    #[serde(rename = "image-timeout-secs", default = "default_image_timeout")]
    pub image_timeout_secs: u64,

    #[serde(rename = "video-timeout-secs", default = "default_video_timeout")]
    pub video_timeout_secs: u64,

    /// Pause after each successful download (milliseconds)
    #[serde(rename = "politeness-delay-ms", default = "default_politeness_delay_ms")]
    pub politeness_delay_ms: u64,

    /// Soft cap on spawned-but-unfinished workers before the dispatcher waits
    #[serde(rename = "max-pending", default = "default_max_pending")]
    pub max_pending: u32,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            image_concurrency: default_image_concurrency(),
            video_concurrency: default_video_concurrency(),
            image_timeout_secs: default_image_timeout(),
            video_timeout_secs: default_video_timeout(),
            politeness_delay_ms: default_politeness_delay_ms(),
            max_pending: default_max_pending(),
        }
    }
}

/// Dispatcher polling configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DispatcherConfig {
    #[serde(rename = "pop-timeout-ms", default = "default_pop_timeout_ms")]
    pub pop_timeout_ms: u64,

    /// Consecutive empty polls after which the dispatcher ends the run
    #[serde(rename = "max-idle-polls", default = "default_max_idle_polls")]
    pub max_idle_polls: u32,

    #[serde(rename = "backpressure-poll-ms", default = "default_backpressure_poll_ms")]
    pub backpressure_poll_ms: u64,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            pop_timeout_ms: default_pop_timeout_ms(),
            max_idle_polls: default_max_idle_polls(),
            backpressure_poll_ms: default_backpressure_poll_ms(),
        }
    }
}

/// Shutdown timing
#[derive(Debug, Clone, Deserialize)]
pub struct DrainConfig {
    #[serde(rename = "timeout-secs", default = "default_drain_timeout")]
    pub timeout_secs: u64,

    #[serde(rename = "grace-secs", default = "default_drain_grace")]
    pub grace_secs: u64,

    #[serde(rename = "worker-timeout-secs", default = "default_worker_drain_timeout")]
    pub worker_timeout_secs: u64,
}

impl Default for DrainConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_drain_timeout(),
            grace_secs: default_drain_grace(),
            worker_timeout_secs: default_worker_drain_timeout(),
        }
    }
}

/// HTTP client identification
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,

    #[serde(rename = "connect-timeout-secs", default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Directory receiving images, the transcript and the manifest
    pub directory: String,

    /// Sub-directory receiving videos and animated images
    #[serde(rename = "video-subdir", default = "default_video_subdir")]
    pub video_subdir: String,

    #[serde(rename = "transcript-name", default = "default_transcript_name")]
    pub transcript_name: String,

    #[serde(rename = "manifest-name", default = "default_manifest_name")]
    pub manifest_name: String,
}

fn default_true() -> bool {
    true
}

fn default_cursor_param() -> String {
    "cursor".to_string()
}

fn default_page_delay_ms() -> u64 {
    3000
}

fn default_growth_attempts() -> u32 {
    2
}

fn default_access_retries() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    1000
}

fn default_exclude_patterns() -> Vec<String> {
    vec!["profile_images".to_string()]
}

fn default_image_concurrency() -> u32 {
    10
}

fn default_video_concurrency() -> u32 {
    3
}

fn default_image_timeout() -> u64 {
    10
}

fn default_video_timeout() -> u64 {
    15
}

fn default_politeness_delay_ms() -> u64 {
    500
}

fn default_max_pending() -> u32 {
    5
}

fn default_pop_timeout_ms() -> u64 {
    5000
}

fn default_max_idle_polls() -> u32 {
    10
}

fn default_backpressure_poll_ms() -> u64 {
    500
}

fn default_drain_timeout() -> u64 {
    60
}

fn default_drain_grace() -> u64 {
    10
}

fn default_worker_drain_timeout() -> u64 {
    30
}

fn default_user_agent() -> String {
    concat!("media-harvest/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_video_subdir() -> String {
    "video".to_string()
}

fn default_transcript_name() -> String {
    "transcript.txt".to_string()
}

fn default_manifest_name() -> String {
    "manifest.txt".to_string()
}
