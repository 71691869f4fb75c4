//! Media classification and naming
//!
//! This module provides:
//! - Classification of a media URL into a [`MediaKind`] through an ordered rule table
//! - Deterministic file names derived from a media URL
//! - Selection of the best encoded variant of a video asset

mod variant;

pub use variant::{find_variant_lists, resolve_variants, EncodedVariant, VariantError};

use std::fmt;
use url::Url;

/// Kind of a media asset, inferred from its URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    /// Still image
    Image,
    /// Video with its own audio track
    Video,
    /// Short looping clip served as video (rendered as an animated image)
    AnimatedImage,
}

/// Worker pool a media kind is downloaded in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoolClass {
    Image,
    Video,
}

impl MediaKind {
    /// Returns the worker pool serving this kind
    pub fn pool(&self) -> PoolClass {
        match self {
            Self::Image => PoolClass::Image,
            Self::Video | Self::AnimatedImage => PoolClass::Video,
        }
    }

    /// Extension appended when the URL carries none for this kind
    pub fn default_extension(&self) -> &'static str {
        match self {
            Self::Image => "png",
            Self::Video => "mp4",
            Self::AnimatedImage => "gif",
        }
    }

    /// Extensions accepted as already belonging to this kind
    fn known_extensions(&self) -> &'static [&'static str] {
        match self {
            Self::Image => &["png", "jpg", "jpeg", "webp", "bmp"],
            Self::Video => &["mp4", "m4v", "mov", "webm"],
            Self::AnimatedImage => &["gif"],
        }
    }

    /// Short label used in transcripts and reports
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
            Self::AnimatedImage => "animated",
        }
    }

    /// Parses the label written by [`MediaKind::as_str`]
    pub fn from_label(s: &str) -> Option<Self> {
        match s {
            "image" => Some(Self::Image),
            "video" => Some(Self::Video),
            "animated" => Some(Self::AnimatedImage),
            _ => None,
        }
    }

    pub fn all() -> [Self; 3] {
        [Self::Image, Self::Video, Self::AnimatedImage]
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Condition of one classification rule
#[derive(Debug, Clone, Copy)]
enum Matcher {
    /// A path segment equal to the value
    Segment(&'static str),
    /// The last path segment ends with `.<value>` (case-insensitive)
    Extension(&'static str),
}

/// Classification rules, evaluated in order; the first match wins.
const RULES: &[(Matcher, MediaKind)] = &[
    (Matcher::Segment("tweet_video"), MediaKind::AnimatedImage),
    (Matcher::Segment("pu"), MediaKind::Video),
    (Matcher::Segment("amplify_video"), MediaKind::Video),
    (Matcher::Segment("ext_tw_video"), MediaKind::Video),
    (Matcher::Extension("gif"), MediaKind::AnimatedImage),
    (Matcher::Extension("mp4"), MediaKind::Video),
    (Matcher::Extension("m4v"), MediaKind::Video),
    (Matcher::Extension("mov"), MediaKind::Video),
    (Matcher::Extension("webm"), MediaKind::Video),
];

/// Classifies a media URL
///
/// Only the URL path is inspected, so query strings such as `?format=mp4` on an
/// image never change the outcome. URLs that do not parse are classified from
/// their raw text with the query stripped.
///
/// # Examples
///
/// ```
/// use media_harvest::media::{classify_url, MediaKind};
///
/// assert_eq!(
///     classify_url("https://video.example.com/tweet_video/Fx1.mp4"),
///     MediaKind::AnimatedImage
/// );
/// assert_eq!(
///     classify_url("https://video.example.com/ext_tw_video/1/pu/vid/720x1280/a.mp4?tag=12"),
///     MediaKind::Video
/// );
/// assert_eq!(
///     classify_url("https://img.example.com/media/Gabc?format=png&name=large"),
///     MediaKind::Image
/// );
/// ```
pub fn classify_url(url: &str) -> MediaKind {
    let segments = path_segments(url);

    for (matcher, kind) in RULES {
        let hit = match matcher {
            Matcher::Segment(name) => segments.iter().any(|s| s == name),
            Matcher::Extension(ext) => segments
                .last()
                .and_then(|last| extension_of(last))
                .is_some_and(|e| e.eq_ignore_ascii_case(ext)),
        };
        if hit {
            return *kind;
        }
    }

    MediaKind::Image
}

/// Derives the local file name for a media URL
///
/// The name is the last path segment with the query removed and
/// percent-decoding applied. If that segment already ends in an extension
/// belonging to `kind` it is kept as is; otherwise any extension is replaced
/// by the kind's extension. Images take their extension from a `format=`
/// query parameter when there is one.
///
/// The worker pool and the run reconciler both rely on this function, so a
/// file written by one is always found by the other.
///
/// # Examples
///
/// ```
/// use media_harvest::media::{media_file_name, MediaKind};
///
/// assert_eq!(
///     media_file_name("https://img.example.com/media/Gabc?format=png&name=large", MediaKind::Image),
///     "Gabc.png"
/// );
/// assert_eq!(
///     media_file_name("https://video.example.com/tweet_video/Fx1.mp4", MediaKind::AnimatedImage),
///     "Fx1.gif"
/// );
/// ```
pub fn media_file_name(url: &str, kind: MediaKind) -> String {
    let segments = path_segments(url);
    let raw = segments
        .last()
        .cloned()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "media".to_string());

    let decoded = urlencoding::decode(&raw)
        .map(|s| s.into_owned())
        .unwrap_or(raw);
    let decoded = sanitize_file_name(&decoded);

    if let Some(ext) = extension_of(&decoded) {
        if kind
            .known_extensions()
            .iter()
            .any(|k| k.eq_ignore_ascii_case(ext))
        {
            return decoded;
        }
    }

    let stem = match extension_of(&decoded) {
        Some(ext) => &decoded[..decoded.len() - ext.len() - 1],
        None => decoded.as_str(),
    };

    let extension = match kind {
        MediaKind::Image => format_param(url).unwrap_or_else(|| kind.default_extension().into()),
        _ => kind.default_extension().to_string(),
    };

    format!("{}.{}", stem, extension)
}

/// Replaces a media URL's query string, used to request a specific rendition
pub fn with_query(url: &str, query: &str) -> String {
    let base = url.split(['?', '#']).next().unwrap_or(url);
    format!("{}?{}", base, query)
}

/// Path segments of a URL, falling back to plain string splitting
fn path_segments(url: &str) -> Vec<String> {
    match Url::parse(url) {
        Ok(parsed) => parsed
            .path_segments()
            .map(|segments| segments.map(str::to_string).collect())
            .unwrap_or_default(),
        Err(_) => {
            let path = url.split(['?', '#']).next().unwrap_or(url);
            path.split('/').map(str::to_string).collect()
        }
    }
}

/// Extension of a file name, without the dot
fn extension_of(name: &str) -> Option<&str> {
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext)
}

/// Value of the `format` query parameter, if it is a plain token
fn format_param(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    parsed
        .query_pairs()
        .find(|(key, _)| key == "format")
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty() && value.chars().all(|c| c.is_ascii_alphanumeric()))
}

/// Removes characters that cannot appear in a single path component
fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            c => c,
        })
        .collect()
}
