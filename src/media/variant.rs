//! Encoded variant selection
//!
//! Video assets are usually published as a list of encodings of the same
//! clip at different bitrates. The resolver deterministically picks the one
//! with the highest bitrate.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// One encoded quality option of a media asset
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EncodedVariant {
    pub bitrate: u64,
    pub url: String,
}

impl EncodedVariant {
    pub fn new(bitrate: u64, url: impl Into<String>) -> Self {
        Self {
            bitrate,
            url: url.into(),
        }
    }
}

/// Variant resolution errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum VariantError {
    #[error("variant list is empty")]
    EmptyVariantSet,
}

/// Picks the variant with the highest bitrate
///
/// Ties are broken in favour of the variant seen first.
///
/// # Examples
///
/// ```
/// use media_harvest::media::{resolve_variants, EncodedVariant};
///
/// let variants = vec![
///     EncodedVariant::new(100, "a"),
///     EncodedVariant::new(500, "b"),
///     EncodedVariant::new(500, "c"),
/// ];
/// assert_eq!(resolve_variants(&variants).unwrap().url, "b");
/// assert!(resolve_variants(&[]).is_err());
/// ```
pub fn resolve_variants(variants: &[EncodedVariant]) -> Result<&EncodedVariant, VariantError> {
    let mut best: Option<&EncodedVariant> = None;

    for variant in variants {
        match best {
            Some(current) if variant.bitrate <= current.bitrate => {}
            _ => best = Some(variant),
        }
    }

    best.ok_or(VariantError::EmptyVariantSet)
}

/// Collects every variant list found anywhere in a JSON document
///
/// A variant list is the array value of any `variants` key. Entries without
/// a numeric `bitrate` or a string `url` (streaming playlists, for example)
/// are not downloadable variants and are left out, so a returned list may be
/// empty.
pub fn find_variant_lists(document: &Value) -> Vec<Vec<EncodedVariant>> {
    let mut lists = Vec::new();
    collect_variant_lists(document, &mut lists);
    lists
}

fn collect_variant_lists(value: &Value, lists: &mut Vec<Vec<EncodedVariant>>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                if key == "variants" {
                    if let Value::Array(entries) = child {
                        lists.push(
                            entries
                                .iter()
                                .filter_map(|entry| {
                                    serde_json::from_value::<EncodedVariant>(entry.clone()).ok()
                                })
                                .collect(),
                        );
                        continue;
                    }
                }
                collect_variant_lists(child, lists);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_variant_lists(item, lists);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resolve_highest_bitrate() {
        let variants = vec![
            EncodedVariant::new(832_000, "https://v.example.com/480.mp4"),
            EncodedVariant::new(2_176_000, "https://v.example.com/720.mp4"),
            EncodedVariant::new(256_000, "https://v.example.com/240.mp4"),
        ];
        assert_eq!(
            resolve_variants(&variants).unwrap().url,
            "https://v.example.com/720.mp4"
        );
    }

    #[test]
    fn test_resolve_tie_prefers_first_seen() {
        let variants = vec![
            EncodedVariant::new(100, "a"),
            EncodedVariant::new(500, "b"),
            EncodedVariant::new(500, "c"),
        ];
        assert_eq!(resolve_variants(&variants).unwrap().url, "b");
    }

    #[test]
    fn test_resolve_zero_bitrate_single() {
        let variants = vec![EncodedVariant::new(0, "only")];
        assert_eq!(resolve_variants(&variants).unwrap().url, "only");
    }

    #[test]
    fn test_resolve_empty() {
        assert_eq!(resolve_variants(&[]), Err(VariantError::EmptyVariantSet));
    }

    #[test]
    fn test_find_nested_variant_lists() {
        let document = json!({
            "data": {
                "timeline": [
                    {
                        "media": {
                            "video_info": {
                                "variants": [
                                    { "bitrate": 256000, "url": "https://v.example.com/a/240.mp4", "content_type": "video/mp4" },
                                    { "content_type": "application/x-mpegURL", "url": "https://v.example.com/a/pl.m3u8" },
                                    { "bitrate": 832000, "url": "https://v.example.com/a/480.mp4", "content_type": "video/mp4" }
                                ]
                            }
                        }
                    },
                    {
                        "media": {
                            "video_info": {
                                "variants": [
                                    { "bitrate": 0, "url": "https://v.example.com/tweet_video/b.mp4" }
                                ]
                            }
                        }
                    }
                ]
            }
        });

        let lists = find_variant_lists(&document);
        assert_eq!(lists.len(), 2);
        assert_eq!(lists[0].len(), 2);
        assert_eq!(
            resolve_variants(&lists[0]).unwrap().url,
            "https://v.example.com/a/480.mp4"
        );
        assert_eq!(lists[1], vec![EncodedVariant::new(0, "https://v.example.com/tweet_video/b.mp4")]);
    }

    #[test]
    fn test_playlist_only_list_is_empty() {
        let document = json!({
            "variants": [ { "content_type": "application/x-mpegURL", "url": "https://v.example.com/pl.m3u8" } ]
        });

        let lists = find_variant_lists(&document);
        assert_eq!(lists.len(), 1);
        assert!(lists[0].is_empty());
        assert!(resolve_variants(&lists[0]).is_err());
    }

    #[test]
    fn test_no_variants() {
        assert!(find_variant_lists(&json!({ "entries": [1, 2, 3] })).is_empty());
        assert!(find_variant_lists(&json!("variants")).is_empty());
    }
}
