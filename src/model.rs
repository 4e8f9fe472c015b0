//! Media item model
//!
//! `MediaItem` is the catalog record shared by search, playback and the
//! liked collection. Identity is the opaque catalog `id`; everything else is
//! display metadata.

use std::hash::{Hash, Hasher};
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static ISO_DURATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^PT(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)S)?$").expect("duration pattern is valid")
});

/// A playable catalog entry
///
/// Equality and hashing only look at `id`, so two records for the same
/// video with different metadata are the same item.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaItem {
    /// Opaque catalog identifier, key in both stores
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Thumbnail URL
    #[serde(default, rename = "thumbnail")]
    pub thumbnail_url: String,
    /// Channel / artist attribution
    #[serde(default)]
    pub channel_title: String,
    /// Publication timestamp as delivered by the catalog
    #[serde(default)]
    pub published_at: Option<String>,
    /// Encoded duration, e.g. `PT3M21S`
    #[serde(default, rename = "duration")]
    pub duration_encoded: Option<String>,
}

impl MediaItem {
    /// Create an item with only an id and title set
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            thumbnail_url: String::new(),
            channel_title: String::new(),
            published_at: None,
            duration_encoded: None,
        }
    }

    /// Decoded duration, `None` when absent or not in `PT#H#M#S` form
    pub fn duration(&self) -> Option<Duration> {
        self.duration_encoded.as_deref().and_then(parse_iso_duration)
    }

    /// Field-by-field comparison, unlike `==` which compares ids only
    pub fn same_record(&self, other: &MediaItem) -> bool {
        self.id == other.id
            && self.title == other.title
            && self.description == other.description
            && self.thumbnail_url == other.thumbnail_url
            && self.channel_title == other.channel_title
            && self.published_at == other.published_at
            && self.duration_encoded == other.duration_encoded
    }
}

impl PartialEq for MediaItem {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for MediaItem {}

impl Hash for MediaItem {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Parse a `PT#H#M#S` duration
///
/// Every component is optional, but at least one must be present.
pub fn parse_iso_duration(encoded: &str) -> Option<Duration> {
    let caps = ISO_DURATION.captures(encoded.trim())?;
    if caps.iter().skip(1).all(|c| c.is_none()) {
        return None;
    }

    let part = |i: usize| -> Option<u64> {
        match caps.get(i) {
            Some(m) => m.as_str().parse().ok(),
            None => Some(0),
        }
    };

    let hours = part(1)?;
    let minutes = part(2)?;
    let seconds = part(3)?;
    let total = hours
        .checked_mul(3600)?
        .checked_add(minutes.checked_mul(60)?)?
        .checked_add(seconds)?;
    Some(Duration::from_secs(total))
}

/// Drop repeated ids, keeping the first occurrence and the original order
pub fn dedup_by_id(items: Vec<MediaItem>) -> Vec<MediaItem> {
    let mut seen = std::collections::HashSet::with_capacity(items.len());
    items
        .into_iter()
        .filter(|item| seen.insert(item.id.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_item() -> MediaItem {
        MediaItem {
            id: "dQw4w9WgXcQ".to_string(),
            title: "Song A".to_string(),
            description: "An \"official\" video".to_string(),
            thumbnail_url: "https://i.ytimg.com/vi/dQw4w9WgXcQ/hqdefault.jpg".to_string(),
            channel_title: "Channel".to_string(),
            published_at: Some("2009-10-25T06:57:33Z".to_string()),
            duration_encoded: Some("PT3M33S".to_string()),
        }
    }

    #[test]
    fn test_equality_is_by_id() {
        let a = MediaItem::new("a", "First title");
        let b = MediaItem::new("a", "Second title");
        let c = MediaItem::new("c", "First title");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(!a.same_record(&b));
    }

    #[test]
    fn test_serialization_round_trip() {
        let item = full_item();
        let json = serde_json::to_string(&item).unwrap();
        let back: MediaItem = serde_json::from_str(&json).unwrap();
        assert!(back.same_record(&item));
    }

    #[test]
    fn test_absent_optionals_round_trip_as_null() {
        let item = MediaItem::new("x", "No extras");
        let value = serde_json::to_value(&item).unwrap();
        assert!(value["duration"].is_null());
        assert!(value["publishedAt"].is_null());

        let back: MediaItem = serde_json::from_value(value).unwrap();
        assert!(back.same_record(&item));
        assert!(back.duration_encoded.is_none());
        assert!(back.published_at.is_none());
    }

    #[test]
    fn test_wire_names() {
        let value = serde_json::to_value(full_item()).unwrap();
        for key in [
            "id",
            "title",
            "description",
            "thumbnail",
            "channelTitle",
            "publishedAt",
            "duration",
        ] {
            assert!(value.get(key).is_some(), "missing key {}", key);
        }
    }

    #[test]
    fn test_omitted_fields_deserialize() {
        let item: MediaItem = serde_json::from_str(r#"{"id":"only-id"}"#).unwrap();
        assert_eq!(item.id, "only-id");
        assert!(item.title.is_empty());
        assert!(item.duration_encoded.is_none());
    }

    #[test]
    fn test_parse_iso_duration() {
        assert_eq!(parse_iso_duration("PT3M33S"), Some(Duration::from_secs(213)));
        assert_eq!(
            parse_iso_duration("PT1H2M3S"),
            Some(Duration::from_secs(3723))
        );
        assert_eq!(parse_iso_duration("PT45S"), Some(Duration::from_secs(45)));
        assert_eq!(parse_iso_duration("PT2H"), Some(Duration::from_secs(7200)));
        assert_eq!(parse_iso_duration("PT"), None);
        assert_eq!(parse_iso_duration("P1D"), None);
        assert_eq!(parse_iso_duration("garbage"), None);
    }

    #[test]
    fn test_parse_iso_duration_out_of_range() {
        assert_eq!(parse_iso_duration("PT9999999999999999H"), None);
        assert_eq!(parse_iso_duration("PT99999999999999999999S"), None);
        assert_eq!(parse_iso_duration("PT18446744073709551615M"), None);

        let item = MediaItem {
            duration_encoded: Some("PT9999999999999999H".to_string()),
            ..MediaItem::new("a", "A")
        };
        assert_eq!(item.duration(), None);
    }

    #[test]
    fn test_item_duration() {
        assert_eq!(full_item().duration(), Some(Duration::from_secs(213)));
        assert_eq!(MediaItem::new("a", "A").duration(), None);
    }

    #[test]
    fn test_dedup_by_id_keeps_first() {
        let items = vec![
            MediaItem::new("a", "first"),
            MediaItem::new("b", "b"),
            MediaItem::new("a", "second"),
        ];
        let deduped = dedup_by_id(items);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].title, "first");
        assert_eq!(deduped[1].id, "b");
    }
}
