//! YouTube Data API response types
//!
//! Only the fields the catalog mapping reads are modelled; everything is
//! defaulted so partial responses still decode.

use std::collections::HashMap;

use serde::Deserialize;

use crate::model::MediaItem;

#[derive(Debug, Default, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
pub struct SearchItem {
    pub id: SearchId,
    #[serde(default)]
    pub snippet: Snippet,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchId {
    pub video_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snippet {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub channel_title: String,
    pub published_at: Option<String>,
    #[serde(default)]
    pub thumbnails: Thumbnails,
}

#[derive(Debug, Default, Deserialize)]
pub struct Thumbnails {
    pub high: Option<Thumbnail>,
    pub medium: Option<Thumbnail>,
    pub default: Option<Thumbnail>,
}

impl Thumbnails {
    /// Best available thumbnail URL, largest first
    pub fn best_url(&self) -> String {
        [&self.high, &self.medium, &self.default]
            .into_iter()
            .flatten()
            .map(|t| t.url.clone())
            .next()
            .unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
pub struct Thumbnail {
    pub url: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct VideosResponse {
    #[serde(default)]
    pub items: Vec<VideoDetails>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoDetails {
    pub id: String,
    pub content_details: Option<ContentDetails>,
}

#[derive(Debug, Deserialize)]
pub struct ContentDetails {
    pub duration: Option<String>,
}

impl SearchResponse {
    /// Ids of the video results, in result order
    pub fn video_ids(&self) -> Vec<&str> {
        self.items
            .iter()
            .filter_map(|item| item.id.video_id.as_deref())
            .collect()
    }

    /// Build media items, attaching durations from the details response
    pub fn into_media_items(self, details: &VideosResponse) -> Vec<MediaItem> {
        let durations: HashMap<&str, &str> = details
            .items
            .iter()
            .filter_map(|video| {
                let duration = video.content_details.as_ref()?.duration.as_deref()?;
                Some((video.id.as_str(), duration))
            })
            .collect();

        self.items
            .into_iter()
            .filter_map(|item| {
                let id = item.id.video_id?;
                let duration_encoded = durations.get(id.as_str()).map(|d| d.to_string());
                Some(MediaItem {
                    thumbnail_url: item.snippet.thumbnails.best_url(),
                    title: item.snippet.title,
                    description: item.snippet.description,
                    channel_title: item.snippet.channel_title,
                    published_at: item.snippet.published_at,
                    duration_encoded,
                    id,
                })
            })
            .collect()
    }
}
