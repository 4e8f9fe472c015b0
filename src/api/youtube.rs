//! YouTube Data API v3 catalog client
//!
//! A search is two requests: `search` for the matching videos, then
//! `videos?part=contentDetails` to attach durations.

mod model;

use std::time::Duration;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, error, warn};

use super::Catalog;
use crate::model::MediaItem;
use model::{SearchResponse, VideosResponse};

static BASE_URL: &str = "https://www.googleapis.com/youtube/v3";

/// Page size used when none is configured
pub const DEFAULT_MAX_RESULTS: u32 = 15;

const TIMEOUT: u64 = 20;

#[derive(Clone)]
pub struct YouTubeClient {
    client: Client,
    api_key: Option<String>,
    max_results: u32,
    base_url: String,
}

impl std::fmt::Debug for YouTubeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("YouTubeClient")
            .field("api_key", &self.api_key.as_ref().map(|_| "<set>"))
            .field("max_results", &self.max_results)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl YouTubeClient {
    pub fn new(api_key: Option<String>, max_results: u32) -> Self {
        Self::with_proxy(api_key, max_results, None)
    }

    /// Create a client that routes requests through `proxy_url`
    pub fn with_proxy(api_key: Option<String>, max_results: u32, proxy_url: Option<String>) -> Self {
        let mut builder = Client::builder().timeout(Duration::from_secs(TIMEOUT));
        if let Some(url) = proxy_url {
            match reqwest::Proxy::all(&url) {
                Ok(proxy) => builder = builder.proxy(proxy),
                Err(e) => warn!("Failed to set proxy {}: {}", url, e),
            }
        }
        let client = builder.build().unwrap_or_else(|e| {
            warn!("Falling back to default HTTP client: {}", e);
            Client::new()
        });

        Self {
            client,
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            max_results: max_results.clamp(1, 50),
            base_url: BASE_URL.to_string(),
        }
    }

    /// Point the client at another API root
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn max_results(&self) -> u32 {
        self.max_results
    }

    async fn try_search(&self, query: &str) -> Result<Vec<MediaItem>> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| anyhow!("YouTube API key is not configured"))?;

        let max_results = self.max_results.to_string();
        let search: SearchResponse = self
            .client
            .get(format!("{}/search", self.base_url))
            .query(&[
                ("part", "snippet"),
                ("type", "video"),
                ("maxResults", max_results.as_str()),
                ("q", query),
                ("key", api_key),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let ids = search.video_ids().join(",");
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let details: VideosResponse = self
            .client
            .get(format!("{}/videos", self.base_url))
            .query(&[
                ("part", "contentDetails"),
                ("id", ids.as_str()),
                ("key", api_key),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(search.into_media_items(&details))
    }
}

#[async_trait]
impl Catalog for YouTubeClient {
    async fn search(&self, query: &str) -> Vec<MediaItem> {
        let query = query.trim();
        if query.is_empty() {
            return Vec::new();
        }

        match self.try_search(query).await {
            Ok(items) => {
                debug!("Search {:?} returned {} items", query, items.len());
                items
            }
            Err(e) => {
                error!("Error searching videos: {}", e);
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEARCH_JSON: &str = r#"{
        "kind": "youtube#searchListResponse",
        "items": [
            {
                "id": { "kind": "youtube#video", "videoId": "vid1" },
                "snippet": {
                    "title": "First",
                    "description": "desc",
                    "channelTitle": "Chan",
                    "publishedAt": "2021-05-01T10:00:00Z",
                    "thumbnails": {
                        "default": { "url": "https://img/default.jpg" },
                        "high": { "url": "https://img/high.jpg" }
                    }
                }
            },
            {
                "id": { "kind": "youtube#channel", "channelId": "chan" },
                "snippet": { "title": "A channel" }
            },
            {
                "id": { "kind": "youtube#video", "videoId": "vid2" },
                "snippet": {
                    "title": "Second",
                    "channelTitle": "Chan",
                    "thumbnails": { "medium": { "url": "https://img/medium.jpg" } }
                }
            }
        ]
    }"#;

    const VIDEOS_JSON: &str = r#"{
        "items": [
            { "id": "vid1", "contentDetails": { "duration": "PT4M13S" } }
        ]
    }"#;

    #[test]
    fn test_map_search_results() {
        let search: SearchResponse = serde_json::from_str(SEARCH_JSON).unwrap();
        assert_eq!(search.video_ids(), vec!["vid1", "vid2"]);

        let details: VideosResponse = serde_json::from_str(VIDEOS_JSON).unwrap();
        let items = search.into_media_items(&details);

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id, "vid1");
        assert_eq!(items[0].thumbnail_url, "https://img/high.jpg");
        assert_eq!(items[0].duration_encoded.as_deref(), Some("PT4M13S"));
        assert_eq!(
            items[0].published_at.as_deref(),
            Some("2021-05-01T10:00:00Z")
        );
        assert_eq!(items[1].id, "vid2");
        assert_eq!(items[1].thumbnail_url, "https://img/medium.jpg");
        assert!(items[1].duration_encoded.is_none());
        assert!(items[1].published_at.is_none());
    }

    #[test]
    fn test_empty_response_decodes() {
        let search: SearchResponse = serde_json::from_str("{}").unwrap();
        assert!(search.video_ids().is_empty());
        let items = search.into_media_items(&VideosResponse::default());
        assert!(items.is_empty());
    }

    #[test]
    fn test_max_results_clamped() {
        assert_eq!(YouTubeClient::new(None, 0).max_results(), 1);
        assert_eq!(YouTubeClient::new(None, 500).max_results(), 50);
        assert_eq!(
            YouTubeClient::new(None, DEFAULT_MAX_RESULTS).max_results(),
            15
        );
    }

    #[tokio::test]
    async fn test_missing_key_returns_empty() {
        let client = YouTubeClient::new(Some("   ".to_string()), DEFAULT_MAX_RESULTS);
        assert!(client.search("lofi beats").await.is_empty());
    }

    #[tokio::test]
    async fn test_blank_query_returns_empty() {
        let client = YouTubeClient::new(Some("key".to_string()), DEFAULT_MAX_RESULTS);
        assert!(client.search("  ").await.is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_host_returns_empty() {
        let client = YouTubeClient::new(Some("key".to_string()), DEFAULT_MAX_RESULTS)
            .with_base_url("http://127.0.0.1:9/youtube/v3");
        assert!(client.search("anything").await.is_empty());
    }
}
