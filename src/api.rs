//! Catalog search
//!
//! Provides the search capability the UI consumes: a query string in, an
//! ordered page of media items out. Implementations never fail; problems are
//! logged and surface as an empty result.

mod youtube;

use async_trait::async_trait;

use crate::model::MediaItem;

pub use youtube::{DEFAULT_MAX_RESULTS, YouTubeClient};

/// Searchable media catalog
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn search(&self, query: &str) -> Vec<MediaItem>;
}
