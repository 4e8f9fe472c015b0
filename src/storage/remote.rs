//! Remote collection store
//!
//! A keyed collection (`id -> MediaItem`) shared across devices. Writes are
//! per item; reads only happen through a subscription that yields the
//! complete collection once on subscribe and again after every change.
//!
//! Intermediate states may be skipped when several writes land close
//! together, only the final state is guaranteed to be delivered.

mod memory;
mod realtime;

use async_trait::async_trait;
use futures_util::stream::BoxStream;

use crate::model::MediaItem;

pub use memory::MemoryRemote;
pub use realtime::RealtimeDbRemote;

/// Stream of full-collection snapshots; dropping it unsubscribes
pub type SnapshotStream = BoxStream<'static, Vec<MediaItem>>;

/// Characters the realtime database refuses in keys
const FORBIDDEN_KEY_CHARS: [char; 6] = ['.', '$', '#', '[', ']', '/'];

/// Remote store errors
#[derive(Debug, Clone)]
pub enum RemoteError {
    /// Backend unreachable or not configured
    Unavailable(String),
    /// Transport-level failure
    Http(String),
    /// Backend answered with a non-success status
    Status(u16),
    /// Response body could not be decoded
    Parse(String),
    /// Id cannot be used as a key
    InvalidKey(String),
}

impl std::fmt::Display for RemoteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RemoteError::Unavailable(e) => write!(f, "Remote store unavailable: {}", e),
            RemoteError::Http(e) => write!(f, "Remote request failed: {}", e),
            RemoteError::Status(code) => write!(f, "Remote store returned status {}", code),
            RemoteError::Parse(e) => write!(f, "Remote response parse error: {}", e),
            RemoteError::InvalidKey(key) => write!(f, "Invalid remote key: {:?}", key),
        }
    }
}

impl std::error::Error for RemoteError {}

impl From<reqwest::Error> for RemoteError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => RemoteError::Status(status.as_u16()),
            None => RemoteError::Http(e.to_string()),
        }
    }
}

/// Backend holding the shared liked collection
#[async_trait]
pub trait RemoteStore: Send + Sync + 'static {
    /// Establish connectivity; an error leaves the app in local-only mode
    async fn initialize(&self) -> Result<(), RemoteError>;

    /// Open a snapshot subscription
    ///
    /// The first item is the collection as it is now (empty if none exists).
    fn subscribe(&self) -> SnapshotStream;

    /// Upsert one entry keyed by `item.id`
    async fn put(&self, item: &MediaItem) -> Result<(), RemoteError>;

    /// Delete one entry; a missing key is not an error
    async fn remove(&self, id: &str) -> Result<(), RemoteError>;

    /// Delete every entry under the collection
    async fn clear_all(&self) -> Result<(), RemoteError>;
}

/// Reject ids the backend can't use as keys
pub fn validate_key(id: &str) -> Result<(), RemoteError> {
    if id.is_empty() || id.contains(FORBIDDEN_KEY_CHARS) {
        return Err(RemoteError::InvalidKey(id.to_string()));
    }
    Ok(())
}
