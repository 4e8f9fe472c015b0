//! melody-stream - music discovery client core
//!
//! Catalog search, playback transport state, and a liked songs collection
//! synced between a local snapshot and a shared remote store.

pub mod api;
pub mod liked;
pub mod model;
pub mod playback;
pub mod settings;
pub mod storage;
pub mod utils;

pub use api::{Catalog, YouTubeClient};
pub use liked::{LikedSongs, RetryPolicy, SyncState};
pub use model::MediaItem;
pub use playback::{NowPlaying, Playback, PlayerEvent, PlayerState};
pub use settings::Settings;
pub use storage::{LocalStore, MemoryRemote, RealtimeDbRemote, RemoteError, RemoteStore};
