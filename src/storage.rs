//! Persistence backends for the liked collection
//!
//! - `local`: synchronous JSON snapshot in the user's data directory
//! - `remote`: keyed, subscribable store shared across devices

pub mod local;
pub mod remote;

pub use local::{LIKED_SONGS_KEY, LocalStore, LocalStoreError};
pub use remote::{
    MemoryRemote, RealtimeDbRemote, RemoteError, RemoteStore, SnapshotStream, validate_key,
};
