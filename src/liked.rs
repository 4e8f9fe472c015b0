//! Liked songs collection
//!
//! `LikedSongs` owns the in-memory collection shown to the UI and keeps it in
//! step with the two persistence backends:
//!
//! - every mutation updates memory and the local snapshot before returning,
//!   then queues the matching remote write
//! - every remote snapshot replaces the collection wholesale and is mirrored
//!   into the local snapshot, so the remote wins whenever it is reachable
//! - a snapshot taken before one of our own queued writes finished is stale
//!   and is dropped; a later snapshot will carry that write
//!
//! Persistence failures are logged and never undo an in-memory change.
//!
//! ## Lifecycle
//! ```text
//! Uninitialized --load_local--> LocalLoaded --attach_remote--> RemoteAttached
//!                                           \------(fails)---> RemoteUnavailable
//! ```

mod retry;
mod writer;

use std::sync::Arc;
use std::sync::atomic::Ordering;

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::model::{MediaItem, dedup_by_id};
use crate::storage::{LocalStore, RemoteStore};

pub use retry::RetryPolicy;
pub use writer::{RemoteWriter, WriteOp};

/// Where the collection currently comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Nothing loaded yet
    Uninitialized,
    /// Local snapshot loaded, remote not tried yet
    LocalLoaded,
    /// Subscribed to the remote store
    RemoteAttached,
    /// Remote unreachable or not configured; local-only for this session
    RemoteUnavailable,
}

impl SyncState {
    pub fn is_remote_attached(&self) -> bool {
        matches!(self, SyncState::RemoteAttached)
    }
}

/// A remote snapshot tagged with how many of our writes had finished
/// when it was received
#[derive(Debug)]
struct RemoteSnapshot {
    writes_done: u64,
    items: Vec<MediaItem>,
}

/// The user's liked collection
pub struct LikedSongs {
    items: Vec<MediaItem>,
    local: LocalStore,
    remote: Option<Arc<dyn RemoteStore>>,
    state: SyncState,
    writer: Option<RemoteWriter>,
    snapshot_rx: Option<mpsc::UnboundedReceiver<RemoteSnapshot>>,
    subscription: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for LikedSongs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LikedSongs")
            .field("len", &self.items.len())
            .field("state", &self.state)
            .field("local", &self.local)
            .field("remote", &self.remote.as_ref().map(|_| "<RemoteStore>"))
            .field("writer", &self.writer)
            .finish()
    }
}

impl LikedSongs {
    /// Create an empty, unloaded collection
    pub fn new(local: LocalStore, remote: Option<Arc<dyn RemoteStore>>) -> Self {
        Self {
            items: Vec::new(),
            local,
            remote,
            state: SyncState::Uninitialized,
            writer: None,
            snapshot_rx: None,
            subscription: None,
        }
    }

    /// Create and load the local snapshot
    pub fn open(local: LocalStore, remote: Option<Arc<dyn RemoteStore>>) -> Self {
        let mut liked = Self::new(local, remote);
        liked.load_local();
        liked
    }

    /// Read the local snapshot into memory; only the first call has an effect
    pub fn load_local(&mut self) {
        if self.state != SyncState::Uninitialized {
            return;
        }
        self.items = self.local.load_all();
        self.state = SyncState::LocalLoaded;
        info!(
            "Loaded {} liked songs from {:?}",
            self.items.len(),
            self.local.path()
        );
    }

    /// Connect to the remote store and start syncing
    ///
    /// Must run inside a tokio runtime. On failure the session stays
    /// local-only; there is no later reconnect.
    pub async fn attach_remote(&mut self, retry: RetryPolicy) -> SyncState {
        match self.state {
            SyncState::RemoteAttached | SyncState::RemoteUnavailable => return self.state,
            SyncState::Uninitialized => self.load_local(),
            SyncState::LocalLoaded => (),
        }

        let Some(remote) = self.remote.clone() else {
            info!("No remote store configured, liked songs stay local");
            self.state = SyncState::RemoteUnavailable;
            return self.state;
        };

        let attempts = retry.attempts();
        for attempt in 0..attempts {
            match remote.initialize().await {
                Ok(()) => {
                    self.start_sync(remote);
                    self.state = SyncState::RemoteAttached;
                    info!("Liked songs remote sync attached");
                    return self.state;
                }
                Err(e) => {
                    warn!(
                        attempt = attempt + 1,
                        attempts, "Remote store initialization failed: {}", e
                    );
                    if attempt + 1 < attempts {
                        tokio::time::sleep(retry.delay(attempt)).await;
                    }
                }
            }
        }

        warn!("Remote store unavailable, continuing with local liked songs only");
        self.state = SyncState::RemoteUnavailable;
        self.state
    }

    fn start_sync(&mut self, remote: Arc<dyn RemoteStore>) {
        let writer = RemoteWriter::spawn(remote.clone());
        let completed = writer.completed_counter();
        let (snapshot_tx, snapshot_rx) = mpsc::unbounded_channel();
        let mut snapshots = remote.subscribe();
        self.subscription = Some(tokio::spawn(async move {
            while let Some(items) = snapshots.next().await {
                let snapshot = RemoteSnapshot {
                    writes_done: completed.load(Ordering::Acquire),
                    items,
                };
                if snapshot_tx.send(snapshot).is_err() {
                    break;
                }
            }
            debug!("Remote liked songs subscription ended");
        }));
        self.snapshot_rx = Some(snapshot_rx);
        self.writer = Some(writer);
    }

    // ============ Queries ============

    pub fn state(&self) -> SyncState {
        self.state
    }

    /// Current collection in display order
    pub fn items(&self) -> &[MediaItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_liked(&self, id: &str) -> bool {
        self.items.iter().any(|item| item.id == id)
    }

    // ============ Mutations ============

    /// Add an item; no-op if its id is already liked
    pub fn like(&mut self, item: MediaItem) {
        if self.is_liked(&item.id) {
            return;
        }
        debug!("Liking {}", item.id);
        self.items.push(item.clone());
        self.local.save_all(&self.items);
        self.submit(WriteOp::Put(item));
    }

    /// Remove an item by id; no-op if it isn't liked
    pub fn unlike(&mut self, id: &str) {
        let Some(pos) = self.items.iter().position(|item| item.id == id) else {
            return;
        };
        debug!("Unliking {}", id);
        self.items.remove(pos);
        self.local.save_all(&self.items);
        self.submit(WriteOp::Remove(id.to_string()));
    }

    /// Like if absent, unlike if present; returns the new liked state
    pub fn toggle_like(&mut self, item: MediaItem) -> bool {
        if self.is_liked(&item.id) {
            self.unlike(&item.id);
            false
        } else {
            self.like(item);
            true
        }
    }

    /// Empty the collection everywhere
    pub fn clear(&mut self) {
        info!("Clearing {} liked songs", self.items.len());
        self.items.clear();
        self.local.clear();
        self.submit(WriteOp::ClearAll);
    }

    fn submit(&mut self, op: WriteOp) {
        match self.writer.as_mut() {
            Some(writer) => {
                writer.submit(op);
            }
            None => debug!("Remote not attached, skipping remote write"),
        }
    }

    // ============ Remote snapshots ============

    /// Replace the collection unless the snapshot misses one of our writes
    fn apply_snapshot(&mut self, snapshot: RemoteSnapshot) -> bool {
        let issued = self.writer.as_ref().map_or(0, RemoteWriter::issued);
        if snapshot.writes_done < issued {
            debug!(
                writes_done = snapshot.writes_done,
                issued, "Dropping remote snapshot that predates local writes"
            );
            return false;
        }
        self.items = dedup_by_id(snapshot.items);
        self.local.save_all(&self.items);
        debug!("Applied remote snapshot with {} liked songs", self.items.len());
        true
    }

    /// Apply snapshots that have already arrived, without waiting
    ///
    /// Returns how many were received; only the newest one matters since
    /// each replaces the collection. Stale ones are received but not applied.
    pub fn sync_pending(&mut self) -> usize {
        let Some(rx) = self.snapshot_rx.as_mut() else {
            return 0;
        };

        let mut received = 0;
        let mut latest = None;
        while let Ok(snapshot) = rx.try_recv() {
            received += 1;
            latest = Some(snapshot);
        }
        if let Some(snapshot) = latest {
            self.apply_snapshot(snapshot);
        }
        received
    }

    /// Wait for the next remote snapshot and apply it if it is current
    ///
    /// Returns `true` when a snapshot was received, even if it was dropped
    /// as stale, and `false` right away when not subscribed or once the
    /// subscription has ended.
    pub async fn next_snapshot(&mut self) -> bool {
        let Some(rx) = self.snapshot_rx.as_mut() else {
            return false;
        };

        match rx.recv().await {
            Some(snapshot) => {
                self.apply_snapshot(snapshot);
                true
            }
            None => {
                info!("Remote liked songs subscription closed");
                self.snapshot_rx = None;
                false
            }
        }
    }

    // ============ Remote writes ============

    /// Remote writes queued but not yet attempted
    pub fn pending_remote_writes(&self) -> u64 {
        self.writer.as_ref().map_or(0, RemoteWriter::pending)
    }

    /// Wait until every queued remote write has been attempted
    pub async fn flush_remote(&self) {
        if let Some(writer) = &self.writer {
            writer.flush().await;
        }
    }

    /// Unsubscribe and deliver outstanding remote writes
    pub async fn shutdown(mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.abort();
        }
        self.snapshot_rx = None;
        if let Some(writer) = self.writer.take() {
            writer.shutdown().await;
        }
        debug!("Liked songs shut down");
    }
}

impl Drop for LikedSongs {
    fn drop(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.abort();
        }
    }
}
