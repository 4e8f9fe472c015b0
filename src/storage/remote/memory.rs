//! In-process remote store
//!
//! Keeps the collection in a `BTreeMap` behind a watch channel, so every
//! subscriber sees the latest state and skipped intermediate states behave
//! like a real backend. Clones share the same collection, which lets two
//! managers act as two devices on one account.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::debug;

use super::{RemoteError, RemoteStore, SnapshotStream, validate_key};
use crate::model::MediaItem;

#[derive(Debug)]
struct Inner {
    entries: watch::Sender<BTreeMap<String, MediaItem>>,
    available: AtomicBool,
    fail_writes: AtomicBool,
}

/// Remote store living in memory
#[derive(Debug, Clone)]
pub struct MemoryRemote {
    inner: Arc<Inner>,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::with_items(Vec::new())
    }

    /// Start with a pre-populated collection
    pub fn with_items(items: impl IntoIterator<Item = MediaItem>) -> Self {
        let entries = items
            .into_iter()
            .map(|item| (item.id.clone(), item))
            .collect();
        let (tx, _rx) = watch::channel(entries);
        Self {
            inner: Arc::new(Inner {
                entries: tx,
                available: AtomicBool::new(true),
                fail_writes: AtomicBool::new(false),
            }),
        }
    }

    /// Simulate the backend going away (or coming back)
    pub fn set_available(&self, available: bool) {
        self.inner.available.store(available, Ordering::SeqCst);
    }

    /// Make writes fail while reads keep working
    pub fn set_fail_writes(&self, fail: bool) {
        self.inner.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Current collection, ordered by key
    pub fn snapshot(&self) -> Vec<MediaItem> {
        self.inner.entries.borrow().values().cloned().collect()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.inner.entries.borrow().contains_key(id)
    }

    fn check_available(&self) -> Result<(), RemoteError> {
        if self.inner.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(RemoteError::Unavailable("memory remote is offline".to_string()))
        }
    }

    fn check_writable(&self) -> Result<(), RemoteError> {
        self.check_available()?;
        if self.inner.fail_writes.load(Ordering::SeqCst) {
            return Err(RemoteError::Status(503));
        }
        Ok(())
    }
}

impl Default for MemoryRemote {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteStore for MemoryRemote {
    async fn initialize(&self) -> Result<(), RemoteError> {
        self.check_available()
    }

    fn subscribe(&self) -> SnapshotStream {
        let mut rx = self.inner.entries.subscribe();
        Box::pin(async_stream::stream! {
            loop {
                let snapshot: Vec<MediaItem> = rx.borrow_and_update().values().cloned().collect();
                yield snapshot;
                if rx.changed().await.is_err() {
                    break;
                }
            }
        })
    }

    async fn put(&self, item: &MediaItem) -> Result<(), RemoteError> {
        validate_key(&item.id)?;
        self.check_writable()?;
        debug!("memory remote: put {}", item.id);
        let item = item.clone();
        self.inner.entries.send_modify(|entries| {
            entries.insert(item.id.clone(), item);
        });
        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<(), RemoteError> {
        validate_key(id)?;
        self.check_writable()?;
        debug!("memory remote: remove {}", id);
        self.inner.entries.send_if_modified(|entries| entries.remove(id).is_some());
        Ok(())
    }

    async fn clear_all(&self) -> Result<(), RemoteError> {
        self.check_writable()?;
        debug!("memory remote: clear");
        self.inner.entries.send_modify(|entries| entries.clear());
        Ok(())
    }
}
