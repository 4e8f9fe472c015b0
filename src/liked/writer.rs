//! Ordered remote write queue
//!
//! The manager hands remote writes to a background task and returns
//! immediately. The task applies them one at a time in submission order, so
//! a like followed by an unlike of the same id reaches the backend in that
//! order. Each write carries a sequence number; the task publishes the last
//! one it finished so callers can tell how far behind the remote is.
//!
//! ```text
//! LikedSongs --[WriterCommand]--> writer task --> RemoteStore
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::model::MediaItem;
use crate::storage::RemoteStore;

/// One remote mutation
#[derive(Debug, Clone)]
pub enum WriteOp {
    Put(MediaItem),
    Remove(String),
    ClearAll,
}

impl WriteOp {
    fn target(&self) -> &str {
        match self {
            WriteOp::Put(item) => &item.id,
            WriteOp::Remove(id) => id,
            WriteOp::ClearAll => "*",
        }
    }

    fn name(&self) -> &'static str {
        match self {
            WriteOp::Put(_) => "put",
            WriteOp::Remove(_) => "remove",
            WriteOp::ClearAll => "clear",
        }
    }
}

enum WriterCommand {
    Write { seq: u64, op: WriteOp },
    Flush(oneshot::Sender<()>),
}

/// Handle to the background write task
pub struct RemoteWriter {
    command_tx: mpsc::UnboundedSender<WriterCommand>,
    issued: u64,
    completed: Arc<AtomicU64>,
    task: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for RemoteWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteWriter")
            .field("issued", &self.issued)
            .field("completed", &self.completed.load(Ordering::Acquire))
            .finish()
    }
}

impl RemoteWriter {
    /// Start the write task on the current tokio runtime
    pub fn spawn(remote: Arc<dyn RemoteStore>) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let completed = Arc::new(AtomicU64::new(0));
        let task = tokio::spawn(writer_main(remote, command_rx, completed.clone()));
        Self {
            command_tx,
            issued: 0,
            completed,
            task: Some(task),
        }
    }

    /// Queue a write and return its sequence number
    pub fn submit(&mut self, op: WriteOp) -> u64 {
        self.issued += 1;
        let seq = self.issued;
        if self
            .command_tx
            .send(WriterCommand::Write { seq, op })
            .is_err()
        {
            warn!(seq, "Remote writer has stopped, dropping write");
            self.completed.fetch_max(seq, Ordering::AcqRel);
        }
        seq
    }

    /// Sequence number of the last queued write
    pub fn issued(&self) -> u64 {
        self.issued
    }

    /// Sequence number of the last finished write
    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Acquire)
    }

    /// Shared view of [`completed`](Self::completed) for other tasks
    pub(crate) fn completed_counter(&self) -> Arc<AtomicU64> {
        self.completed.clone()
    }

    /// Writes queued but not yet finished
    pub fn pending(&self) -> u64 {
        self.issued
            .saturating_sub(self.completed.load(Ordering::Acquire))
    }

    /// Wait until every write queued so far has been attempted
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.command_tx.send(WriterCommand::Flush(done_tx)).is_ok() {
            let _ = done_rx.await;
        }
    }

    /// Drain the queue and stop the task
    pub async fn shutdown(mut self) {
        let task = self.task.take();
        drop(self);
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!("Remote writer task ended abnormally: {}", e);
            }
        }
    }
}

async fn writer_main(
    remote: Arc<dyn RemoteStore>,
    mut command_rx: mpsc::UnboundedReceiver<WriterCommand>,
    completed: Arc<AtomicU64>,
) {
    while let Some(command) = command_rx.recv().await {
        match command {
            WriterCommand::Write { seq, op } => {
                let result = match &op {
                    WriteOp::Put(item) => remote.put(item).await,
                    WriteOp::Remove(id) => remote.remove(id).await,
                    WriteOp::ClearAll => remote.clear_all().await,
                };
                match result {
                    Ok(()) => debug!(seq, id = op.target(), "remote {} done", op.name()),
                    Err(e) => warn!(
                        seq,
                        id = op.target(),
                        "Remote {} failed: {}",
                        op.name(),
                        e
                    ),
                }
                completed.store(seq, Ordering::Release);
            }
            WriterCommand::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
    debug!("Remote writer stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryRemote;

    #[tokio::test]
    async fn test_writes_apply_in_order() {
        let remote = MemoryRemote::new();
        let mut writer = RemoteWriter::spawn(Arc::new(remote.clone()));

        let item = MediaItem::new("a", "A");
        assert_eq!(writer.submit(WriteOp::Put(item.clone())), 1);
        assert_eq!(writer.submit(WriteOp::Remove("a".to_string())), 2);
        assert_eq!(writer.submit(WriteOp::Put(item)), 3);
        writer.flush().await;

        assert!(remote.contains("a"));
        assert_eq!(writer.pending(), 0);
        assert_eq!(writer.issued(), 3);
        assert_eq!(writer.completed(), 3);
        assert_eq!(writer.completed_counter().load(Ordering::Acquire), 3);
    }

    #[tokio::test]
    async fn test_failed_writes_still_complete() {
        let remote = MemoryRemote::new();
        remote.set_fail_writes(true);
        let mut writer = RemoteWriter::spawn(Arc::new(remote.clone()));

        writer.submit(WriteOp::Put(MediaItem::new("a", "A")));
        writer.submit(WriteOp::ClearAll);
        writer.flush().await;

        assert_eq!(writer.pending(), 0);
        assert!(remote.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_drains_queue() {
        let remote = MemoryRemote::new();
        let mut writer = RemoteWriter::spawn(Arc::new(remote.clone()));
        for i in 0..20 {
            writer.submit(WriteOp::Put(MediaItem::new(format!("id{}", i), "x")));
        }
        writer.shutdown().await;
        assert_eq!(remote.snapshot().len(), 20);
    }
}
