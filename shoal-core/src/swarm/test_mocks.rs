//! Mock swarm implementations for testing the session lifecycle.

use std::collections::HashMap;
use std::ops::RangeInclusive;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use super::{FileHandle, InterestId, SwarmClient, SwarmError, SwarmTorrent, TransferStats};
use crate::content_id::Locator;

/// How a mock join resolves once its gate opens.
#[derive(Debug, Clone)]
pub enum MockJoin {
    Succeed,
    Fail(String),
    Hang,
}

/// Mock swarm client serving fixed in-memory files.
pub struct MockSwarm {
    files: Vec<(String, Bytes)>,
    behavior: Mutex<MockJoin>,
    gate: watch::Sender<bool>,
    joins: AtomicUsize,
    torrents: Mutex<Vec<Arc<MockTorrent>>>,
}

impl MockSwarm {
    /// Creates a mock whose joins succeed immediately with the given files.
    pub fn new(files: Vec<(&str, Vec<u8>)>) -> Self {
        let (gate, _) = watch::channel(true);
        Self {
            files: files
                .into_iter()
                .map(|(name, data)| (name.to_string(), Bytes::from(data)))
                .collect(),
            behavior: Mutex::new(MockJoin::Succeed),
            gate,
            joins: AtomicUsize::new(0),
            torrents: Mutex::new(Vec::new()),
        }
    }

    /// Creates a mock with a single patterned video file of `length` bytes.
    pub fn with_video(length: usize) -> Self {
        Self::new(vec![("movie.mp4", patterned_bytes(length))])
    }

    /// Holds every join until [`MockSwarm::release`] is called.
    pub fn gated(self) -> Self {
        self.gate.send_replace(false);
        self
    }

    /// Opens the join gate.
    pub fn release(&self) {
        self.gate.send_replace(true);
    }

    /// Changes how subsequent joins resolve.
    pub fn set_behavior(&self, behavior: MockJoin) {
        *self.behavior.lock() = behavior;
    }

    /// Number of joins started so far.
    pub fn join_count(&self) -> usize {
        self.joins.load(Ordering::SeqCst)
    }

    /// Most recently created torrent handle.
    pub fn last_torrent(&self) -> Option<Arc<MockTorrent>> {
        self.torrents.lock().last().cloned()
    }
}

#[async_trait]
impl SwarmClient for MockSwarm {
    async fn join(&self, _locator: &Locator) -> Result<Arc<dyn SwarmTorrent>, SwarmError> {
        self.joins.fetch_add(1, Ordering::SeqCst);

        let mut gate = self.gate.subscribe();
        if gate.wait_for(|open| *open).await.is_err() {
            return Err(SwarmError::Shutdown);
        }

        let behavior = self.behavior.lock().clone();
        match behavior {
            MockJoin::Succeed => {
                let torrent = Arc::new(MockTorrent::new(self.files.clone()));
                self.torrents.lock().push(torrent.clone());
                Ok(torrent)
            }
            MockJoin::Fail(reason) => Err(SwarmError::JoinFailed { reason }),
            MockJoin::Hang => {
                std::future::pending::<()>().await;
                Err(SwarmError::Shutdown)
            }
        }
    }
}

/// Mock torrent with every piece available unless stalled.
pub struct MockTorrent {
    files: Vec<(String, Bytes)>,
    complete: watch::Sender<bool>,
    stalled: watch::Sender<bool>,
    interests: Mutex<HashMap<InterestId, (usize, RangeInclusive<u64>)>>,
    next_interest: AtomicU64,
    cancel: CancellationToken,
}

impl MockTorrent {
    fn new(files: Vec<(String, Bytes)>) -> Self {
        let (complete, _) = watch::channel(false);
        let (stalled, _) = watch::channel(false);
        Self {
            files,
            complete,
            stalled,
            interests: Mutex::new(HashMap::new()),
            next_interest: AtomicU64::new(1),
            cancel: CancellationToken::new(),
        }
    }

    /// Marks the transfer complete.
    pub fn complete(&self) {
        self.complete.send_replace(true);
    }

    /// Suspends or resumes every read.
    pub fn set_stalled(&self, stalled: bool) {
        self.stalled.send_replace(stalled);
    }

    /// Number of outstanding interests.
    pub fn interest_count(&self) -> usize {
        self.interests.lock().len()
    }

    /// Whether shutdown has been called.
    pub fn is_shut_down(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

#[async_trait]
impl SwarmTorrent for MockTorrent {
    fn files(&self) -> Vec<FileHandle> {
        self.files
            .iter()
            .enumerate()
            .map(|(index, (name, data))| FileHandle::new(index, name.clone(), data.len() as u64))
            .collect()
    }

    fn stats(&self) -> TransferStats {
        let complete = self.is_complete();
        TransferStats {
            download_rate_bytes_per_sec: if complete { 0 } else { 1024 },
            upload_rate_bytes_per_sec: 256,
            peer_count: 5,
            progress_fraction: if complete { 1.0 } else { 0.5 },
        }
    }

    fn is_complete(&self) -> bool {
        *self.complete.borrow()
    }

    async fn wait_complete(&self) {
        let mut rx = self.complete.subscribe();
        let completed = tokio::select! {
            done = rx.wait_for(|done| *done) => done.is_ok(),
            _ = self.cancel.cancelled() => false,
        };
        if !completed {
            std::future::pending::<()>().await;
        }
    }

    fn add_interest(
        &self,
        file_index: usize,
        range: RangeInclusive<u64>,
    ) -> Result<InterestId, SwarmError> {
        if self.cancel.is_cancelled() {
            return Err(SwarmError::Shutdown);
        }
        if file_index >= self.files.len() {
            return Err(SwarmError::FileNotFound { index: file_index });
        }
        let id = InterestId(self.next_interest.fetch_add(1, Ordering::SeqCst));
        self.interests.lock().insert(id, (file_index, range));
        Ok(id)
    }

    fn remove_interest(&self, interest: InterestId) {
        self.interests.lock().remove(&interest);
    }

    async fn read_at(
        &self,
        file_index: usize,
        offset: u64,
        max_len: usize,
    ) -> Result<Bytes, SwarmError> {
        let data = self
            .files
            .get(file_index)
            .map(|(_, data)| data.clone())
            .ok_or(SwarmError::FileNotFound { index: file_index })?;
        let length = data.len() as u64;
        if offset >= length {
            return Err(SwarmError::OutOfBounds { offset, length });
        }

        let mut stalled = self.stalled.subscribe();
        let flowing = tokio::select! {
            flowing = stalled.wait_for(|stalled| !*stalled) => flowing.is_ok(),
            _ = self.cancel.cancelled() => false,
        };
        if !flowing {
            return Err(SwarmError::Shutdown);
        }

        let start = offset as usize;
        let end = (start + max_len).min(data.len());
        Ok(data.slice(start..end))
    }

    async fn shutdown(&self) {
        self.cancel.cancel();
        self.interests.lock().clear();
    }
}

/// Deterministic byte pattern where each byte encodes its offset.
pub fn patterned_bytes(length: usize) -> Vec<u8> {
    (0..length).map(|i| (i % 251) as u8).collect()
}
