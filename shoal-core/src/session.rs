//! Swarm session lifecycle.
//!
//! A [`SwarmSession`] wraps the swarm handle for one content id. Its state
//! lives in a watch channel so any number of callers can await the single
//! Pending -> Ready/Error transition without racing a boolean flag:
//!
//! ```text
//! Pending --(metadata)--> Ready --(idle reap | destroy)--> Destroyed
//! Pending --(join error / timeout)--> Error
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::content_id::ContentId;
use crate::range::ByteRange;
use crate::reader::ReadSequence;
use crate::swarm::{FileHandle, SwarmError, SwarmTorrent, TransferStats};

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Pending,
    Ready,
    Error,
    Destroyed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Pending => write!(f, "pending"),
            SessionState::Ready => write!(f, "ready"),
            SessionState::Error => write!(f, "error"),
            SessionState::Destroyed => write!(f, "destroyed"),
        }
    }
}

/// Errors surfaced by session operations.
///
/// Cloneable so every waiter on a failed join receives the same error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("swarm join failed for {content_id}: {reason}")]
    JoinFailed {
        content_id: ContentId,
        reason: String,
    },

    #[error("swarm join for {content_id} timed out after {timeout:?}")]
    JoinTimedOut {
        content_id: ContentId,
        timeout: Duration,
    },

    #[error("session {content_id} has been destroyed")]
    Destroyed { content_id: ContentId },

    #[error("session {content_id} is not ready")]
    NotReady { content_id: ContentId },

    #[error(transparent)]
    Swarm(#[from] SwarmError),
}

/// One shared swarm download and its attached readers.
pub struct SwarmSession {
    content_id: ContentId,
    state: watch::Sender<SessionState>,
    torrent: OnceLock<Arc<dyn SwarmTorrent>>,
    files: OnceLock<Vec<FileHandle>>,
    created_at: DateTime<Utc>,
    last_activity: Mutex<Instant>,
    last_error: Mutex<Option<SessionError>>,
    /// Bumped whenever a reader attaches or detaches
    activity: watch::Sender<u64>,
    active_readers: AtomicUsize,
    next_reader: AtomicU64,
    cancel: CancellationToken,
    chunk_size: usize,
}

impl SwarmSession {
    pub(crate) fn pending(content_id: ContentId, chunk_size: usize) -> Self {
        let (state, _) = watch::channel(SessionState::Pending);
        let (activity, _) = watch::channel(0);
        Self {
            content_id,
            state,
            torrent: OnceLock::new(),
            files: OnceLock::new(),
            created_at: Utc::now(),
            last_activity: Mutex::new(Instant::now()),
            last_error: Mutex::new(None),
            activity,
            active_readers: AtomicUsize::new(0),
            next_reader: AtomicU64::new(1),
            cancel: CancellationToken::new(),
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn content_id(&self) -> ContentId {
        self.content_id
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_activity(&self) -> Instant {
        *self.last_activity.lock()
    }

    /// Time since a reader last opened or made progress.
    pub fn idle_for(&self) -> Duration {
        self.last_activity().elapsed()
    }

    /// Error recorded by the Error transition.
    pub fn last_error(&self) -> Option<SessionError> {
        self.last_error.lock().clone()
    }

    /// Number of read sequences currently attached.
    pub fn active_readers(&self) -> usize {
        self.active_readers.load(Ordering::SeqCst)
    }

    /// File listing; empty until the session is Ready.
    pub fn files(&self) -> &[FileHandle] {
        self.files.get().map(Vec::as_slice).unwrap_or(&[])
    }

    /// Transfer metrics snapshot; zeroed while Pending.
    pub fn stats(&self) -> TransferStats {
        self.torrent
            .get()
            .map(|torrent| torrent.stats())
            .unwrap_or_default()
    }

    pub fn is_complete(&self) -> bool {
        self.torrent
            .get()
            .is_some_and(|torrent| torrent.is_complete())
    }

    /// Waits for the join outcome.
    ///
    /// Returns immediately if the session already settled.
    ///
    /// # Errors
    /// - `SessionError::JoinFailed` / `JoinTimedOut` - The join did not produce metadata
    /// - `SessionError::Destroyed` - Session destroyed before or after becoming Ready
    pub async fn wait_ready(&self) -> Result<(), SessionError> {
        let mut rx = self.state.subscribe();
        let settled = rx
            .wait_for(|state| *state != SessionState::Pending)
            .await
            .map(|state| *state);

        match settled {
            Ok(SessionState::Ready) => Ok(()),
            Ok(SessionState::Error) => Err(self.last_error().unwrap_or(SessionError::NotReady {
                content_id: self.content_id,
            })),
            Ok(SessionState::Pending) => Err(SessionError::NotReady {
                content_id: self.content_id,
            }),
            Ok(SessionState::Destroyed) | Err(_) => Err(SessionError::Destroyed {
                content_id: self.content_id,
            }),
        }
    }

    /// Opens an independent, non-restartable read sequence over `window`.
    ///
    /// # Errors
    /// - `SessionError::NotReady` - Metadata not yet available
    /// - `SessionError::Destroyed` - Session already torn down
    /// - `SessionError::Swarm` - File index or window outside the file
    pub fn open_reader(
        self: &Arc<Self>,
        file_index: usize,
        window: ByteRange,
    ) -> Result<ReadSequence, SessionError> {
        match self.state() {
            SessionState::Ready => {}
            SessionState::Destroyed => {
                return Err(SessionError::Destroyed {
                    content_id: self.content_id,
                });
            }
            SessionState::Pending | SessionState::Error => {
                return Err(SessionError::NotReady {
                    content_id: self.content_id,
                });
            }
        }

        let torrent = self.torrent.get().cloned().ok_or(SessionError::NotReady {
            content_id: self.content_id,
        })?;
        let file = self
            .files()
            .get(file_index)
            .ok_or(SwarmError::FileNotFound { index: file_index })?;
        if window.end >= file.length {
            return Err(SwarmError::OutOfBounds {
                offset: window.end,
                length: file.length,
            }
            .into());
        }

        let interest = torrent.add_interest(file_index, window.start..=window.end)?;
        let reader_id = self.next_reader.fetch_add(1, Ordering::SeqCst);
        self.active_readers.fetch_add(1, Ordering::SeqCst);
        self.touch();
        self.bump_activity();

        debug!(
            content_id = %self.content_id.short(),
            reader = reader_id,
            start = window.start,
            end = window.end,
            "read sequence opened"
        );

        Ok(ReadSequence::new(
            self.clone(),
            torrent,
            reader_id,
            file_index,
            window,
            interest,
            self.cancel.child_token(),
            self.chunk_size,
        ))
    }

    pub(crate) fn touch(&self) {
        *self.last_activity.lock() = Instant::now();
    }

    fn bump_activity(&self) {
        self.activity.send_modify(|epoch| *epoch = epoch.wrapping_add(1));
    }

    pub(crate) fn reader_closed(&self, reader_id: u64) {
        self.active_readers.fetch_sub(1, Ordering::SeqCst);
        self.touch();
        self.bump_activity();
        debug!(
            content_id = %self.content_id.short(),
            reader = reader_id,
            "read sequence closed"
        );
    }

    pub(crate) fn activity(&self) -> watch::Receiver<u64> {
        self.activity.subscribe()
    }

    pub(crate) fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub(crate) fn torrent(&self) -> Option<Arc<dyn SwarmTorrent>> {
        self.torrent.get().cloned()
    }

    /// Pending -> Ready. Returns false if the session left Pending first.
    pub(crate) fn mark_ready(&self, torrent: Arc<dyn SwarmTorrent>) -> bool {
        let _ = self.files.set(torrent.files());
        let _ = self.torrent.set(torrent);
        self.state.send_if_modified(|state| {
            if *state == SessionState::Pending {
                *state = SessionState::Ready;
                true
            } else {
                false
            }
        })
    }

    /// Pending -> Error, recording the error for every waiter.
    pub(crate) fn mark_failed(&self, error: SessionError) {
        *self.last_error.lock() = Some(error);
        self.state.send_if_modified(|state| {
            if *state == SessionState::Pending {
                *state = SessionState::Error;
                true
            } else {
                false
            }
        });
    }

    /// Pending/Ready -> Destroyed: cancels every reader and releases the torrent.
    ///
    /// Returns false if the session was already terminal.
    pub(crate) async fn destroy(&self) -> bool {
        let changed = self.state.send_if_modified(|state| {
            if matches!(*state, SessionState::Pending | SessionState::Ready) {
                *state = SessionState::Destroyed;
                true
            } else {
                false
            }
        });
        if !changed {
            return false;
        }

        self.cancel.cancel();
        if let Some(torrent) = self.torrent.get() {
            torrent.shutdown().await;
        }

        info!(
            content_id = %self.content_id,
            readers = self.active_readers(),
            "session destroyed"
        );
        true
    }
}

impl fmt::Debug for SwarmSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SwarmSession")
            .field("content_id", &self.content_id)
            .field("state", &self.state())
            .field("files", &self.files().len())
            .field("active_readers", &self.active_readers())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;

    use super::*;
    use crate::swarm::test_mocks::{MockSwarm, patterned_bytes};
    use crate::swarm::SwarmClient;
    use crate::content_id::Locator;

    const HASH: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";

    async fn ready_session(data_len: usize) -> (Arc<SwarmSession>, Arc<MockSwarm>) {
        let swarm = Arc::new(MockSwarm::with_video(data_len));
        let locator = Locator::parse(HASH).unwrap();
        let session = Arc::new(SwarmSession::pending(locator.content_id, 64));
        let torrent = swarm.join(&locator).await.unwrap();
        assert!(session.mark_ready(torrent));
        (session, swarm)
    }

    #[tokio::test]
    async fn test_waiters_observe_ready() {
        let (session, _swarm) = ready_session(256).await;
        assert_eq!(session.state(), SessionState::Ready);
        session.wait_ready().await.unwrap();
        assert_eq!(session.files().len(), 1);
        assert_eq!(session.stats().peer_count, 5);
    }

    #[tokio::test]
    async fn test_waiters_share_the_failure() {
        let session = Arc::new(SwarmSession::pending(ContentId::new([1u8; 20]), 64));
        let waiter = {
            let session = session.clone();
            tokio::spawn(async move { session.wait_ready().await })
        };

        let error = SessionError::JoinFailed {
            content_id: session.content_id(),
            reason: "no peers".to_string(),
        };
        session.mark_failed(error.clone());

        assert_eq!(waiter.await.unwrap(), Err(error.clone()));
        assert_eq!(session.wait_ready().await, Err(error));
        assert_eq!(session.state(), SessionState::Error);
    }

    #[tokio::test]
    async fn test_reader_yields_window_in_order() {
        let (session, _swarm) = ready_session(1000).await;
        let reader = session.open_reader(0, ByteRange::new(100, 299)).unwrap();
        assert_eq!(session.active_readers(), 1);

        let chunks: Vec<_> = reader.collect().await;
        let bytes: Vec<u8> = chunks
            .into_iter()
            .flat_map(|chunk| chunk.unwrap().to_vec())
            .collect();

        assert_eq!(bytes, patterned_bytes(1000)[100..300].to_vec());
        assert_eq!(session.active_readers(), 0);
    }

    #[tokio::test]
    async fn test_window_past_end_is_rejected() {
        let (session, _swarm) = ready_session(100).await;
        let result = session.open_reader(0, ByteRange::new(0, 100));
        assert!(matches!(
            result,
            Err(SessionError::Swarm(SwarmError::OutOfBounds { .. }))
        ));
        assert!(session.open_reader(3, ByteRange::new(0, 1)).is_err());
    }

    #[tokio::test]
    async fn test_destroy_releases_torrent_and_readers() {
        let (session, swarm) = ready_session(1000).await;
        let torrent = swarm.last_torrent().unwrap();
        torrent.set_stalled(true);

        let mut reader = session.open_reader(0, ByteRange::new(0, 999)).unwrap();
        assert_eq!(torrent.interest_count(), 1);

        assert!(session.destroy().await);
        assert!(!session.destroy().await);

        let next = reader.next().await;
        assert!(matches!(next, Some(Err(crate::reader::ReadError::SessionDestroyed))));
        assert!(reader.next().await.is_none());
        drop(reader);

        assert!(torrent.is_shut_down());
        assert_eq!(torrent.interest_count(), 0);
        assert_eq!(session.state(), SessionState::Destroyed);
        assert!(matches!(
            session.open_reader(0, ByteRange::new(0, 1)),
            Err(SessionError::Destroyed { .. })
        ));
    }

    #[tokio::test]
    async fn test_pending_session_rejects_readers() {
        let session = Arc::new(SwarmSession::pending(ContentId::new([2u8; 20]), 64));
        assert_eq!(session.stats(), TransferStats::default());
        assert!(matches!(
            session.open_reader(0, ByteRange::new(0, 1)),
            Err(SessionError::NotReady { .. })
        ));
    }
}
