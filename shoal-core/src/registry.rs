//! Process-wide session registry keyed by content id.
//!
//! The map lock only guards bookkeeping. Joins run on their own task and
//! every caller waits on the session's state channel, so a slow swarm never
//! blocks lookups for unrelated content or stats probes.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Arc, Weak};
use std::time::Instant;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::GatewayConfig;
use crate::content_id::{ContentId, Locator};
use crate::reaper;
use crate::session::{SessionError, SessionState, SwarmSession};
use crate::swarm::{SwarmClient, SwarmError, TransferStats};

/// Snapshot of one session for listings.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub content_id: ContentId,
    pub state: SessionState,
    pub created_at: DateTime<Utc>,
    pub idle_secs: u64,
    pub active_readers: usize,
    pub file_count: usize,
    pub stats: TransferStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl SessionSummary {
    fn of(session: &SwarmSession) -> Self {
        Self {
            content_id: session.content_id(),
            state: session.state(),
            created_at: session.created_at(),
            idle_secs: session.idle_for().as_secs(),
            active_readers: session.active_readers(),
            file_count: session.files().len(),
            stats: session.stats(),
            last_error: session.last_error().map(|e| e.to_string()),
        }
    }
}

struct RegistryInner {
    client: Arc<dyn SwarmClient>,
    sessions: RwLock<HashMap<ContentId, Arc<SwarmSession>>>,
    config: GatewayConfig,
}

/// Deduplicating map from content id to live session.
///
/// Cheap to clone; all clones share one map.
#[derive(Clone)]
pub struct SwarmSessionRegistry {
    inner: Arc<RegistryInner>,
}

/// Non-owning registry handle held by background reapers.
#[derive(Clone)]
pub(crate) struct WeakRegistry(Weak<RegistryInner>);

impl WeakRegistry {
    pub(crate) fn upgrade(&self) -> Option<SwarmSessionRegistry> {
        self.0.upgrade().map(|inner| SwarmSessionRegistry { inner })
    }
}

impl SwarmSessionRegistry {
    pub fn new(client: Arc<dyn SwarmClient>, config: GatewayConfig) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                client,
                sessions: RwLock::new(HashMap::new()),
                config,
            }),
        }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.inner.config
    }

    /// Returns the Ready session for a locator, joining the swarm if needed.
    ///
    /// Concurrent callers for the same content id share one join and all
    /// observe its outcome. A failed join leaves no entry behind, so the
    /// next call starts a fresh attempt.
    ///
    /// # Errors
    /// - `SessionError::JoinFailed` - Swarm client reported an error
    /// - `SessionError::JoinTimedOut` - Metadata did not arrive within `join_timeout`
    /// - `SessionError::Destroyed` - Session destroyed before becoming Ready
    pub async fn get_or_create(&self, locator: &Locator) -> Result<Arc<SwarmSession>, SessionError> {
        let session = self.lookup_or_insert(locator);
        self.settle(locator, session).await
    }

    /// Waits for a looked-up session to settle.
    ///
    /// A session that was already Ready when found and has since been
    /// destroyed, typically by the reaper, is replaced by one fresh join.
    async fn settle(
        &self,
        locator: &Locator,
        session: Arc<SwarmSession>,
    ) -> Result<Arc<SwarmSession>, SessionError> {
        let was_ready = session.state() == SessionState::Ready;
        match session.wait_ready().await {
            Ok(()) => Ok(session),
            Err(SessionError::Destroyed { .. }) if was_ready => {
                debug!(content_id = %locator.content_id.short(), "ready session destroyed after lookup, rejoining");
                let session = self.lookup_or_insert(locator);
                session.wait_ready().await?;
                Ok(session)
            }
            Err(e) => Err(e),
        }
    }

    /// Resolves a raw locator string, then behaves as [`get_or_create`](Self::get_or_create).
    ///
    /// # Errors
    /// - `ShoalError::InvalidIdentifier` - Locator rejected before any swarm interaction
    /// - `ShoalError::Session` - Join failed, timed out or the session was destroyed
    pub async fn get_or_create_from(&self, raw: &str) -> crate::Result<Arc<SwarmSession>> {
        let locator = Locator::parse(raw)?;
        Ok(self.get_or_create(&locator).await?)
    }

    /// Looks up a session without ever creating one.
    pub fn get_existing(&self, content_id: &ContentId) -> Option<Arc<SwarmSession>> {
        self.inner.sessions.read().get(content_id).cloned()
    }

    /// Drops the registry entry. Idempotent; the session itself is untouched.
    pub fn remove(&self, content_id: &ContentId) -> Option<Arc<SwarmSession>> {
        let removed = self.inner.sessions.write().remove(content_id);
        if removed.is_some() {
            debug!(content_id = %content_id.short(), "session removed from registry");
        }
        removed
    }

    /// Removes and destroys the session for a content id.
    ///
    /// Returns false when no session was registered.
    pub async fn destroy(&self, content_id: &ContentId) -> bool {
        match self.remove(content_id) {
            Some(session) => {
                session.destroy().await;
                true
            }
            None => false,
        }
    }

    /// Destroys a specific session, removing its entry only if it still owns it.
    pub async fn destroy_session(&self, session: &Arc<SwarmSession>) -> bool {
        self.remove_if_current(session);
        session.destroy().await
    }

    /// Snapshots every registered session.
    pub fn sessions(&self) -> Vec<SessionSummary> {
        let sessions: Vec<_> = self.inner.sessions.read().values().cloned().collect();
        let mut summaries: Vec<_> = sessions
            .iter()
            .map(|session| SessionSummary::of(session))
            .collect();
        summaries.sort_by_key(|summary| summary.created_at);
        summaries
    }

    pub fn len(&self) -> usize {
        self.inner.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.sessions.read().is_empty()
    }

    /// Destroys every session. Used on process shutdown.
    pub async fn shutdown(&self) {
        let drained: Vec<_> = self
            .inner
            .sessions
            .write()
            .drain()
            .map(|(_, session)| session)
            .collect();

        info!(sessions = drained.len(), "shutting down session registry");
        for session in drained {
            session.destroy().await;
        }
    }

    pub(crate) fn downgrade(&self) -> WeakRegistry {
        WeakRegistry(Arc::downgrade(&self.inner))
    }

    fn lookup_or_insert(&self, locator: &Locator) -> Arc<SwarmSession> {
        let content_id = locator.content_id;
        if let Some(session) = self.inner.sessions.read().get(&content_id) {
            return session.clone();
        }

        let session = {
            let mut sessions = self.inner.sessions.write();
            match sessions.entry(content_id) {
                Entry::Occupied(entry) => return entry.get().clone(),
                Entry::Vacant(entry) => {
                    let session = Arc::new(SwarmSession::pending(
                        content_id,
                        self.inner.config.chunk_size,
                    ));
                    entry.insert(session.clone());
                    session
                }
            }
        };

        let registry = self.clone();
        let joining = session.clone();
        let locator = locator.clone();
        tokio::spawn(async move { registry.run_join(joining, locator).await });

        session
    }

    async fn run_join(&self, session: Arc<SwarmSession>, locator: Locator) {
        let content_id = session.content_id();
        let timeout = self.inner.config.join_timeout;
        let started = Instant::now();

        info!(
            content_id = %content_id,
            name = locator.display_name.as_deref().unwrap_or(""),
            trackers = locator.trackers.len(),
            "joining swarm"
        );

        let outcome = tokio::select! {
            biased;
            _ = session.cancellation().cancelled() => {
                debug!(content_id = %content_id.short(), "join abandoned");
                return;
            }
            outcome = tokio::time::timeout(timeout, self.inner.client.join(&locator)) => outcome,
        };

        match outcome {
            Ok(Ok(torrent)) => {
                if session.mark_ready(torrent.clone()) {
                    info!(
                        content_id = %content_id,
                        files = session.files().len(),
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "session ready"
                    );
                    reaper::spawn(
                        session,
                        self.downgrade(),
                        self.inner.config.idle_grace_period,
                    );
                } else {
                    torrent.shutdown().await;
                }
            }
            Ok(Err(error)) => {
                let reason = match error {
                    SwarmError::JoinFailed { reason } => reason,
                    other => other.to_string(),
                };
                self.fail(&session, SessionError::JoinFailed { content_id, reason });
            }
            Err(_) => self.fail(&session, SessionError::JoinTimedOut { content_id, timeout }),
        }
    }

    fn fail(&self, session: &Arc<SwarmSession>, error: SessionError) {
        warn!(content_id = %session.content_id(), error = %error, "swarm join failed");
        self.remove_if_current(session);
        session.mark_failed(error);
    }

    fn remove_if_current(&self, session: &Arc<SwarmSession>) {
        let mut sessions = self.inner.sessions.write();
        if sessions
            .get(&session.content_id())
            .is_some_and(|current| Arc::ptr_eq(current, session))
        {
            sessions.remove(&session.content_id());
        }
    }
}

impl std::fmt::Debug for SwarmSessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SwarmSessionRegistry")
            .field("sessions", &self.len())
            .field("config", &self.inner.config)
            .finish()
    }
}
