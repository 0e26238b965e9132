//! Idle reaping of completed sessions.
//!
//! One reaper task runs per Ready session. It sleeps until the transfer
//! completes, then arms a grace timer. Any reader opening or closing re-arms
//! the timer, and the session is only destroyed once the timer fires with no
//! reader attached.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::registry::WeakRegistry;
use crate::session::SwarmSession;

/// Spawns the reaper for a session that just became Ready.
pub(crate) fn spawn(
    session: Arc<SwarmSession>,
    registry: WeakRegistry,
    grace: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        if !wait_until_idle(&session, grace).await {
            return;
        }

        info!(
            content_id = %session.content_id(),
            grace_secs = grace.as_secs(),
            "reaping idle session"
        );
        match registry.upgrade() {
            Some(registry) => {
                registry.destroy_session(&session).await;
            }
            None => {
                session.destroy().await;
            }
        }
    })
}

/// Returns true once the session is complete and has been unread for `grace`.
///
/// Returns false if the session is destroyed first.
async fn wait_until_idle(session: &SwarmSession, grace: Duration) -> bool {
    let Some(torrent) = session.torrent() else {
        return false;
    };
    let cancel = session.cancellation().clone();

    let completed = tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        _ = torrent.wait_complete() => true,
    };
    if !completed {
        return false;
    }
    drop(torrent);

    debug!(
        content_id = %session.content_id().short(),
        "transfer complete, idle timer armed"
    );

    let mut activity = session.activity();
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return false,
            changed = activity.changed() => {
                if changed.is_err() {
                    return false;
                }
            }
            _ = tokio::time::sleep(grace) => {
                if session.active_readers() == 0 {
                    return true;
                }
            }
        }
    }
}
