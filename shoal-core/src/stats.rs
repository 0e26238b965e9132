//! Read-only transfer statistics probe.

use crate::content_id::{ContentId, ResolveError};
use crate::registry::SwarmSessionRegistry;
use crate::swarm::TransferStats;

/// Reports live metrics for a locator without ever creating a session.
///
/// Returns `Ok(None)` when no session exists. A Pending session reports
/// zeroed metrics.
///
/// # Errors
/// - `ResolveError` - Locator could not be resolved to a content id
pub fn probe(
    registry: &SwarmSessionRegistry,
    raw_locator: &str,
) -> Result<Option<TransferStats>, ResolveError> {
    let content_id = ContentId::from_locator(raw_locator)?;
    Ok(registry
        .get_existing(&content_id)
        .map(|session| session.stats()))
}
