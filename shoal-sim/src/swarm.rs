//! Simulated swarm client.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use shoal_core::config::SimulationConfig;
use shoal_core::{ContentId, Locator, SwarmClient, SwarmError, SwarmTorrent};
use tracing::{debug, warn};

use crate::content::SimulatedContent;
use crate::torrent::SimulatedTorrent;

/// How joins resolve after the configured join delay.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum JoinBehavior {
    /// Serve catalog content, failing for unknown content ids
    #[default]
    Deliver,
    /// Fail every join with the given reason
    Fail(String),
    /// Never produce metadata
    Hang,
}

/// In-process swarm that "downloads" catalog content at a configured pace.
pub struct SimulatedSwarm {
    config: SimulationConfig,
    catalog: RwLock<HashMap<ContentId, Arc<SimulatedContent>>>,
    behavior: Mutex<JoinBehavior>,
    rng: Mutex<ChaCha8Rng>,
    joins: AtomicUsize,
    joins_by_content: Mutex<HashMap<ContentId, usize>>,
    torrents: Mutex<Vec<Weak<SimulatedTorrent>>>,
}

impl SimulatedSwarm {
    pub fn new(config: SimulationConfig) -> Self {
        let rng = ChaCha8Rng::seed_from_u64(config.seed);
        Self {
            config,
            catalog: RwLock::new(HashMap::new()),
            behavior: Mutex::new(JoinBehavior::default()),
            rng: Mutex::new(rng),
            joins: AtomicUsize::new(0),
            joins_by_content: Mutex::new(HashMap::new()),
            torrents: Mutex::new(Vec::new()),
        }
    }

    /// Builder-style variant of [`add_content`](Self::add_content).
    pub fn with_content(self, content: SimulatedContent) -> Self {
        self.add_content(content);
        self
    }

    /// Makes content joinable. Returns its content id.
    pub fn add_content(&self, content: SimulatedContent) -> ContentId {
        let content_id = content.content_id();
        debug!(
            content_id = %content_id.short(),
            name = content.name(),
            files = content.files().len(),
            "content added to simulated swarm"
        );
        self.catalog.write().insert(content_id, Arc::new(content));
        content_id
    }

    /// Catalog entries ordered by name.
    pub fn catalog(&self) -> Vec<Arc<SimulatedContent>> {
        let mut entries: Vec<_> = self.catalog.read().values().cloned().collect();
        entries.sort_by(|a, b| a.name().cmp(b.name()));
        entries
    }

    pub fn set_join_behavior(&self, behavior: JoinBehavior) {
        *self.behavior.lock() = behavior;
    }

    /// Number of joins started so far.
    pub fn join_count(&self) -> usize {
        self.joins.load(Ordering::SeqCst)
    }

    /// Number of joins started for one content id.
    pub fn join_count_for(&self, content_id: &ContentId) -> usize {
        self.joins_by_content
            .lock()
            .get(content_id)
            .copied()
            .unwrap_or(0)
    }

    /// Torrents that have not been dropped yet, including shut down ones.
    pub fn live_torrents(&self) -> Vec<Arc<SimulatedTorrent>> {
        let mut torrents = self.torrents.lock();
        torrents.retain(|torrent| torrent.strong_count() > 0);
        torrents.iter().filter_map(Weak::upgrade).collect()
    }

    fn peer_count(&self) -> u32 {
        let (low, high) = (self.config.min_peers, self.config.max_peers.max(self.config.min_peers));
        self.rng.lock().random_range(low..=high)
    }
}

#[async_trait]
impl SwarmClient for SimulatedSwarm {
    async fn join(&self, locator: &Locator) -> Result<Arc<dyn SwarmTorrent>, SwarmError> {
        self.joins.fetch_add(1, Ordering::SeqCst);
        *self
            .joins_by_content
            .lock()
            .entry(locator.content_id)
            .or_insert(0) += 1;
        tokio::time::sleep(self.config.join_delay).await;

        let behavior = self.behavior.lock().clone();
        match behavior {
            JoinBehavior::Deliver => {}
            JoinBehavior::Fail(reason) => return Err(SwarmError::JoinFailed { reason }),
            JoinBehavior::Hang => std::future::pending::<()>().await,
        }

        let content = self.catalog.read().get(&locator.content_id).cloned();
        let Some(content) = content else {
            warn!(content_id = %locator.content_id, "no simulated peers seed this content");
            return Err(SwarmError::JoinFailed {
                reason: format!("no peers seeding {}", locator.content_id),
            });
        };

        let torrent = SimulatedTorrent::start(content, &self.config, self.peer_count());
        self.torrents.lock().push(Arc::downgrade(&torrent));
        Ok(torrent)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn swarm() -> (SimulatedSwarm, SimulatedContent) {
        let content = SimulatedContent::builder("demo")
            .synthetic_file("demo.mp4", 64 * 1024, 1)
            .build();
        let swarm = SimulatedSwarm::new(SimulationConfig::deterministic_testing())
            .with_content(content.clone());
        (swarm, content)
    }

    #[tokio::test(start_paused = true)]
    async fn test_join_known_content() {
        let (swarm, content) = swarm();
        let locator = Locator::parse(&content.magnet_uri()).unwrap();

        let torrent = swarm.join(&locator).await.unwrap();
        assert_eq!(torrent.files()[0].name, "demo.mp4");
        assert_eq!(torrent.stats().peer_count, 3);
        assert_eq!(swarm.join_count(), 1);
        assert_eq!(swarm.join_count_for(&content.content_id()), 1);
        assert_eq!(swarm.live_torrents().len(), 1);
        torrent.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_content_fails() {
        let (swarm, _) = swarm();
        let locator = Locator::parse("ffffffffffffffffffffffffffffffffffffffff").unwrap();
        let result = swarm.join(&locator).await;
        assert!(matches!(result, Err(SwarmError::JoinFailed { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_configured_failure_and_hang() {
        let (swarm, content) = swarm();
        let locator = Locator::parse(&content.magnet_uri()).unwrap();

        swarm.set_join_behavior(JoinBehavior::Fail("tracker down".to_string()));
        assert_eq!(
            swarm.join(&locator).await.err(),
            Some(SwarmError::JoinFailed {
                reason: "tracker down".to_string()
            })
        );

        swarm.set_join_behavior(JoinBehavior::Hang);
        let hung = tokio::time::timeout(Duration::from_secs(60), swarm.join(&locator)).await;
        assert!(hung.is_err());
        assert_eq!(swarm.join_count(), 2);
    }

    #[test]
    fn test_peer_counts_follow_seed() {
        let config = SimulationConfig {
            min_peers: 5,
            max_peers: 50,
            ..SimulationConfig::default()
        };
        let first = SimulatedSwarm::new(config.clone());
        let second = SimulatedSwarm::new(config);
        let a: Vec<_> = (0..5).map(|_| first.peer_count()).collect();
        let b: Vec<_> = (0..5).map(|_| second.peer_count()).collect();
        assert_eq!(a, b);
        assert!(a.iter().all(|peers| (5..=50).contains(peers)));
    }
}
