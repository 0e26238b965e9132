//! Centralized configuration for Shoal.
//!
//! All tunable parameters and settings are defined here to avoid
//! hard-coded values scattered throughout the codebase.

use std::time::Duration;

/// Central configuration for all Shoal components.
///
/// Groups related configuration settings into logical sections.
/// Supports environment variable overrides for runtime customization.
#[derive(Debug, Clone, Default)]
pub struct ShoalConfig {
    pub gateway: GatewayConfig,
    pub server: ServerConfig,
    pub simulation: SimulationConfig,
}

/// Swarm session lifecycle and streaming configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Upper bound on the Pending phase of a session
    pub join_timeout: Duration,
    /// How long a completed, unread session survives before it is reaped
    pub idle_grace_period: Duration,
    /// Maximum bytes yielded per chunk of a read sequence
    pub chunk_size: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            join_timeout: Duration::from_secs(60),
            idle_grace_period: Duration::from_secs(300), // 5 minutes
            chunk_size: 256 * 1024,                      // 256 KiB
        }
    }
}

/// HTTP listener configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Interface to bind
    pub host: String,
    /// TCP port to bind
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

impl ServerConfig {
    /// Returns the `host:port` pair suitable for binding a listener.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Simulated swarm configuration for development and testing.
///
/// Controls how quickly the in-process swarm yields metadata and pieces
/// and how it reports peers.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    /// Delay before metadata becomes available after a join
    pub join_delay: Duration,
    /// Piece size used to lay out simulated content
    pub piece_size: u32,
    /// Interval between delivery ticks
    pub piece_interval: Duration,
    /// Pieces delivered per tick
    pub pieces_per_tick: u32,
    /// Seed for synthetic content and peer counts
    pub seed: u64,
    /// Smallest simulated swarm
    pub min_peers: u32,
    /// Largest simulated swarm
    pub max_peers: u32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            join_delay: Duration::from_millis(500),
            piece_size: 256 * 1024, // 256 KiB
            piece_interval: Duration::from_millis(100),
            pieces_per_tick: 4,
            seed: 42,
            min_peers: 8,
            max_peers: 40,
        }
    }
}

impl SimulationConfig {
    /// Creates a configuration for fast deterministic tests.
    pub fn deterministic_testing() -> Self {
        Self {
            join_delay: Duration::from_millis(10),
            piece_size: 16 * 1024,
            piece_interval: Duration::from_millis(5),
            pieces_per_tick: 64,
            seed: 42,
            min_peers: 3,
            max_peers: 3,
        }
    }

    /// Bytes delivered per second while the transfer is active.
    pub fn delivery_rate(&self) -> u64 {
        let per_tick = self.piece_size as u64 * self.pieces_per_tick as u64;
        let interval_ms = self.piece_interval.as_millis().max(1) as u64;
        per_tick * 1000 / interval_ms
    }
}

impl ShoalConfig {
    /// Creates configuration with environment variable overrides.
    ///
    /// Allows runtime configuration via environment variables while
    /// maintaining sensible defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(seconds) = env_parse::<u64>("SHOAL_JOIN_TIMEOUT") {
            config.gateway.join_timeout = Duration::from_secs(seconds);
        }

        if let Some(seconds) = env_parse::<u64>("SHOAL_IDLE_GRACE") {
            config.gateway.idle_grace_period = Duration::from_secs(seconds);
        }

        if let Some(size) = env_parse::<usize>("SHOAL_CHUNK_SIZE") {
            if size > 0 {
                config.gateway.chunk_size = size;
            }
        }

        if let Ok(host) = std::env::var("SHOAL_HOST") {
            config.server.host = host;
        }

        if let Some(port) = env_parse::<u16>("SHOAL_PORT") {
            config.server.port = port;
        }

        if let Some(seed) = env_parse::<u64>("SHOAL_SIM_SEED") {
            config.simulation.seed = seed;
        }

        if let Some(millis) = env_parse::<u64>("SHOAL_SIM_JOIN_DELAY_MS") {
            config.simulation.join_delay = Duration::from_millis(millis);
        }

        config
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|value| value.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        let config = ShoalConfig::default();
        assert_eq!(config.gateway.join_timeout, Duration::from_secs(60));
        assert_eq!(config.gateway.idle_grace_period, Duration::from_secs(300));
        assert_eq!(config.gateway.chunk_size, 262_144);
        assert_eq!(config.server.bind_address(), "127.0.0.1:3000");
    }

    #[test]
    fn test_delivery_rate() {
        let sim = SimulationConfig {
            piece_size: 1024,
            pieces_per_tick: 2,
            piece_interval: Duration::from_millis(500),
            ..SimulationConfig::default()
        };
        assert_eq!(sim.delivery_rate(), 4096);
    }
}
