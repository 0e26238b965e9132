//! CLI command implementations

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Subcommand;
use shoal_core::config::ShoalConfig;
use shoal_core::{Locator, ShoalError};
use shoal_sim::{SimulatedContent, SimulatedSwarm, demo_catalog};
use shoal_web::{AppState, run_server};
use tracing::warn;

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Start the gateway on the simulated swarm
    Server {
        /// Host to bind to (default 127.0.0.1, or SHOAL_HOST)
        #[arg(long)]
        host: Option<String>,
        /// Port to bind to (default 3000, or SHOAL_PORT)
        #[arg(short, long)]
        port: Option<u16>,
        /// Directory of media files to seed alongside the demo content
        #[arg(long)]
        media_dir: Option<PathBuf>,
        /// Seconds a completed, unread session survives
        #[arg(long)]
        idle_grace: Option<u64>,
    },
    /// Print the canonical content id of a locator
    Resolve {
        /// Magnet URI or bare hex digest
        locator: String,
    },
}

/// Handle the CLI command
///
/// # Errors
/// Returns appropriate error based on the command that fails
pub async fn handle_command(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Server {
            host,
            port,
            media_dir,
            idle_grace,
        } => start_server(host, port, media_dir, idle_grace).await,
        Commands::Resolve { locator } => resolve(&locator),
    }
}

/// Start the gateway, seeding demo content and any local media.
///
/// # Errors
/// - `ShoalError::Io` - Listener could not bind
pub async fn start_server(
    host: Option<String>,
    port: Option<u16>,
    media_dir: Option<PathBuf>,
    idle_grace: Option<u64>,
) -> anyhow::Result<()> {
    let mut config = ShoalConfig::from_env();
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    if let Some(seconds) = idle_grace {
        config.gateway.idle_grace_period = Duration::from_secs(seconds);
    }

    let swarm = SimulatedSwarm::new(config.simulation.clone());
    for content in demo_catalog(config.simulation.seed) {
        swarm.add_content(content);
    }
    if let Some(dir) = media_dir {
        match SimulatedContent::from_directory(&dir) {
            Ok(catalog) => {
                for content in catalog {
                    swarm.add_content(content);
                }
            }
            Err(e) => warn!(dir = %dir.display(), error = %e, "skipping media directory"),
        }
    }

    let base = format!("http://{}/stream?locator=", config.server.bind_address());
    println!("Shoal gateway on http://{}", config.server.bind_address());
    println!("Seeded content:");
    for content in swarm.catalog() {
        println!("  {}", content.name());
        println!("    {base}{}", urlencoding::encode(&content.magnet_uri()));
    }

    let state = AppState::new(config, Arc::new(swarm));
    run_server(state).await.context("gateway server failed")?;
    Ok(())
}

/// Print the content id a locator resolves to.
///
/// # Errors
/// - `ShoalError::InvalidIdentifier` - Locator has no well-formed content hash
pub fn resolve(raw: &str) -> anyhow::Result<()> {
    let locator = Locator::parse(raw).map_err(ShoalError::from)?;

    println!("{}", locator.content_id);
    if let Some(name) = &locator.display_name {
        println!("  name: {name}");
    }
    for tracker in &locator.trackers {
        println!("  tracker: {tracker}");
    }
    Ok(())
}
