//! Shoal Sim - In-process swarm for development and testing
//!
//! Implements the gateway's swarm seam without any network access. Content
//! comes from a seeded synthetic catalog or a directory of media files, and
//! pieces arrive at a configured pace so range requests genuinely suspend on
//! missing data.
//!
//! ```rust,no_run
//! use shoal_core::config::SimulationConfig;
//! use shoal_sim::{SimulatedContent, SimulatedSwarm};
//!
//! let content = SimulatedContent::builder("Demo")
//!     .synthetic_file("demo.mp4", 8 * 1024 * 1024, 42)
//!     .build();
//! let magnet = content.magnet_uri();
//! let swarm = SimulatedSwarm::new(SimulationConfig::default()).with_content(content);
//! # let _ = (magnet, swarm);
//! ```

pub mod content;
pub mod picker;
pub mod swarm;
pub mod torrent;

use std::path::PathBuf;

pub use content::{ContentBuilder, SimulatedContent, SimulatedFile};
pub use picker::{PieceWindow, StreamingPiecePicker};
pub use swarm::{JoinBehavior, SimulatedSwarm};
pub use torrent::SimulatedTorrent;

/// Errors building the simulated catalog.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no playable media files in {}", path.display())]
    NoMedia { path: PathBuf },
}

/// Builds the default demo catalog: seeded synthetic videos of a few sizes.
pub fn demo_catalog(seed: u64) -> Vec<SimulatedContent> {
    vec![
        SimulatedContent::builder("Shoal Demo Short")
            .file("README.txt", b"Synthetic content for local testing.\n".to_vec())
            .synthetic_file("Shoal.Demo.Short.mp4", 4 * 1024 * 1024, seed)
            .build(),
        SimulatedContent::builder("Shoal Demo Feature")
            .synthetic_file("Shoal.Demo.Feature.mkv", 32 * 1024 * 1024, seed.wrapping_add(1))
            .file("Shoal.Demo.Feature.srt", b"1\n00:00:00,000 --> 00:00:02,000\nShoal\n".to_vec())
            .build(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_catalog_is_seeded() {
        let first = demo_catalog(42);
        let second = demo_catalog(42);
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].content_id(), second[0].content_id());
        assert_ne!(demo_catalog(7)[1].content_id(), first[1].content_id());

        let files = first[1].file_handles();
        let selected = shoal_core::select_video_file(&files).unwrap();
        assert_eq!(selected.name, "Shoal.Demo.Feature.mkv");
    }
}
