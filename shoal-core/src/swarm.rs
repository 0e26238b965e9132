//! Swarm client abstraction.
//!
//! The gateway never speaks the peer wire protocol itself. It drives an
//! underlying swarm client through these traits: one [`SwarmClient`] per
//! process joins swarms, and each join yields a [`SwarmTorrent`] handle that
//! owns the peer connections and piece storage for one item of content.

use std::ops::RangeInclusive;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;

use crate::content_id::Locator;
use crate::media;

/// One file inside a torrent. Fixed once the session is Ready.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileHandle {
    /// Position of the file in the torrent's listing order
    pub index: usize,
    /// Path of the file within the torrent
    pub name: String,
    /// Length of the file in bytes
    pub length: u64,
    /// Lowercase extension derived from the name
    pub extension: Option<String>,
}

impl FileHandle {
    pub fn new(index: usize, name: impl Into<String>, length: u64) -> Self {
        let name = name.into();
        let extension = media::extension_of(&name);
        Self {
            index,
            name,
            length,
            extension,
        }
    }
}

/// Live transfer metrics, recomputed on every call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferStats {
    pub download_rate_bytes_per_sec: u64,
    pub upload_rate_bytes_per_sec: u64,
    pub peer_count: u32,
    pub progress_fraction: f64,
}

/// Handle for one registered piece-priority interest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InterestId(pub u64);

/// Errors reported by the underlying swarm client.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SwarmError {
    #[error("swarm join failed: {reason}")]
    JoinFailed { reason: String },

    #[error("file index {index} not present in torrent")]
    FileNotFound { index: usize },

    #[error("offset {offset} is beyond file length {length}")]
    OutOfBounds { offset: u64, length: u64 },

    #[error("torrent has been shut down")]
    Shutdown,

    #[error("piece storage error: {reason}")]
    Storage { reason: String },
}

/// Process-wide entry point into the swarm.
#[async_trait]
pub trait SwarmClient: Send + Sync {
    /// Joins the swarm for a locator and resolves once file metadata is known.
    ///
    /// The caller bounds this with its own timeout and drops the future on
    /// expiry, so implementations must release anything they started when
    /// the future is dropped.
    ///
    /// # Errors
    /// - `SwarmError::JoinFailed` - Peers or trackers could not supply metadata
    async fn join(&self, locator: &Locator) -> Result<Arc<dyn SwarmTorrent>, SwarmError>;
}

/// One joined swarm: shared peer connections and piece storage.
///
/// Any number of readers may be layered over one handle. Each reader
/// registers an interest for the byte window it needs so the client can
/// prioritize those pieces, and removes it when it stops reading.
#[async_trait]
pub trait SwarmTorrent: Send + Sync {
    /// Files in listing order.
    fn files(&self) -> Vec<FileHandle>;

    /// Current transfer metrics.
    fn stats(&self) -> TransferStats;

    /// Whether every piece has been downloaded.
    fn is_complete(&self) -> bool;

    /// Resolves when the transfer completes. Never resolves after shutdown.
    async fn wait_complete(&self);

    /// Asks the client to prioritize the pieces covering `range` of a file.
    ///
    /// # Errors
    /// - `SwarmError::FileNotFound` - File index out of bounds
    /// - `SwarmError::Shutdown` - Torrent already released
    fn add_interest(
        &self,
        file_index: usize,
        range: RangeInclusive<u64>,
    ) -> Result<InterestId, SwarmError>;

    /// Withdraws a previously registered interest. Unknown ids are ignored.
    fn remove_interest(&self, interest: InterestId);

    /// Reads up to `max_len` bytes of a file starting at `offset`.
    ///
    /// Suspends until the piece covering `offset` is available and returns
    /// at least one byte. Must be cancellation safe: dropping the future
    /// leaves the torrent unaffected.
    ///
    /// # Errors
    /// - `SwarmError::FileNotFound` - File index out of bounds
    /// - `SwarmError::OutOfBounds` - Offset at or past end of file
    /// - `SwarmError::Shutdown` - Torrent released while waiting
    async fn read_at(
        &self,
        file_index: usize,
        offset: u64,
        max_len: usize,
    ) -> Result<Bytes, SwarmError>;

    /// Disconnects peers and releases piece storage.
    async fn shutdown(&self);
}

#[cfg(test)]
pub(crate) mod test_mocks;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_handle_extension() {
        let file = FileHandle::new(2, "Show/Episode.S01E02.MKV", 1024);
        assert_eq!(file.extension.as_deref(), Some("mkv"));
        assert_eq!(file.index, 2);
    }

    #[test]
    fn test_stats_serialize_camel_case() {
        let stats = TransferStats {
            download_rate_bytes_per_sec: 2048,
            upload_rate_bytes_per_sec: 512,
            peer_count: 7,
            progress_fraction: 0.5,
        };
        let json = serde_json::to_value(stats).unwrap();
        assert_eq!(json["downloadRateBytesPerSec"], 2048);
        assert_eq!(json["uploadRateBytesPerSec"], 512);
        assert_eq!(json["peerCount"], 7);
        assert_eq!(json["progressFraction"], 0.5);
    }
}
