//! Shoal Core - Swarm-backed range streaming
//!
//! This crate turns long-lived swarm downloads into byte-range addressable
//! resources: locator resolution, the per-content swarm session lifecycle,
//! the process registry that deduplicates joins, idle reaping, and the
//! HTTP range planning used by the web layer.

pub mod config;
pub mod content_id;
pub mod media;
pub mod range;
pub mod reader;
pub mod reaper;
pub mod registry;
pub mod selector;
pub mod session;
pub mod stats;
pub mod swarm;
pub mod tracing_setup;

// Re-export main types for convenient access
pub use config::ShoalConfig;
pub use content_id::{ContentId, Locator, ResolveError};
pub use range::{ByteRange, RangeError, RangePlan};
pub use reader::{ReadError, ReadSequence};
pub use registry::{SessionSummary, SwarmSessionRegistry};
pub use selector::{SelectError, select_video_file};
pub use session::{SessionError, SessionState, SwarmSession};
pub use swarm::{
    FileHandle, InterestId, SwarmClient, SwarmError, SwarmTorrent, TransferStats,
};

/// Errors that can bubble up from any gateway operation.
///
/// Each variant corresponds to one entry of the gateway error taxonomy so the
/// web layer can map them onto HTTP statuses without inspecting messages.
#[derive(Debug, thiserror::Error)]
pub enum ShoalError {
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(#[from] ResolveError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("No playable file: {0}")]
    NoPlayableFile(#[from] SelectError),

    #[error("Range not satisfiable: {0}")]
    RangeNotSatisfiable(#[from] RangeError),

    #[error("Configuration error: {reason}")]
    Configuration { reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ShoalError {
    /// Returns a user-friendly error message suitable for display.
    pub fn user_message(&self) -> String {
        match self {
            ShoalError::InvalidIdentifier(e) => format!("Invalid locator: {e}"),
            ShoalError::Session(e) => match e {
                SessionError::JoinFailed { reason, .. } => {
                    format!("Could not join swarm: {reason}")
                }
                SessionError::JoinTimedOut { timeout, .. } => format!(
                    "Timed out after {}s waiting for swarm metadata",
                    timeout.as_secs()
                ),
                SessionError::Destroyed { .. } => "Stream session was closed".to_string(),
                _ => "Stream session error occurred".to_string(),
            },
            ShoalError::NoPlayableFile(_) => "No video file found in torrent".to_string(),
            ShoalError::RangeNotSatisfiable(_) => "Requested range not satisfiable".to_string(),
            ShoalError::Configuration { .. } => "Configuration error occurred".to_string(),
            ShoalError::Io(_) => "File system error occurred".to_string(),
        }
    }

    /// Checks if this error is due to user input validation.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            ShoalError::InvalidIdentifier(_) | ShoalError::RangeNotSatisfiable(_)
        )
    }

    /// Checks if this error is a failed or timed out swarm join.
    pub fn is_join_failure(&self) -> bool {
        matches!(
            self,
            ShoalError::Session(SessionError::JoinFailed { .. })
                | ShoalError::Session(SessionError::JoinTimedOut { .. })
        )
    }
}

pub type Result<T> = std::result::Result<T, ShoalError>;
