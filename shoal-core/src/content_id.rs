//! Content identity resolution for swarm locators.
//!
//! A locator names content by its hash and may carry routing hints such as
//! tracker lists or a display name. Only the hash participates in identity,
//! so locators that differ in their hints resolve to the same [`ContentId`].

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};
use url::Url;

/// Length in bytes of a content hash.
pub const CONTENT_ID_LEN: usize = 20;

const HEX_DIGEST_LEN: usize = CONTENT_ID_LEN * 2;
const BTIH_PREFIX: &str = "urn:btih:";

/// Canonical identifier of one item of swarm content.
///
/// 20-byte digest displayed as 40 lowercase hex characters. Used as the
/// registry key and the stats lookup key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentId([u8; CONTENT_ID_LEN]);

impl ContentId {
    /// Creates ContentId from a raw 20-byte digest.
    pub fn new(bytes: [u8; CONTENT_ID_LEN]) -> Self {
        Self(bytes)
    }

    /// Returns reference to underlying digest bytes.
    pub fn as_bytes(&self) -> &[u8; CONTENT_ID_LEN] {
        &self.0
    }

    /// Parses a 40-character hex digest, accepting either letter case.
    ///
    /// # Errors
    /// - `ResolveError::InvalidLength` - Token is not 40 characters
    /// - `ResolveError::InvalidAlphabet` - Token contains non-hex characters
    pub fn from_hex(token: &str) -> Result<Self, ResolveError> {
        if token.len() != HEX_DIGEST_LEN {
            return Err(ResolveError::InvalidLength {
                length: token.len(),
            });
        }

        let mut bytes = [0u8; CONTENT_ID_LEN];
        hex::decode_to_slice(token, &mut bytes).map_err(|_| ResolveError::InvalidAlphabet {
            token: token.to_string(),
        })?;
        Ok(Self(bytes))
    }

    /// Resolves the content id embedded in a locator string.
    ///
    /// # Errors
    /// - `ResolveError` - Locator is empty, malformed, or lacks a well-formed hash
    pub fn from_locator(locator: &str) -> Result<Self, ResolveError> {
        Locator::parse(locator).map(|parsed| parsed.content_id)
    }

    /// Abbreviated form for log lines.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl FromStr for ContentId {
    type Err = ResolveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for ContentId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Parsed locator: content identity plus the routing hints handed to the swarm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locator {
    pub content_id: ContentId,
    pub display_name: Option<String>,
    pub trackers: Vec<String>,
}

impl Locator {
    /// Parses a magnet URI or a bare hex digest.
    ///
    /// Parameter order in the magnet query is free. The first `xt` value
    /// carrying a `urn:btih:` hex token wins.
    ///
    /// # Errors
    /// - `ResolveError::Empty` - Locator is blank
    /// - `ResolveError::InvalidUri` - Not parseable as a URI
    /// - `ResolveError::UnsupportedScheme` - URI scheme is not `magnet`
    /// - `ResolveError::MissingContentHash` - No `urn:btih:` topic present
    /// - `ResolveError::InvalidLength` / `InvalidAlphabet` - Malformed hash token
    pub fn parse(raw: &str) -> Result<Self, ResolveError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ResolveError::Empty);
        }

        if !raw.contains(':') {
            return Ok(Self {
                content_id: ContentId::from_hex(raw)?,
                display_name: None,
                trackers: Vec::new(),
            });
        }

        let url = Url::parse(raw).map_err(|e| ResolveError::InvalidUri {
            reason: e.to_string(),
        })?;
        if url.scheme() != "magnet" {
            return Err(ResolveError::UnsupportedScheme {
                scheme: url.scheme().to_string(),
            });
        }

        let mut content_id = None;
        let mut display_name = None;
        let mut trackers = Vec::new();

        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "xt" if content_id.is_none() => {
                    if let Some(token) = strip_btih_prefix(&value) {
                        content_id = Some(ContentId::from_hex(token)?);
                    }
                }
                "dn" => display_name = Some(value.into_owned()),
                "tr" => trackers.push(value.into_owned()),
                _ => {}
            }
        }

        let content_id = content_id.ok_or(ResolveError::MissingContentHash)?;
        Ok(Self {
            content_id,
            display_name,
            trackers,
        })
    }
}

fn strip_btih_prefix(topic: &str) -> Option<&str> {
    let prefix = topic.get(..BTIH_PREFIX.len())?;
    if prefix.eq_ignore_ascii_case(BTIH_PREFIX) {
        topic.get(BTIH_PREFIX.len()..)
    } else {
        None
    }
}

/// Reasons a locator cannot be resolved to a content id.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("locator is empty")]
    Empty,

    #[error("locator is not a valid URI: {reason}")]
    InvalidUri { reason: String },

    #[error("unsupported locator scheme: {scheme}")]
    UnsupportedScheme { scheme: String },

    #[error("locator has no urn:btih content hash")]
    MissingContentHash,

    #[error("content hash has length {length} (expected 40)")]
    InvalidLength { length: usize },

    #[error("content hash contains non-hex characters: {token}")]
    InvalidAlphabet { token: String },
}
