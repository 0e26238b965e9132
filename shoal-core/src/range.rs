//! HTTP Range request planning for progressive playback
//!
//! Implements the single-range subset of RFC 7233 used by media elements:
//! `bytes=start-end` with an optional end. Headers outside that subset
//! (other units, multiple ranges, suffix ranges) are ignored and the whole
//! file is served, which RFC 7233 permits.

use std::num::IntErrorKind;

/// Inclusive byte window within a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    /// Creates an inclusive window. `start` must not exceed `end`.
    pub fn new(start: u64, end: u64) -> Self {
        debug_assert!(start <= end);
        Self { start, end }
    }

    /// Number of bytes covered by the window.
    ///
    /// Both bounds are inclusive and `start <= end`, so this is never zero.
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Always false: the smallest window covers exactly one byte.
    pub fn is_empty(&self) -> bool {
        false
    }
}

/// Range requests that cannot be served for a file.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RangeError {
    #[error("range starting at {start} not satisfiable for {size} byte file")]
    NotSatisfiable { start: u64, size: u64 },
}

impl RangeError {
    /// Size of the file the range was resolved against.
    pub fn size(&self) -> u64 {
        match self {
            RangeError::NotSatisfiable { size, .. } => *size,
        }
    }
}

/// How a request maps onto a file of known size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangePlan {
    /// No usable Range header: serve the whole file with 200
    Full { size: u64 },
    /// Satisfiable Range header: serve the window with 206
    Partial { range: ByteRange, size: u64 },
}

impl RangePlan {
    /// Resolves an optional Range header value against a file size.
    ///
    /// The end defaults to and is clamped to `size - 1`.
    ///
    /// # Errors
    /// - `RangeError::NotSatisfiable` - Start is at or past the end of the
    ///   file, or start exceeds the requested end
    ///
    /// # Examples
    /// ```
    /// use shoal_core::range::{ByteRange, RangePlan};
    /// let plan = RangePlan::resolve(Some("bytes=100-199"), 1000).unwrap();
    /// assert_eq!(plan, RangePlan::Partial { range: ByteRange::new(100, 199), size: 1000 });
    /// ```
    pub fn resolve(header: Option<&str>, size: u64) -> Result<Self, RangeError> {
        let Some((start, end)) = header.and_then(parse_bytes_spec) else {
            return Ok(RangePlan::Full { size });
        };

        if start >= size {
            return Err(RangeError::NotSatisfiable { start, size });
        }

        let last = size - 1;
        let end = end.map_or(last, |end| end.min(last));
        if start > end {
            return Err(RangeError::NotSatisfiable { start, size });
        }

        Ok(RangePlan::Partial {
            range: ByteRange::new(start, end),
            size,
        })
    }

    /// Total size of the underlying file.
    pub fn size(&self) -> u64 {
        match self {
            RangePlan::Full { size } | RangePlan::Partial { size, .. } => *size,
        }
    }

    /// Whether the response is 206 Partial Content.
    pub fn is_partial(&self) -> bool {
        matches!(self, RangePlan::Partial { .. })
    }

    /// Bytes to read, or `None` when the body is empty.
    pub fn window(&self) -> Option<ByteRange> {
        match self {
            RangePlan::Full { size: 0 } => None,
            RangePlan::Full { size } => Some(ByteRange::new(0, size - 1)),
            RangePlan::Partial { range, .. } => Some(*range),
        }
    }

    /// Value of the Content-Length header.
    pub fn content_length(&self) -> u64 {
        self.window().map_or(0, |window| window.len())
    }

    /// Value of the Content-Range header, present for partial responses only.
    pub fn content_range(&self) -> Option<String> {
        match self {
            RangePlan::Partial { range, size } => {
                Some(format!("bytes {}-{}/{}", range.start, range.end, size))
            }
            RangePlan::Full { .. } => None,
        }
    }
}

/// Parses `bytes=start-[end]` into its bounds.
///
/// Returns None for anything outside the supported single-range form.
fn parse_bytes_spec(header: &str) -> Option<(u64, Option<u64>)> {
    let header = header.trim();
    let unit = header.get(..6)?;
    if !unit.eq_ignore_ascii_case("bytes=") {
        return None;
    }

    let spec = header[6..].trim();
    if spec.contains(',') {
        return None;
    }

    let (start, end) = spec.split_once('-')?;
    let start = start.trim();
    if start.is_empty() {
        return None;
    }
    let start = parse_bound(start)?;

    let end = end.trim();
    let end = if end.is_empty() {
        None
    } else {
        Some(parse_bound(end)?)
    };

    Some((start, end))
}

/// Parses a decimal bound, saturating at `u64::MAX` when the digits overflow.
fn parse_bound(token: &str) -> Option<u64> {
    match token.parse::<u64>() {
        Ok(value) => Some(value),
        Err(e) if *e.kind() == IntErrorKind::PosOverflow => Some(u64::MAX),
        Err(_) => None,
    }
}
