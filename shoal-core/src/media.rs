//! Media container extensions and content types.
//!
//! Content types are derived purely from the file extension. Unknown
//! extensions map to a generic binary type.

use std::path::Path;

/// Recognized playable container extensions.
pub const PLAYABLE_EXTENSIONS: &[&str] = &["mp4", "mkv", "webm", "m4v", "mov", "avi"];

/// Content type served for files without a recognized extension.
pub const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Returns the lowercase extension of a file name, if any.
pub fn extension_of(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}

/// Checks whether a file name ends in a playable container extension.
pub fn is_playable(name: &str) -> bool {
    extension_of(name).is_some_and(|ext| PLAYABLE_EXTENSIONS.contains(&ext.as_str()))
}

/// Maps a file name to the Content-Type header value served for it.
pub fn content_type_for(name: &str) -> &'static str {
    match extension_of(name).as_deref() {
        Some("mp4") | Some("m4v") => "video/mp4",
        Some("mkv") => "video/x-matroska",
        Some("webm") => "video/webm",
        Some("mov") => "video/quicktime",
        Some("avi") => "video/x-msvideo",
        _ => FALLBACK_CONTENT_TYPE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_mapping() {
        assert_eq!(content_type_for("movie.mp4"), "video/mp4");
        assert_eq!(content_type_for("Movie.MKV"), "video/x-matroska");
        assert_eq!(content_type_for("clip.webm"), "video/webm");
        assert_eq!(content_type_for("notes.txt"), FALLBACK_CONTENT_TYPE);
        assert_eq!(content_type_for("README"), FALLBACK_CONTENT_TYPE);
    }

    #[test]
    fn test_playable_detection() {
        assert!(is_playable("Season 1/episode.01.mkv"));
        assert!(!is_playable("sample.srt"));
        assert!(!is_playable("mkv"));
    }
}
