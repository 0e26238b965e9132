//! Playable file selection within a torrent.
//!
//! The first file in listing order whose extension is a playable container
//! wins. Multi-video bundles (episode packs) therefore always stream their
//! first listed video; no content inspection is attempted.

use crate::media;
use crate::swarm::FileHandle;

/// Failure to find anything playable in a file listing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectError {
    #[error("none of the {file_count} files has a playable extension")]
    NoPlayableFile { file_count: usize },
}

/// Picks the file to stream from a Ready session's listing.
///
/// # Errors
/// - `SelectError::NoPlayableFile` - No file ends in a playable extension
pub fn select_video_file(files: &[FileHandle]) -> Result<&FileHandle, SelectError> {
    files
        .iter()
        .find(|file| media::is_playable(&file.name))
        .ok_or(SelectError::NoPlayableFile {
            file_count: files.len(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(names: &[&str]) -> Vec<FileHandle> {
        names
            .iter()
            .enumerate()
            .map(|(index, name)| FileHandle::new(index, *name, 1000 + index as u64))
            .collect()
    }

    #[test]
    fn test_skips_non_video_files() {
        let files = listing(&["README.txt", "cover.jpg", "Movie.2020.1080p.mkv"]);
        let selected = select_video_file(&files).unwrap();
        assert_eq!(selected.index, 2);
    }

    #[test]
    fn test_first_match_in_listing_order_wins() {
        let files = listing(&["Show.S01E02.mp4", "Show.S01E01.mkv", "Show.S01E03.mp4"]);
        let selected = select_video_file(&files).unwrap();
        assert_eq!(selected.name, "Show.S01E02.mp4");
    }

    #[test]
    fn test_no_playable_file() {
        let files = listing(&["album.flac", "notes.nfo"]);
        assert_eq!(
            select_video_file(&files),
            Err(SelectError::NoPlayableFile { file_count: 2 })
        );
        assert!(select_video_file(&[]).is_err());
    }
}
