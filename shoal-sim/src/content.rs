//! Content catalog served by the simulated swarm.

use std::fs;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use sha1::{Digest, Sha1};
use shoal_core::{ContentId, FileHandle, media};

use crate::SimError;

/// One file of simulated content.
#[derive(Debug, Clone)]
pub struct SimulatedFile {
    pub name: String,
    pub data: Bytes,
}

impl SimulatedFile {
    pub fn length(&self) -> u64 {
        self.data.len() as u64
    }
}

/// A multi-file item the simulated swarm can "download".
///
/// The content id is derived from the item name and file listing, so the
/// same inputs always produce the same locator.
#[derive(Debug, Clone)]
pub struct SimulatedContent {
    content_id: ContentId,
    name: String,
    files: Vec<SimulatedFile>,
}

impl SimulatedContent {
    pub fn builder(name: impl Into<String>) -> ContentBuilder {
        ContentBuilder {
            name: name.into(),
            files: Vec::new(),
        }
    }

    pub fn content_id(&self) -> ContentId {
        self.content_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn files(&self) -> &[SimulatedFile] {
        &self.files
    }

    /// File listing as reported to the gateway.
    pub fn file_handles(&self) -> Vec<FileHandle> {
        self.files
            .iter()
            .enumerate()
            .map(|(index, file)| FileHandle::new(index, file.name.clone(), file.length()))
            .collect()
    }

    /// Combined length of every file, laid out back to back.
    pub fn total_length(&self) -> u64 {
        self.files.iter().map(SimulatedFile::length).sum()
    }

    /// Magnet URI resolving to this content.
    pub fn magnet_uri(&self) -> String {
        format!(
            "magnet:?xt=urn:btih:{}&dn={}",
            self.content_id,
            urlencoding::encode(&self.name)
        )
    }

    /// Loads every playable file in a directory as single-file content.
    ///
    /// Files are read fully into memory. Other entries are skipped.
    ///
    /// # Errors
    /// - `SimError::Io` - Directory or a file could not be read
    /// - `SimError::NoMedia` - Directory holds no playable files
    pub fn from_directory(dir: &Path) -> Result<Vec<Self>, SimError> {
        let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .filter(|path| path.is_file())
            .filter(|path| path.file_name().and_then(|n| n.to_str()).is_some_and(media::is_playable))
            .collect();
        paths.sort();

        let mut catalog = Vec::with_capacity(paths.len());
        for path in paths {
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let data = fs::read(&path)?;
            let stem = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or(file_name)
                .to_string();
            tracing::debug!(file = file_name, bytes = data.len(), "loaded media file");
            catalog.push(Self::builder(stem).file(file_name, data).build());
        }

        if catalog.is_empty() {
            return Err(SimError::NoMedia {
                path: dir.to_path_buf(),
            });
        }
        Ok(catalog)
    }
}

/// Incrementally assembles [`SimulatedContent`].
#[derive(Debug)]
pub struct ContentBuilder {
    name: String,
    files: Vec<SimulatedFile>,
}

impl ContentBuilder {
    /// Adds a file with explicit bytes.
    pub fn file(mut self, name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        self.files.push(SimulatedFile {
            name: name.into(),
            data: data.into(),
        });
        self
    }

    /// Adds a file of seeded pseudo-random bytes.
    pub fn synthetic_file(self, name: impl Into<String>, length: usize, seed: u64) -> Self {
        let mut data = vec![0u8; length];
        ChaCha8Rng::seed_from_u64(seed).fill_bytes(&mut data);
        self.file(name, data)
    }

    /// Adds a file whose bytes encode their own offset modulo 251.
    pub fn patterned_file(self, name: impl Into<String>, length: usize) -> Self {
        let data: Vec<u8> = (0..length).map(|i| (i % 251) as u8).collect();
        self.file(name, data)
    }

    pub fn build(self) -> SimulatedContent {
        let mut hasher = Sha1::new();
        hasher.update(self.name.as_bytes());
        for file in &self.files {
            hasher.update(file.name.as_bytes());
            hasher.update(file.length().to_be_bytes());
            hasher.update(&file.data[..file.data.len().min(64 * 1024)]);
        }
        let digest: [u8; 20] = hasher.finalize().into();

        SimulatedContent {
            content_id: ContentId::new(digest),
            name: self.name,
            files: self.files,
        }
    }
}

#[cfg(test)]
mod tests {
    use shoal_core::Locator;

    use super::*;

    #[test]
    fn test_content_id_is_deterministic() {
        let first = SimulatedContent::builder("Big Buck Bunny")
            .synthetic_file("bunny.mp4", 4096, 7)
            .build();
        let second = SimulatedContent::builder("Big Buck Bunny")
            .synthetic_file("bunny.mp4", 4096, 7)
            .build();
        let other_seed = SimulatedContent::builder("Big Buck Bunny")
            .synthetic_file("bunny.mp4", 4096, 8)
            .build();

        assert_eq!(first.content_id(), second.content_id());
        assert_ne!(first.content_id(), other_seed.content_id());
        assert_eq!(first.files()[0].data, second.files()[0].data);
    }

    #[test]
    fn test_magnet_uri_resolves_to_content_id() {
        let content = SimulatedContent::builder("Two Words")
            .patterned_file("a.mkv", 10)
            .file("notes.txt", b"hello".to_vec())
            .build();

        let locator = Locator::parse(&content.magnet_uri()).unwrap();
        assert_eq!(locator.content_id, content.content_id());
        assert_eq!(locator.display_name.as_deref(), Some("Two Words"));
        assert_eq!(content.total_length(), 15);
    }

    #[test]
    fn test_from_directory_loads_playable_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.mp4"), vec![2u8; 32]).unwrap();
        fs::write(dir.path().join("a.mkv"), vec![1u8; 16]).unwrap();
        fs::write(dir.path().join("readme.txt"), b"skip").unwrap();

        let catalog = SimulatedContent::from_directory(dir.path()).unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog[0].name(), "a");
        assert_eq!(catalog[0].files()[0].name, "a.mkv");
        assert_eq!(catalog[1].total_length(), 32);
    }

    #[test]
    fn test_from_directory_without_media() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("readme.txt"), b"skip").unwrap();
        assert!(matches!(
            SimulatedContent::from_directory(dir.path()),
            Err(SimError::NoMedia { .. })
        ));
    }
}
