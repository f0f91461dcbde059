//! Archive container files.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};

use super::file::atomic_write;
use crate::archive::{Archive, ArchiveCodec, ContainerFormat, MergeStats, TextMode};
use crate::error::{Error, Result};

/// One archive container file on disk.
#[derive(Debug, Clone)]
pub struct ArchiveStore {
    path: PathBuf,
    codec: ArchiveCodec,
}

impl ArchiveStore {
    /// Open a store whose compression follows the file name
    /// (`*.gz` is gzip, anything else plain).
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, mode: TextMode) -> Self {
        let path = path.into();
        let codec = ArchiveCodec::new(mode, ContainerFormat::from_path(&path));
        Self { path, codec }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn codec(&self) -> ArchiveCodec {
        self.codec
    }

    #[must_use]
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Read and decode the whole archive.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ArchiveNotFound`] if the file is missing and
    /// [`Error::MalformedContainer`] if it does not decode.
    pub fn load(&self) -> Result<Archive> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(Error::ArchiveNotFound {
                    path: self.path.clone(),
                });
            }
            Err(e) => return Err(e.into()),
        };
        let archive = self.codec.decode_archive(&bytes)?;
        debug!(path = %self.path.display(), issues = archive.len(), "loaded archive");
        Ok(archive)
    }

    /// Encode and atomically replace the archive file.
    ///
    /// Returns the number of issues written.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or the write fails.
    pub fn save(&self, archive: &Archive) -> Result<usize> {
        let bytes = self.codec.encode_archive(archive)?;
        atomic_write(&self.path, &bytes)?;
        info!(path = %self.path.display(), issues = archive.len(), "archive written");
        Ok(archive.len())
    }
}

/// A container that could not be merged.
#[derive(Debug, Clone, Serialize)]
pub struct ContainerFailure {
    pub path: PathBuf,
    pub error: String,
}

/// Result of merging several containers.
#[derive(Debug, Default)]
pub struct ContainerMerge {
    pub archive: Archive,
    pub loaded: Vec<PathBuf>,
    pub failed: Vec<ContainerFailure>,
    pub stats: MergeStats,
}

/// Merge several archive containers by id, in the given order.
///
/// A container that cannot be read or decoded is logged and skipped; the
/// rest are still merged. The merged archive keeps the latest
/// `last_fetched` of the loaded containers.
#[must_use]
pub fn merge_containers(paths: &[PathBuf], mode: TextMode) -> ContainerMerge {
    let mut merged = ContainerMerge::default();
    let mut last_fetched = 0.0_f64;

    for path in paths {
        info!(path = %path.display(), "loading container");
        match ArchiveStore::new(path.clone(), mode).load() {
            Ok(archive) => {
                last_fetched = last_fetched.max(archive.last_fetched());
                let stats = merged.archive.merge_all(archive.into_issues());
                merged.stats.inserted += stats.inserted;
                merged.stats.replaced += stats.replaced;
                merged.stats.unchanged += stats.unchanged;
                merged.loaded.push(path.clone());
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping container");
                merged.failed.push(ContainerFailure {
                    path: path.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    merged.archive.set_last_fetched(last_fetched);
    merged
}
