//! Persisted metadata snapshot (`id → status code` JSON object).

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::file::atomic_write;
use crate::error::{Error, Result};
use crate::model::MetadataSnapshot;

/// The on-disk metadata snapshot.
#[derive(Debug, Clone)]
pub struct MetadataStore {
    path: PathBuf,
}

impl MetadataStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Read the stored snapshot.
    ///
    /// Status codes are not validated here; that happens when the snapshot
    /// is classified.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MetadataNotFound`] if the file is missing and
    /// [`Error::MalformedMetadata`] if it is not an `id → integer` object.
    pub fn load(&self) -> Result<MetadataSnapshot> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(Error::MetadataNotFound {
                    path: self.path.clone(),
                });
            }
            Err(e) => return Err(e.into()),
        };

        let snapshot: MetadataSnapshot = serde_json::from_str(&content)
            .map_err(|e| Error::MalformedMetadata(format!("{}: {e}", self.path.display())))?;
        debug!(path = %self.path.display(), entries = snapshot.len(), "loaded metadata");
        Ok(snapshot)
    }

    /// Replace the stored snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the atomic write fails.
    pub fn save(&self, snapshot: &MetadataSnapshot) -> Result<()> {
        let content = serde_json::to_vec(snapshot)?;
        atomic_write(&self.path, &content)?;
        debug!(path = %self.path.display(), entries = snapshot.len(), "saved metadata");
        Ok(())
    }
}
