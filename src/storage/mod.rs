//! On-disk persistence for the metadata snapshot and the archive.
//!
//! Both files are replaced atomically (temp file, fsync, rename) so an
//! interrupted run never leaves a half-written file behind.
//!
//! # Submodules
//!
//! - [`archive`] - archive container files and multi-container merge
//! - [`file`] - atomic write helpers
//! - [`metadata`] - the `id → status` snapshot

pub mod archive;
pub mod file;
pub mod metadata;

pub use archive::{ArchiveStore, ContainerFailure, ContainerMerge, merge_containers};
pub use file::atomic_write;
pub use metadata::MetadataStore;
