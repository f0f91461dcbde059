//! Data models for pyissues.
//!
//! - [`status`] - status codes, metadata snapshots and their classification
//! - [`issue`] - issue and comment records, field tables, builder

pub mod issue;
pub mod status;

pub use issue::{
    split_author, strip_parenthesized, Comment, Issue, IssueBuilder, ListField, NodeField,
    NodeRecord, ScalarField,
};
pub use status::{ClassifiedSnapshot, IssueId, MetadataSnapshot, StatusCode};
