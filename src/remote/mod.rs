//! Collaborators that talk to the remote tracker.
//!
//! The sync engine only sees three traits:
//!
//! - [`ListSource`] - the cheap `id → status` listing of every issue
//! - [`ItemSource`] - one raw document per issue
//! - [`RecordExtractor`] - turns that document into an [`Issue`]
//!
//! [`RoundupClient`] implements both sources over HTTP and
//! [`RoundupExtractor`] parses Roundup issue pages.

mod extract;
mod http;

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

pub use extract::{RoundupExtractor, format_value, normalize_label, url_join};
pub use http::{DEFAULT_BASE_URL, DEFAULT_LIST_TIMEOUT, RoundupClient, parse_issue_list};

use crate::error::Result;
use crate::model::{Issue, IssueId, MetadataSnapshot};

/// Why a single item fetch failed.
///
/// These never escape the fetch layer; they only drive its retry loop.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The request exceeded its per-attempt timeout.
    #[error("request timed out")]
    Timeout,

    /// Any other recoverable failure (connection, status, parse).
    #[error("{0}")]
    Transient(String),
}

/// Source of the full remote `id → status` listing.
pub trait ListSource: Send + Sync {
    /// Fetch a snapshot of every issue the remote currently knows.
    fn fetch_list(&self) -> impl Future<Output = Result<MetadataSnapshot>> + Send;
}

/// Source of raw per-issue documents.
pub trait ItemSource: Send + Sync {
    /// Fetch the document for `id`, giving up after `timeout`.
    fn fetch_item(
        &self,
        id: IssueId,
        timeout: Duration,
    ) -> impl Future<Output = std::result::Result<String, FetchError>> + Send;
}

/// Turns one fetched document into a structured record.
///
/// Implementations must return an error rather than panic on malformed
/// input.
pub trait RecordExtractor: Send + Sync {
    /// Extract the issue `id` from `document`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::Error::Parse`] if the document is not an
    /// issue page.
    fn extract(&self, id: IssueId, document: &str) -> Result<Issue>;
}
