//! The local archive of fully fetched issues.
//!
//! - [`Archive`] - id-keyed in-memory collection with merge-by-id
//! - [`codec`] - container encoding/decoding
//! - [`text`] - the reversible safe-text transform
//!
//! Merging always replaces an existing record of the same id in full; there
//! is no field-level patching and no deletion.

mod codec;
mod hash;
mod text;

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

pub use codec::{ArchiveCodec, Container, ContainerFormat};
pub use hash::content_hash;
pub use text::TextMode;

use crate::model::{Issue, IssueId};

/// What a single merge did to the archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// No record with this id existed.
    Inserted,
    /// An existing record was replaced by different content.
    Replaced,
    /// An existing record was replaced by identical content.
    Unchanged,
}

/// Counts over a batch of merges.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeStats {
    pub inserted: usize,
    pub replaced: usize,
    pub unchanged: usize,
}

impl MergeStats {
    pub fn record(&mut self, outcome: MergeOutcome) {
        match outcome {
            MergeOutcome::Inserted => self.inserted += 1,
            MergeOutcome::Replaced => self.replaced += 1,
            MergeOutcome::Unchanged => self.unchanged += 1,
        }
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.inserted + self.replaced + self.unchanged
    }
}

/// Id-keyed collection of issues plus the time they were last fetched
/// (seconds since the epoch).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Archive {
    issues: BTreeMap<IssueId, Issue>,
    last_fetched: f64,
}

impl Archive {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an archive from records; later duplicates replace earlier ones.
    #[must_use]
    pub fn from_issues<I: IntoIterator<Item = Issue>>(issues: I) -> Self {
        let mut archive = Self::new();
        archive.merge_all(issues);
        archive
    }

    /// Insert `issue`, replacing any record with the same id in full.
    pub fn merge(&mut self, issue: Issue) -> MergeOutcome {
        match self.issues.insert(issue.id, issue) {
            None => MergeOutcome::Inserted,
            Some(previous) => {
                let current = &self.issues[&previous.id];
                if content_hash(&previous) == content_hash(current) {
                    MergeOutcome::Unchanged
                } else {
                    MergeOutcome::Replaced
                }
            }
        }
    }

    /// Merge every record, in iteration order.
    pub fn merge_all<I: IntoIterator<Item = Issue>>(&mut self, issues: I) -> MergeStats {
        let mut stats = MergeStats::default();
        for issue in issues {
            stats.record(self.merge(issue));
        }
        stats
    }

    #[must_use]
    pub fn get(&self, id: IssueId) -> Option<&Issue> {
        self.issues.get(&id)
    }

    #[must_use]
    pub fn contains(&self, id: IssueId) -> bool {
        self.issues.contains_key(&id)
    }

    #[must_use]
    pub fn ids(&self) -> BTreeSet<IssueId> {
        self.issues.keys().copied().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.issues.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    /// Issues in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Issue> + '_ {
        self.issues.values()
    }

    #[must_use]
    pub fn into_issues(self) -> Vec<Issue> {
        self.issues.into_values().collect()
    }

    #[must_use]
    pub fn last_fetched(&self) -> f64 {
        self.last_fetched
    }

    pub fn set_last_fetched(&mut self, seconds: f64) {
        self.last_fetched = seconds;
    }

    /// Stamp the archive with the current time.
    pub fn touch(&mut self) {
        self.last_fetched = now_epoch_seconds();
    }
}

/// Current time as floating-point seconds since the epoch.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn now_epoch_seconds() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}
