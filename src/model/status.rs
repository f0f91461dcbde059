//! Issue status codes and metadata snapshots.
//!
//! A [`MetadataSnapshot`] is the cheap `id → status` view of the whole
//! tracker. Status codes are kept exactly as received so that a bad code is
//! reported when the snapshot is classified, not when it is read.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Stable identity of an issue on the tracker.
pub type IssueId = u64;

/// Issue status values as exported by the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusCode {
    Open,
    Closed,
    Pending,
    Languishing,
}

impl StatusCode {
    /// All known statuses in code order.
    pub const ALL: [Self; 4] = [Self::Open, Self::Closed, Self::Pending, Self::Languishing];

    /// Numeric code used in the metadata file and the CSV export.
    #[must_use]
    pub const fn code(self) -> i64 {
        match self {
            Self::Open => 1,
            Self::Closed => 2,
            Self::Pending => 3,
            Self::Languishing => 4,
        }
    }

    #[must_use]
    pub const fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(Self::Open),
            2 => Some(Self::Closed),
            3 => Some(Self::Pending),
            4 => Some(Self::Languishing),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
            Self::Pending => "pending",
            Self::Languishing => "languishing",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The remote universe at one point in time: issue id → raw status code.
///
/// Serialized as a JSON object keyed by the decimal issue id, which is the
/// on-disk metadata format.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetadataSnapshot {
    entries: BTreeMap<IssueId, i64>,
}

impl MetadataSnapshot {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a raw status code for an issue, replacing any previous one.
    pub fn insert(&mut self, id: IssueId, code: i64) {
        self.entries.insert(id, code);
    }

    /// Record a known status for an issue.
    pub fn set_status(&mut self, id: IssueId, status: StatusCode) {
        self.insert(id, status.code());
    }

    /// Builder-style variant of [`set_status`](Self::set_status).
    #[must_use]
    pub fn with_status(mut self, id: IssueId, status: StatusCode) -> Self {
        self.set_status(id, status);
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over `(id, raw code)` pairs in id order.
    pub fn iter(&self) -> impl Iterator<Item = (IssueId, i64)> + '_ {
        self.entries.iter().map(|(id, code)| (*id, *code))
    }

    /// Partition the snapshot by status.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidStatus`] for the first entry whose code is not
    /// one of the four known statuses. No partial classification is returned.
    pub fn classify(&self) -> Result<ClassifiedSnapshot> {
        let mut classified = ClassifiedSnapshot::default();
        for (id, code) in self.iter() {
            let status = StatusCode::from_code(code).ok_or(Error::InvalidStatus { id, code })?;
            classified.all.insert(id);
            classified.by_status_mut(status).insert(id);
        }
        Ok(classified)
    }
}

impl FromIterator<(IssueId, StatusCode)> for MetadataSnapshot {
    fn from_iter<T: IntoIterator<Item = (IssueId, StatusCode)>>(iter: T) -> Self {
        let mut snapshot = Self::new();
        for (id, status) in iter {
            snapshot.set_status(id, status);
        }
        snapshot
    }
}

/// Five-way partition of a snapshot.
///
/// The four status sets are pairwise disjoint and their union is `all`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassifiedSnapshot {
    pub all: BTreeSet<IssueId>,
    pub open: BTreeSet<IssueId>,
    pub closed: BTreeSet<IssueId>,
    pub pending: BTreeSet<IssueId>,
    pub languishing: BTreeSet<IssueId>,
}

impl ClassifiedSnapshot {
    /// The ids carrying `status`.
    #[must_use]
    pub fn by_status(&self, status: StatusCode) -> &BTreeSet<IssueId> {
        match status {
            StatusCode::Open => &self.open,
            StatusCode::Closed => &self.closed,
            StatusCode::Pending => &self.pending,
            StatusCode::Languishing => &self.languishing,
        }
    }

    fn by_status_mut(&mut self, status: StatusCode) -> &mut BTreeSet<IssueId> {
        match status {
            StatusCode::Open => &mut self.open,
            StatusCode::Closed => &mut self.closed,
            StatusCode::Pending => &mut self.pending,
            StatusCode::Languishing => &mut self.languishing,
        }
    }
}
