//! Run reports and phases for sync operations.

use std::fmt;
use std::time::Duration;

use serde::Serialize;

use super::diff::DiffReport;

/// A named sync operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Rebuild,
    Check,
    Refetch,
    Fix,
    Update,
}

impl Operation {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Rebuild => "rebuild",
            Self::Check => "check",
            Self::Refetch => "refetch",
            Self::Fix => "fix",
            Self::Update => "update",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pipeline phase of a single run. Phases only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Idle,
    ListFetched,
    Diffed,
    Fetching,
    Merging,
    Persisted,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::ListFetched => "list_fetched",
            Self::Diffed => "diffed",
            Self::Fetching => "fetching",
            Self::Merging => "merging",
            Self::Persisted => "persisted",
        };
        f.write_str(name)
    }
}

/// What a finished operation did.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub operation: Operation,
    /// Ids new to the remote since the stored snapshot.
    pub newly_added: usize,
    /// Ids chosen for (re)fetch.
    pub selected: usize,
    /// Ids actually fetched; less than `selected` on partial failure.
    pub fetched: usize,
    /// Issues in the archive file written (0 when nothing was written).
    pub written: usize,
    pub elapsed_secs: f64,
    /// Whether any file on disk was replaced.
    pub persisted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff: Option<DiffReport>,
}

impl RunReport {
    #[must_use]
    pub fn new(operation: Operation) -> Self {
        Self {
            operation,
            newly_added: 0,
            selected: 0,
            fetched: 0,
            written: 0,
            elapsed_secs: 0.0,
            persisted: false,
            diff: None,
        }
    }

    /// Selected ids that produced no record.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.selected.saturating_sub(self.fetched)
    }
}

/// Format a duration as `HH:MM:SS`.
#[must_use]
pub fn format_elapsed(elapsed: Duration) -> String {
    let total = elapsed.as_secs();
    format!(
        "{:02}:{:02}:{:02}",
        total / 3600,
        (total % 3600) / 60,
        total % 60
    )
}
