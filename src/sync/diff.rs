//! Metadata diff: which issues need a (re)fetch.
//!
//! Only `Closed` is treated as terminal. A full update refetches every id
//! that was not already closed; an incremental update only fetches ids that
//! are new or have just become closed.

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

use crate::error::Result;
use crate::model::{IssueId, MetadataSnapshot, StatusCode};

/// Summary of how the remote universe moved between two snapshots.
///
/// Purely informational; it does not influence the update set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiffReport {
    /// Ids present in the new snapshot but not the old one.
    pub newly_added: usize,
    pub added_open: usize,
    pub added_closed: usize,
    pub added_pending: usize,
    pub added_languishing: usize,
    /// Previously open ids that are now closed.
    pub open_now_closed: usize,
    /// Previously open ids that are now pending.
    pub open_now_pending: usize,
    /// Previously open ids that are now languishing.
    pub open_now_languishing: usize,
}

impl DiffReport {
    fn added(&self, status: StatusCode) -> usize {
        match status {
            StatusCode::Open => self.added_open,
            StatusCode::Closed => self.added_closed,
            StatusCode::Pending => self.added_pending,
            StatusCode::Languishing => self.added_languishing,
        }
    }
}

impl fmt::Display for DiffReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "1. {} issues newly added.", self.newly_added)?;
        let breakdown: Vec<String> = StatusCode::ALL
            .iter()
            .map(|status| format!("{} {status}", self.added(*status)))
            .collect();
        writeln!(f, "   {}.", breakdown.join(", "))?;
        writeln!(f, "2. {} open issues are now closed.", self.open_now_closed)?;
        writeln!(f, "3. {} open issues are now pending.", self.open_now_pending)?;
        write!(
            f,
            "4. {} open issues are now languishing.",
            self.open_now_languishing
        )
    }
}

/// Result of comparing two snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffOutcome {
    /// Ids selected for (re)fetch.
    pub update_set: BTreeSet<IssueId>,
    pub report: DiffReport,
}

/// Compare `old` against `new` and select the ids to fetch.
///
/// With `full_update` the selection is `new.All − old.Closed`; otherwise it
/// is `newlyAdded ∪ (new.Closed − old.Closed)`. The full selection is always
/// a superset of the incremental one.
///
/// # Errors
///
/// Returns [`crate::error::Error::InvalidStatus`] if either snapshot holds
/// an unknown status code. No partial result is produced.
pub fn compute(
    old: &MetadataSnapshot,
    new: &MetadataSnapshot,
    full_update: bool,
) -> Result<DiffOutcome> {
    let old = old.classify()?;
    let new = new.classify()?;

    let newly_added: BTreeSet<IssueId> = new.all.difference(&old.all).copied().collect();

    let report = DiffReport {
        newly_added: newly_added.len(),
        added_open: newly_added.intersection(&new.open).count(),
        added_closed: newly_added.intersection(&new.closed).count(),
        added_pending: newly_added.intersection(&new.pending).count(),
        added_languishing: newly_added.intersection(&new.languishing).count(),
        open_now_closed: old.open.intersection(&new.closed).count(),
        open_now_pending: old.open.intersection(&new.pending).count(),
        open_now_languishing: old.open.intersection(&new.languishing).count(),
    };

    let update_set = if full_update {
        new.all.difference(&old.closed).copied().collect()
    } else {
        new.closed
            .difference(&old.closed)
            .copied()
            .chain(newly_added)
            .collect()
    };

    Ok(DiffOutcome { update_set, report })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::model::StatusCode::{Closed, Languishing, Open, Pending};

    fn snapshot(entries: &[(IssueId, StatusCode)]) -> MetadataSnapshot {
        entries.iter().copied().collect()
    }

    fn ids(values: &[IssueId]) -> BTreeSet<IssueId> {
        values.iter().copied().collect()
    }

    #[test]
    fn test_diff_against_self_is_empty() {
        let s = snapshot(&[(1, Open), (2, Closed), (3, Pending), (4, Languishing)]);
        let outcome = compute(&s, &s, false).unwrap();

        assert!(outcome.update_set.is_empty());
        assert_eq!(outcome.report, DiffReport::default());
    }

    #[test]
    fn test_full_update_is_superset() {
        let old = snapshot(&[(1, Open), (2, Closed), (3, Pending), (5, Open)]);
        let new = snapshot(&[
            (1, Closed),
            (2, Closed),
            (3, Languishing),
            (4, Open),
            (5, Open),
            (6, Closed),
        ]);

        let full = compute(&old, &new, true).unwrap().update_set;
        let incremental = compute(&old, &new, false).unwrap().update_set;

        assert!(full.is_superset(&incremental));
        assert_eq!(full, ids(&[1, 3, 4, 5, 6]));
        assert_eq!(incremental, ids(&[1, 4, 6]));
    }

    #[test]
    fn test_newly_closed_and_added_policies_agree() {
        let old = snapshot(&[(1, Open)]);
        let new = snapshot(&[(1, Closed), (2, Open)]);

        let full = compute(&old, &new, true).unwrap();
        let incremental = compute(&old, &new, false).unwrap();

        assert_eq!(full.report.newly_added, 1);
        assert_eq!(full.update_set, ids(&[1, 2]));
        assert_eq!(incremental.update_set, ids(&[1, 2]));
    }

    #[test]
    fn test_open_to_pending_policies_diverge() {
        let old = snapshot(&[(1, Open)]);
        let new = snapshot(&[(1, Pending)]);

        let full = compute(&old, &new, true).unwrap();
        let incremental = compute(&old, &new, false).unwrap();

        assert_eq!(full.report.newly_added, 0);
        assert_eq!(full.update_set, ids(&[1]));
        assert!(incremental.update_set.is_empty());
    }

    #[test]
    fn test_diff_against_empty_selects_everything() {
        let new = snapshot(&[(1, Open), (2, Closed), (3, Pending)]);
        let outcome = compute(&MetadataSnapshot::new(), &new, true).unwrap();

        assert_eq!(outcome.update_set, ids(&[1, 2, 3]));
        assert_eq!(outcome.report.newly_added, 3);
    }

    #[test]
    fn test_report_counts() {
        let old = snapshot(&[(1, Open), (2, Open), (3, Open), (4, Closed)]);
        let new = snapshot(&[
            (1, Closed),
            (2, Pending),
            (3, Languishing),
            (4, Closed),
            (10, Open),
            (11, Open),
            (12, Closed),
        ]);

        let report = compute(&old, &new, false).unwrap().report;
        assert_eq!(
            report,
            DiffReport {
                newly_added: 3,
                added_open: 2,
                added_closed: 1,
                added_pending: 0,
                added_languishing: 0,
                open_now_closed: 1,
                open_now_pending: 1,
                open_now_languishing: 1,
            }
        );
        assert_eq!(
            report.to_string(),
            "1. 3 issues newly added.\n   2 open, 1 closed, 0 pending, 0 languishing.\n\
             2. 1 open issues are now closed.\n3. 1 open issues are now pending.\n\
             4. 1 open issues are now languishing."
        );
    }

    #[test]
    fn test_invalid_status_aborts() {
        let old = snapshot(&[(1, Open)]);
        let mut new = snapshot(&[(1, Open)]);
        new.insert(2, 7);

        assert!(matches!(
            compute(&old, &new, true),
            Err(Error::InvalidStatus { id: 2, code: 7 })
        ));
    }
}
