//! Files-per-commit distribution.

use serde::{Deserialize, Serialize};

use crate::git::CommitRecord;
use crate::metrics::Metric;

/// Tracks how many files each commit touches.
#[derive(Debug, Default)]
pub struct ChangeSet {
    max: u64,
    sum: u64,
    commits: u64,
}

/// Snapshot: maximum and average files per commit.
///
/// `commits` carries the contributing commit count so that merged
/// averages stay count-weighted and exact.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChangeSetSnapshot {
    /// Largest number of files touched by a single commit.
    pub max: u64,
    /// Mean files per commit.
    pub avg: f64,
    /// Number of commits contributing to `avg`.
    pub commits: u64,
}

impl Metric for ChangeSet {
    type Snapshot = ChangeSetSnapshot;

    fn process_commit(&mut self, commit: &CommitRecord) {
        let count = commit.modified_files.len() as u64;
        self.max = self.max.max(count);
        self.sum += count;
        self.commits += 1;
    }

    fn snapshot(&self) -> ChangeSetSnapshot {
        ChangeSetSnapshot {
            max: self.max,
            avg: if self.commits > 0 {
                self.sum as f64 / self.commits as f64
            } else {
                0.0
            },
            commits: self.commits,
        }
    }
}

impl ChangeSetSnapshot {
    /// Merges chunk snapshots: max of maxima, count-weighted mean.
    pub fn merge(parts: &[ChangeSetSnapshot]) -> ChangeSetSnapshot {
        let max = parts.iter().map(|p| p.max).max().unwrap_or(0);
        let commits: u64 = parts.iter().map(|p| p.commits).sum();
        let weighted: f64 = parts.iter().map(|p| p.avg * p.commits as f64).sum();
        ChangeSetSnapshot {
            max,
            avg: if commits > 0 {
                weighted / commits as f64
            } else {
                0.0
            },
            commits,
        }
    }
}
