//! Bug-fix work share from commit-message heuristics.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::RegexSet;
use serde::{Deserialize, Serialize};

use crate::git::CommitRecord;
use crate::metrics::{Metric, RenameMap};

static BUG_PATTERNS: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r"(?i)fix(?:e[ds])?(?:\s+for)?\s+(?:bug|issue|problem)",
        r"(?i)bug\s+fix(?:e[ds])?",
        r"(?i)resolv(?:e[ds]?|ing)\s+(?:bug|issue|problem)",
        r"\#\d+",
        r"(?i)bug\s+\#?\d+",
        r"(?i)fix(?:e[ds])?\s+\#\d+",
        r"(?i)patch(?:e[ds])?",
        r"(?i)defect",
        r"(?i)debug",
    ])
    .unwrap()
});

/// True iff the message matches any bug-fix pattern.
pub fn is_bug_fix_message(message: &str) -> bool {
    BUG_PATTERNS.is_match(message)
}

/// Tracks bug-fixing vs total line changes per file.
#[derive(Debug, Default)]
pub struct Bugs {
    bug_lines_by_file: BTreeMap<String, u64>,
    total_lines_by_file: BTreeMap<String, u64>,
    renamed: RenameMap,
}

/// Snapshot of bug-fix work share.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BugsSnapshot {
    /// `file → percentage of line changes made by bug-fix commits`.
    pub bug_work_percent_by_file: BTreeMap<String, f64>,
    /// Percentage across the whole bucket.
    pub overall_bug_work_percent: f64,
    /// Line changes attributed to bug-fix commits.
    pub total_bug_lines: u64,
    /// All line changes.
    pub total_lines: u64,
}

impl Metric for Bugs {
    type Snapshot = BugsSnapshot;

    fn process_commit(&mut self, commit: &CommitRecord) {
        let is_bug_fix = is_bug_fix_message(&commit.msg);
        for mf in &commit.modified_files {
            let path = self.renamed.resolve(mf);
            let changed = mf.added_lines + mf.deleted_lines;
            *self.total_lines_by_file.entry(path.clone()).or_insert(0) += changed;
            if is_bug_fix {
                *self.bug_lines_by_file.entry(path).or_insert(0) += changed;
            }
        }
    }

    fn snapshot(&self) -> BugsSnapshot {
        let mut by_file = BTreeMap::new();
        for (path, total) in &self.total_lines_by_file {
            let percent = if *total > 0 {
                let bug = self.bug_lines_by_file.get(path).copied().unwrap_or(0);
                bug as f64 / *total as f64 * 100.0
            } else {
                0.0
            };
            by_file.insert(path.clone(), percent);
        }

        let total_bug_lines: u64 = self.bug_lines_by_file.values().sum();
        let total_lines: u64 = self.total_lines_by_file.values().sum();

        BugsSnapshot {
            bug_work_percent_by_file: by_file,
            overall_bug_work_percent: if total_lines > 0 {
                total_bug_lines as f64 / total_lines as f64 * 100.0
            } else {
                0.0
            },
            total_bug_lines,
            total_lines,
        }
    }
}

impl BugsSnapshot {
    /// Merges chunk snapshots: line totals sum; per-file percentages are
    /// the average of the chunk percentages; the overall percentage is
    /// recomputed from the merged totals.
    pub fn merge(parts: &[BugsSnapshot]) -> BugsSnapshot {
        let mut percent_samples: BTreeMap<String, Vec<f64>> = BTreeMap::new();
        let mut total_bug_lines = 0u64;
        let mut total_lines = 0u64;

        for part in parts {
            total_bug_lines += part.total_bug_lines;
            total_lines += part.total_lines;
            for (path, percent) in &part.bug_work_percent_by_file {
                percent_samples.entry(path.clone()).or_default().push(*percent);
            }
        }

        let bug_work_percent_by_file = percent_samples
            .into_iter()
            .map(|(path, samples)| {
                let mean = samples.iter().sum::<f64>() / samples.len() as f64;
                (path, mean)
            })
            .collect();

        BugsSnapshot {
            bug_work_percent_by_file,
            overall_bug_work_percent: if total_lines > 0 {
                total_bug_lines as f64 / total_lines as f64 * 100.0
            } else {
                0.0
            },
            total_bug_lines,
            total_lines,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::metrics::test_support::{commit_with_message, modified_file};

    // ── message classification ─────────────────────────────────

    #[test]
    fn bug_messages_match() {
        assert!(is_bug_fix_message("Fix bug #42"));
        assert!(is_bug_fix_message("fixed issue with parser"));
        assert!(is_bug_fix_message("Resolving problem in scheduler"));
        assert!(is_bug_fix_message("bug fix"));
        assert!(is_bug_fix_message("patched the leak"));
        assert!(is_bug_fix_message("refs #1234"));
        assert!(is_bug_fix_message("debug session leftovers"));
    }

    #[test]
    fn ordinary_messages_do_not_match() {
        assert!(!is_bug_fix_message("Add user settings page"));
        assert!(!is_bug_fix_message("Refactor storage layer"));
        assert!(!is_bug_fix_message("Bump dependency versions"));
    }

    // ── accumulation ───────────────────────────────────────────

    #[test]
    fn bug_commit_attributes_all_lines() {
        let mut metric = Bugs::default();
        metric.process_commit(&commit_with_message(
            "a@x",
            "2024-03-11 10:00:00",
            "Fix bug #42",
            vec![modified_file("b.py", &["1", "2", "3", "4", "5"], &["x", "y"])],
        ));
        let snap = metric.snapshot();
        assert_eq!(snap.total_bug_lines, 7);
        assert_eq!(snap.total_lines, 7);
        assert!((snap.overall_bug_work_percent - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn non_bug_commit_contributes_zero_bug_lines() {
        let mut metric = Bugs::default();
        metric.process_commit(&commit_with_message(
            "a@x",
            "2024-03-11 10:00:00",
            "Add shiny feature",
            vec![modified_file("b.py", &["1", "2"], &[])],
        ));
        let snap = metric.snapshot();
        assert_eq!(snap.total_bug_lines, 0);
        assert_eq!(snap.total_lines, 2);
        assert!((snap.overall_bug_work_percent).abs() < f64::EPSILON);
    }

    #[test]
    fn merge_recomputes_overall_from_totals() {
        let a = BugsSnapshot {
            bug_work_percent_by_file: BTreeMap::from([("f".to_string(), 100.0)]),
            overall_bug_work_percent: 100.0,
            total_bug_lines: 10,
            total_lines: 10,
        };
        let b = BugsSnapshot {
            bug_work_percent_by_file: BTreeMap::from([("f".to_string(), 0.0)]),
            overall_bug_work_percent: 0.0,
            total_bug_lines: 0,
            total_lines: 30,
        };
        let merged = BugsSnapshot::merge(&[a, b]);
        assert_eq!(merged.total_bug_lines, 10);
        assert_eq!(merged.total_lines, 40);
        assert!((merged.overall_bug_work_percent - 25.0).abs() < 1e-9);
        assert!((merged.bug_work_percent_by_file["f"] - 50.0).abs() < 1e-9);
    }
}
