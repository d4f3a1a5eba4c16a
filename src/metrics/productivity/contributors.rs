//! Contributor counts and line shares per file.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::git::CommitRecord;
use crate::metrics::{Metric, RenameMap};

/// Share below which an author counts as a minor contributor to a file.
pub const MINOR_SHARE: f64 = 0.05;

/// Tracks, per file, the set of authors and each author's changed lines.
#[derive(Debug, Default)]
pub struct Contributors {
    authors_by_file: BTreeMap<String, BTreeSet<String>>,
    lines_by_author: BTreeMap<String, BTreeMap<String, u64>>,
    renamed: RenameMap,
}

/// Snapshot: contributor totals and minor-contributor counts per file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContributorsSnapshot {
    /// `file → distinct contributing authors`.
    pub total: BTreeMap<String, u64>,
    /// `file → authors whose line share is under 5%`.
    pub minor: BTreeMap<String, u64>,
}

impl Metric for Contributors {
    type Snapshot = ContributorsSnapshot;

    fn process_commit(&mut self, commit: &CommitRecord) {
        let author = commit.author_key();
        for mf in &commit.modified_files {
            let path = self.renamed.resolve(mf);
            let lines = mf.added_lines + mf.deleted_lines;

            self.authors_by_file
                .entry(path.clone())
                .or_default()
                .insert(author.clone());
            *self
                .lines_by_author
                .entry(path)
                .or_default()
                .entry(author.clone())
                .or_insert(0) += lines;
        }
    }

    fn snapshot(&self) -> ContributorsSnapshot {
        let mut total = BTreeMap::new();
        let mut minor = BTreeMap::new();

        for (path, contributions) in &self.lines_by_author {
            let file_total: u64 = contributions.values().sum();
            if file_total == 0 {
                continue;
            }
            total.insert(path.clone(), contributions.len() as u64);
            let minors = contributions
                .values()
                .filter(|&&lines| (lines as f64) / (file_total as f64) < MINOR_SHARE)
                .count() as u64;
            minor.insert(path.clone(), minors);
        }

        ContributorsSnapshot { total, minor }
    }
}

impl Contributors {
    /// Distinct author count per file (contributor experience).
    pub fn experience_snapshot(&self) -> BTreeMap<String, u64> {
        self.authors_by_file
            .iter()
            .map(|(path, authors)| (path.clone(), authors.len() as u64))
            .collect()
    }

    /// Merges experience maps by per-file maximum.
    pub fn merge_experience(parts: &[BTreeMap<String, u64>]) -> BTreeMap<String, u64> {
        let mut merged: BTreeMap<String, u64> = BTreeMap::new();
        for part in parts {
            for (path, count) in part {
                let entry = merged.entry(path.clone()).or_insert(0);
                *entry = (*entry).max(*count);
            }
        }
        merged
    }
}

impl ContributorsSnapshot {
    /// Merges chunk snapshots: per-file max for totals (an author may
    /// appear in several chunks), per-file sum for minor counts.
    pub fn merge(parts: &[ContributorsSnapshot]) -> ContributorsSnapshot {
        let mut total: BTreeMap<String, u64> = BTreeMap::new();
        let mut minor: BTreeMap<String, u64> = BTreeMap::new();

        for part in parts {
            for (path, count) in &part.total {
                let entry = total.entry(path.clone()).or_insert(0);
                *entry = (*entry).max(*count);
            }
            for (path, count) in &part.minor {
                *minor.entry(path.clone()).or_insert(0) += count;
            }
        }

        ContributorsSnapshot { total, minor }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::metrics::test_support::{commit_at, modified_file};

    #[test]
    fn minor_contributor_below_five_percent() {
        let mut metric = Contributors::default();
        // alice adds 30 lines, bob adds 1: bob's share is 1/31 < 5%.
        let bulk: Vec<&str> = vec!["hello"; 30];
        metric.process_commit(&commit_at(
            "alice@x",
            "2024-03-11 10:00:00",
            vec![modified_file("a.py", &bulk, &[])],
        ));
        metric.process_commit(&commit_at(
            "bob@x",
            "2024-03-11 11:00:00",
            vec![modified_file("a.py", &["world"], &[])],
        ));

        let snap = metric.snapshot();
        assert_eq!(snap.total.get("a.py"), Some(&2));
        assert_eq!(snap.minor.get("a.py"), Some(&1));
    }

    #[test]
    fn single_author_is_never_minor() {
        let mut metric = Contributors::default();
        metric.process_commit(&commit_at(
            "alice@x",
            "2024-03-11 10:00:00",
            vec![modified_file("a.py", &["x = 1", "y = 2", "z = 3"], &[])],
        ));
        let snap = metric.snapshot();
        assert_eq!(snap.total.get("a.py"), Some(&1));
        assert_eq!(snap.minor.get("a.py"), Some(&0));
    }

    #[test]
    fn email_is_canonicalized() {
        let mut metric = Contributors::default();
        metric.process_commit(&commit_at(
            "Alice@X ",
            "2024-03-11 10:00:00",
            vec![modified_file("a.py", &["x = 1"], &[])],
        ));
        metric.process_commit(&commit_at(
            "alice@x",
            "2024-03-11 11:00:00",
            vec![modified_file("a.py", &["y = 2"], &[])],
        ));
        assert_eq!(metric.snapshot().total.get("a.py"), Some(&1));
    }

    #[test]
    fn merge_total_max_minor_sum() {
        let mut a = ContributorsSnapshot::default();
        a.total.insert("a.py".to_string(), 2);
        a.minor.insert("a.py".to_string(), 1);
        let mut b = ContributorsSnapshot::default();
        b.total.insert("a.py".to_string(), 3);
        b.minor.insert("a.py".to_string(), 1);

        let merged = ContributorsSnapshot::merge(&[a, b]);
        assert_eq!(merged.total.get("a.py"), Some(&3));
        assert_eq!(merged.minor.get("a.py"), Some(&2));
    }

    #[test]
    fn totals_never_below_minor() {
        let mut metric = Contributors::default();
        let ten: Vec<&str> = vec!["line of code"; 30];
        metric.process_commit(&commit_at(
            "alice@x",
            "2024-03-11 10:00:00",
            vec![modified_file("a.py", &ten, &[])],
        ));
        metric.process_commit(&commit_at(
            "bob@x",
            "2024-03-11 11:00:00",
            vec![modified_file("a.py", &["tiny"], &[])],
        ));
        let snap = metric.snapshot();
        for (path, total) in &snap.total {
            assert!(total >= snap.minor.get(path).unwrap_or(&0));
        }
    }
}
