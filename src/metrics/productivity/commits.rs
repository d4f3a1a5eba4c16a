//! Distinct-commit counts per file.

use std::collections::BTreeMap;

use crate::git::CommitRecord;
use crate::metrics::{Metric, RenameMap};

/// Counts how many commits touched each file, rename-aware.
#[derive(Debug, Default)]
pub struct CommitsCount {
    commits_by_file: BTreeMap<String, u64>,
    renamed: RenameMap,
}

/// Snapshot: `file → commit count`.
pub type CommitsCountSnapshot = BTreeMap<String, u64>;

impl Metric for CommitsCount {
    type Snapshot = CommitsCountSnapshot;

    fn process_commit(&mut self, commit: &CommitRecord) {
        for mf in &commit.modified_files {
            let path = self.renamed.resolve(mf);
            *self.commits_by_file.entry(path).or_insert(0) += 1;
        }
    }

    fn snapshot(&self) -> CommitsCountSnapshot {
        self.commits_by_file.clone()
    }
}

impl CommitsCount {
    /// Merges chunk snapshots element-wise.
    pub fn merge(parts: &[CommitsCountSnapshot]) -> CommitsCountSnapshot {
        let mut merged = CommitsCountSnapshot::new();
        for part in parts {
            for (path, count) in part {
                *merged.entry(path.clone()).or_insert(0) += count;
            }
        }
        merged
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::git::ChangeType;
    use crate::metrics::test_support::{commit_at, commit_with_files, modified_file};

    #[test]
    fn counts_per_file() {
        let mut metric = CommitsCount::default();
        metric.process_commit(&commit_with_files("a@x", "2024-03-11 10:00:00", &["a.py"]));
        metric.process_commit(&commit_with_files("b@x", "2024-03-11 11:00:00", &["a.py", "b.py"]));
        let snap = metric.snapshot();
        assert_eq!(snap.get("a.py"), Some(&2));
        assert_eq!(snap.get("b.py"), Some(&1));
    }

    #[test]
    fn rename_collapses_to_new_path() {
        let mut metric = CommitsCount::default();
        metric.process_commit(&commit_with_files("a@x", "2024-03-11 10:00:00", &["old.py"]));

        let mut renamed = modified_file("new.py", &["x = 1"], &[]);
        renamed.old_path = Some("old.py".to_string());
        renamed.change_type = ChangeType::Rename;
        metric.process_commit(&commit_at("a@x", "2024-03-11 11:00:00", vec![renamed]));

        // Later touches of the old path count against the new one.
        let mut again = modified_file("old.py", &["y = 2"], &[]);
        again.new_path = Some("old.py".to_string());
        metric.process_commit(&commit_at("a@x", "2024-03-11 12:00:00", vec![again]));

        let snap = metric.snapshot();
        // Counts accumulated under the old path stay attached to it.
        assert_eq!(snap.get("old.py"), Some(&1));
        assert_eq!(snap.get("new.py"), Some(&2));
    }

    #[test]
    fn merge_sums_counts() {
        let mut a = CommitsCountSnapshot::new();
        a.insert("a.py".to_string(), 2);
        let mut b = CommitsCountSnapshot::new();
        b.insert("a.py".to_string(), 3);
        b.insert("b.py".to_string(), 1);
        let merged = CommitsCount::merge(&[a, b]);
        assert_eq!(merged.get("a.py"), Some(&5));
        assert_eq!(merged.get("b.py"), Some(&1));
    }
}
