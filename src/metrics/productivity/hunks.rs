//! Diff hunk counts per file.

use std::collections::BTreeMap;

use crate::diff::count_hunks;
use crate::git::CommitRecord;
use crate::metrics::{Metric, RenameMap};

/// Records per commit, per file, the number of contiguous `+`/`-` runs.
#[derive(Debug, Default)]
pub struct Hunks {
    hunks_by_file: BTreeMap<String, Vec<u64>>,
    renamed: RenameMap,
}

/// Snapshot: `file → median hunk count` across the commits touching it.
pub type HunksSnapshot = BTreeMap<String, f64>;

impl Metric for Hunks {
    type Snapshot = HunksSnapshot;

    fn process_commit(&mut self, commit: &CommitRecord) {
        for mf in &commit.modified_files {
            let path = self.renamed.resolve(mf);
            if mf.diff.is_empty() {
                continue;
            }
            let hunks = count_hunks(&mf.diff);
            self.hunks_by_file.entry(path).or_default().push(hunks);
        }
    }

    fn snapshot(&self) -> HunksSnapshot {
        self.hunks_by_file
            .iter()
            .filter(|(_, counts)| !counts.is_empty())
            .map(|(path, counts)| (path.clone(), median(counts)))
            .collect()
    }
}

impl Hunks {
    /// Merges chunk snapshots by per-file sum of the chunk medians (the
    /// concatenation approximation).
    pub fn merge(parts: &[HunksSnapshot]) -> HunksSnapshot {
        let mut merged = HunksSnapshot::new();
        for part in parts {
            for (path, value) in part {
                *merged.entry(path.clone()).or_insert(0.0) += value;
            }
        }
        merged
    }
}

fn median(values: &[u64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let n = sorted.len();
    if n == 0 {
        return 0.0;
    }
    if n % 2 == 1 {
        sorted[n / 2] as f64
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) as f64 / 2.0
    }
}
