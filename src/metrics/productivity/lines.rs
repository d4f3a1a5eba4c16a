//! Added/removed line statistics per file, with no-op tracking.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::diff::is_noop_line;
use crate::git::{ChangeType, CommitRecord};
use crate::metrics::{Metric, RenameMap};

/// Per-file running aggregate of one per-commit series.
#[derive(Debug, Clone, Copy, Default)]
struct SeriesAgg {
    total: u64,
    max: u64,
    count: u64,
}

impl SeriesAgg {
    fn push(&mut self, value: u64) {
        self.total += value;
        self.max = self.max.max(value);
        self.count += 1;
    }

    fn avg(&self) -> u64 {
        if self.count == 0 {
            0
        } else {
            ((self.total as f64) / (self.count as f64)).round() as u64
        }
    }
}

/// Tracks per-commit added/removed line counts per file, plus the subset
/// that is blank or whitespace-only.
#[derive(Debug, Default)]
pub struct Lines {
    added: BTreeMap<String, SeriesAgg>,
    removed: BTreeMap<String, SeriesAgg>,
    noop_added: BTreeMap<String, SeriesAgg>,
    noop_removed: BTreeMap<String, SeriesAgg>,
    renamed: RenameMap,
}

/// total/max/avg maps for one series.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SeriesSnapshot {
    /// `file → summed count`.
    pub total: BTreeMap<String, u64>,
    /// `file → largest per-commit count`.
    pub max: BTreeMap<String, u64>,
    /// `file → rounded mean per-commit count`.
    pub avg: BTreeMap<String, u64>,
}

/// Snapshot of the line statistics.
///
/// `samples` carries the per-file commit counts so merged averages stay
/// count-weighted and exact.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LinesSnapshot {
    /// Added-line statistics.
    pub added: SeriesSnapshot,
    /// Removed-line statistics.
    pub removed: SeriesSnapshot,
    /// Blank/whitespace added-line statistics.
    pub noop_added: SeriesSnapshot,
    /// Blank/whitespace removed-line statistics.
    pub noop_removed: SeriesSnapshot,
    /// `file → number of contributing commits`.
    pub samples: BTreeMap<String, u64>,
}

impl Metric for Lines {
    type Snapshot = LinesSnapshot;

    fn process_commit(&mut self, commit: &CommitRecord) {
        for mf in &commit.modified_files {
            let path = self.renamed.resolve(mf);

            let mut noop_added = 0u64;
            let mut noop_removed = 0u64;
            if matches!(
                mf.change_type,
                ChangeType::Add | ChangeType::Delete | ChangeType::Modify | ChangeType::Rename
            ) {
                noop_added = mf
                    .diff_parsed
                    .added
                    .iter()
                    .filter(|(_, text)| is_noop_line(text))
                    .count() as u64;
                noop_removed = mf
                    .diff_parsed
                    .deleted
                    .iter()
                    .filter(|(_, text)| is_noop_line(text))
                    .count() as u64;
            }

            self.added.entry(path.clone()).or_default().push(mf.added_lines);
            self.removed
                .entry(path.clone())
                .or_default()
                .push(mf.deleted_lines);
            self.noop_added
                .entry(path.clone())
                .or_default()
                .push(noop_added);
            self.noop_removed.entry(path).or_default().push(noop_removed);
        }
    }

    fn snapshot(&self) -> LinesSnapshot {
        LinesSnapshot {
            added: series_snapshot(&self.added),
            removed: series_snapshot(&self.removed),
            noop_added: series_snapshot(&self.noop_added),
            noop_removed: series_snapshot(&self.noop_removed),
            samples: self
                .added
                .iter()
                .map(|(path, agg)| (path.clone(), agg.count))
                .collect(),
        }
    }
}

fn series_snapshot(series: &BTreeMap<String, SeriesAgg>) -> SeriesSnapshot {
    let mut snap = SeriesSnapshot::default();
    for (path, agg) in series {
        if agg.count == 0 {
            continue;
        }
        snap.total.insert(path.clone(), agg.total);
        snap.max.insert(path.clone(), agg.max);
        snap.avg.insert(path.clone(), agg.avg());
    }
    snap
}

impl LinesSnapshot {
    /// Merges chunk snapshots: totals sum, maxima take the max, averages
    /// are recomputed weighted by each chunk's per-file sample count.
    pub fn merge(parts: &[LinesSnapshot]) -> LinesSnapshot {
        let mut samples: BTreeMap<String, u64> = BTreeMap::new();
        for part in parts {
            for (path, count) in &part.samples {
                *samples.entry(path.clone()).or_insert(0) += count;
            }
        }

        let merge_series = |pick: fn(&LinesSnapshot) -> &SeriesSnapshot| -> SeriesSnapshot {
            let mut total: BTreeMap<String, u64> = BTreeMap::new();
            let mut max: BTreeMap<String, u64> = BTreeMap::new();
            let mut weighted: BTreeMap<String, f64> = BTreeMap::new();
            let mut weights: BTreeMap<String, u64> = BTreeMap::new();

            for part in parts {
                let series = pick(part);
                for (path, value) in &series.total {
                    *total.entry(path.clone()).or_insert(0) += value;
                }
                for (path, value) in &series.max {
                    let entry = max.entry(path.clone()).or_insert(0);
                    *entry = (*entry).max(*value);
                }
                for (path, value) in &series.avg {
                    let weight = part.samples.get(path).copied().unwrap_or(1);
                    *weighted.entry(path.clone()).or_insert(0.0) += *value as f64 * weight as f64;
                    *weights.entry(path.clone()).or_insert(0) += weight;
                }
            }

            let avg = weighted
                .into_iter()
                .map(|(path, sum)| {
                    let weight = weights.get(&path).copied().unwrap_or(1).max(1);
                    let mean = (sum / weight as f64).round() as u64;
                    (path, mean)
                })
                .collect();

            SeriesSnapshot { total, max, avg }
        };

        LinesSnapshot {
            added: merge_series(|p| &p.added),
            removed: merge_series(|p| &p.removed),
            noop_added: merge_series(|p| &p.noop_added),
            noop_removed: merge_series(|p| &p.noop_removed),
            samples,
        }
    }
}
