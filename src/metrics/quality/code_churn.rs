//! Total/net code churn, plus same-author rewrite ("true churn") tracking.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::git::CommitRecord;
use crate::metrics::Metric;

/// count/max/avg over one per-file value distribution.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChurnStats {
    /// Sum of per-file values.
    pub count: i64,
    /// Largest per-file value.
    pub max: i64,
    /// Rounded mean of per-file values.
    pub avg: i64,
}

/// Contribution/churn pair for true-churn accounting.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContributionChurn {
    /// Lines added into previously unoccupied or other-author slots.
    pub contribution: u64,
    /// Lines replacing the same author's earlier lines within the run.
    pub churn: u64,
}

/// True-churn results.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrueChurnSnapshot {
    /// Run-wide totals.
    pub overall: ContributionChurn,
    /// Per canonical author email.
    pub per_author: BTreeMap<String, ContributionChurn>,
    /// Per file path.
    pub per_file: BTreeMap<String, ContributionChurn>,
}

/// Snapshot of the churn metric.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CodeChurnSnapshot {
    /// `added + deleted` distribution over files.
    pub total_churn: ChurnStats,
    /// `added - deleted` distribution over files.
    pub net_churn: ChurnStats,
    /// Aggregate added/removed line counts.
    pub added_removed: AddedRemoved,
    /// Same-author rewrite accounting.
    pub true_churn: TrueChurnSnapshot,
    /// Number of distinct files, carried for count-weighted merge.
    pub file_count: u64,
}

/// Aggregate added/removed pair.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AddedRemoved {
    /// Total added lines.
    pub added: u64,
    /// Total removed lines.
    pub removed: u64,
}

#[derive(Debug, Clone)]
struct LineSlot {
    author: String,
}

/// Tracks per-file churn and the line-history table behind true churn.
#[derive(Debug, Default)]
pub struct CodeChurn {
    churn_by_file: BTreeMap<String, u64>,
    added_by_file: BTreeMap<String, u64>,
    removed_by_file: BTreeMap<String, u64>,
    line_history: HashMap<String, HashMap<u32, LineSlot>>,
    true_overall: ContributionChurn,
    true_per_author: BTreeMap<String, ContributionChurn>,
    true_per_file: BTreeMap<String, ContributionChurn>,
}

impl Metric for CodeChurn {
    type Snapshot = CodeChurnSnapshot;

    fn process_commit(&mut self, commit: &CommitRecord) {
        let author = commit.author_key();
        for mf in &commit.modified_files {
            let path = mf.path().to_string();

            *self.churn_by_file.entry(path.clone()).or_insert(0) +=
                mf.added_lines + mf.deleted_lines;
            *self.added_by_file.entry(path.clone()).or_insert(0) += mf.added_lines;
            *self.removed_by_file.entry(path.clone()).or_insert(0) += mf.deleted_lines;

            if !mf.diff.is_empty() {
                self.track_true_churn(&path, &author, mf);
            }
        }
    }

    fn snapshot(&self) -> CodeChurnSnapshot {
        let totals: Vec<i64> = self.churn_by_file.values().map(|v| *v as i64).collect();
        let nets: Vec<i64> = self
            .churn_by_file
            .keys()
            .map(|path| {
                let added = self.added_by_file.get(path).copied().unwrap_or(0) as i64;
                let removed = self.removed_by_file.get(path).copied().unwrap_or(0) as i64;
                added - removed
            })
            .collect();

        CodeChurnSnapshot {
            total_churn: stats_of(&totals),
            net_churn: stats_of(&nets),
            added_removed: AddedRemoved {
                added: self.added_by_file.values().sum(),
                removed: self.removed_by_file.values().sum(),
            },
            true_churn: TrueChurnSnapshot {
                overall: self.true_overall,
                per_author: self.true_per_author.clone(),
                per_file: self.true_per_file.clone(),
            },
            file_count: self.churn_by_file.len() as u64,
        }
    }
}

impl CodeChurn {
    /// Walks the parsed diff: a deletion evicts the slot it occupied
    /// (counting churn when the evicted line was the same author's); an
    /// addition claims its slot and counts as contribution.
    fn track_true_churn(&mut self, path: &str, author: &str, mf: &crate::git::ModifiedFile) {
        let slots = self.line_history.entry(path.to_string()).or_default();

        let mut contribution = 0u64;
        let mut churn = 0u64;

        for (line_no, _) in &mf.diff_parsed.deleted {
            if let Some(slot) = slots.remove(line_no) {
                if slot.author == author {
                    churn += 1;
                }
            }
        }
        for (line_no, _) in &mf.diff_parsed.added {
            slots.insert(
                *line_no,
                LineSlot {
                    author: author.to_string(),
                },
            );
            contribution += 1;
        }

        self.true_overall.contribution += contribution;
        self.true_overall.churn += churn;
        let per_author = self.true_per_author.entry(author.to_string()).or_default();
        per_author.contribution += contribution;
        per_author.churn += churn;
        let per_file = self.true_per_file.entry(path.to_string()).or_default();
        per_file.contribution += contribution;
        per_file.churn += churn;
    }
}

fn stats_of(values: &[i64]) -> ChurnStats {
    if values.is_empty() {
        return ChurnStats::default();
    }
    let count: i64 = values.iter().sum();
    let max = values.iter().copied().max().unwrap_or(0);
    let avg = (count as f64 / values.len() as f64).round() as i64;
    ChurnStats { count, max, avg }
}

impl CodeChurnSnapshot {
    /// Merges chunk snapshots: counts sum, maxima take the max, averages
    /// are recomputed weighted by file counts, true churn sums field-wise.
    pub fn merge(parts: &[CodeChurnSnapshot]) -> CodeChurnSnapshot {
        let file_count: u64 = parts.iter().map(|p| p.file_count).sum();

        let merge_stats = |pick: fn(&CodeChurnSnapshot) -> ChurnStats| -> ChurnStats {
            let count: i64 = parts.iter().map(|p| pick(p).count).sum();
            let max = parts.iter().map(|p| pick(p).max).max().unwrap_or(0);
            let weighted: f64 = parts
                .iter()
                .map(|p| pick(p).avg as f64 * p.file_count.max(1) as f64)
                .sum();
            let weights: u64 = parts.iter().map(|p| p.file_count.max(1)).sum();
            ChurnStats {
                count,
                max,
                avg: if weights > 0 {
                    (weighted / weights as f64).round() as i64
                } else {
                    0
                },
            }
        };

        let mut true_churn = TrueChurnSnapshot::default();
        for part in parts {
            true_churn.overall.contribution += part.true_churn.overall.contribution;
            true_churn.overall.churn += part.true_churn.overall.churn;
            for (author, pair) in &part.true_churn.per_author {
                let entry = true_churn.per_author.entry(author.clone()).or_default();
                entry.contribution += pair.contribution;
                entry.churn += pair.churn;
            }
            for (path, pair) in &part.true_churn.per_file {
                let entry = true_churn.per_file.entry(path.clone()).or_default();
                entry.contribution += pair.contribution;
                entry.churn += pair.churn;
            }
        }

        CodeChurnSnapshot {
            total_churn: merge_stats(|p| p.total_churn),
            net_churn: merge_stats(|p| p.net_churn),
            added_removed: AddedRemoved {
                added: parts.iter().map(|p| p.added_removed.added).sum(),
                removed: parts.iter().map(|p| p.added_removed.removed).sum(),
            },
            true_churn,
            file_count,
        }
    }
}
