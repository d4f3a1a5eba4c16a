//! Meaningful-line accounting with unrealistic-commit filtering.

use std::collections::{BTreeMap, HashMap};

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::diff::{is_substantive_source_line, looks_auto_generated, AutoGeneratedKind};
use crate::git::CommitRecord;
use crate::metrics::quality::test_doc::{is_doc_file, is_test_file, QualityCornerstones};
use crate::metrics::Metric;

/// A single commit changing more lines than this is unrealistic.
pub const LARGE_COMMIT_LINES: u64 = 5_000;

/// A follow-up commit within this window changing more than
/// [`RAPID_COMMIT_LINES`] lines is unrealistic.
pub const RAPID_COMMIT_WINDOW_MINUTES: i64 = 10;

/// Line threshold for the rapid-commit rule.
pub const RAPID_COMMIT_LINES: u64 = 1_000;

/// Commits rejected as machine-scale rather than human-scale work.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UnrealisticCommits {
    /// Single commits above [`LARGE_COMMIT_LINES`].
    pub large_commits: u64,
    /// Large follow-ups within the rapid window.
    pub rapid_large_commits: u64,
    /// Sum of the two.
    pub total: u64,
    /// Added+deleted lines of the rejected commits.
    pub skipped_lines: u64,
}

/// Auto-generated line counters.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct AutoGenerated {
    /// Long alphanumeric runs dominating the line.
    pub long_sequences: u64,
    /// `____` / `====` / `----` rulers.
    pub repeated_chars: u64,
    /// Very long lines with few distinct characters.
    pub repetitive_patterns: u64,
    /// Sum of the three.
    pub total: u64,
    /// `total / total-lines` as a percentage.
    pub percent: f64,
}

/// Totals of the meaningful-code metric.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct MeaningfulTotals {
    /// Distinct files observed (from the coverage base).
    pub files: u64,
    /// Lines observed (from the coverage base).
    pub lines: u64,
    /// Substantive lines in non-test, non-doc files.
    pub meaningful_lines: u64,
    /// `meaningful_lines / lines` as a percentage.
    pub meaningful_percent: f64,
}

/// Snapshot of the meaningful-code metric.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MeaningfulCodeSnapshot {
    /// Totals.
    pub total: MeaningfulTotals,
    /// Quality score carried from the coverage base.
    pub quality_score: f64,
    /// Rejected-commit counters.
    pub unrealistic_commits: UnrealisticCommits,
    /// Auto-generated line counters.
    pub auto_generated: AutoGenerated,
}

#[derive(Debug, Clone, Default)]
struct FileMeta {
    is_test: bool,
    is_doc: bool,
}

/// Wraps [`QualityCornerstones`] and counts substantive lines of code
/// files, excluding auto-generated content and unrealistic commits.
#[derive(Debug, Default)]
pub struct MeaningfulCode {
    base: QualityCornerstones,
    file_meta: BTreeMap<String, FileMeta>,
    meaningful_total_lines: u64,
    commit_times: HashMap<String, NaiveDateTime>,
    unrealistic: UnrealisticCommits,
    auto_long: u64,
    auto_repeated: u64,
    auto_repetitive: u64,
}

impl Metric for MeaningfulCode {
    type Snapshot = MeaningfulCodeSnapshot;

    fn process_commit(&mut self, commit: &CommitRecord) {
        if let Some(kind) = self.classify_unrealistic(commit) {
            debug!(hash = %commit.hash, kind, "skipping unrealistic commit");
            return;
        }

        self.base.process_commit(commit);

        for mf in &commit.modified_files {
            let path = mf.path().to_string();
            let meta = self
                .file_meta
                .entry(path.clone())
                .or_insert_with(|| FileMeta {
                    is_test: is_test_file(&path),
                    is_doc: is_doc_file(&path),
                })
                .clone();
            if meta.is_test || meta.is_doc {
                continue;
            }

            let Some(source) = mf.source_code.as_deref() else {
                continue;
            };
            for line in source.lines() {
                if let Some(kind) = looks_auto_generated(line) {
                    match kind {
                        AutoGeneratedKind::LongSequence => self.auto_long += 1,
                        AutoGeneratedKind::RepeatedChars => self.auto_repeated += 1,
                        AutoGeneratedKind::RepetitivePattern => self.auto_repetitive += 1,
                    }
                    continue;
                }
                if is_substantive_source_line(line, &path) {
                    self.meaningful_total_lines += 1;
                }
            }
        }
    }

    fn snapshot(&self) -> MeaningfulCodeSnapshot {
        let base = self.base.snapshot();
        let total_lines = base.total.lines;
        let auto_total = self.auto_long + self.auto_repeated + self.auto_repetitive;

        MeaningfulCodeSnapshot {
            total: MeaningfulTotals {
                files: base.total.files,
                lines: total_lines,
                meaningful_lines: self.meaningful_total_lines,
                meaningful_percent: percent(self.meaningful_total_lines, total_lines),
            },
            quality_score: base.quality_score,
            unrealistic_commits: self.unrealistic,
            auto_generated: AutoGenerated {
                long_sequences: self.auto_long,
                repeated_chars: self.auto_repeated,
                repetitive_patterns: self.auto_repetitive,
                total: auto_total,
                percent: percent(auto_total, total_lines),
            },
        }
    }
}

impl MeaningfulCode {
    /// Applies the large-commit and rapid-large-commit rules; rejected
    /// commits keep their lines in `skipped_lines` and leave no other
    /// trace. The per-author clock only advances on accepted commits.
    fn classify_unrealistic(&mut self, commit: &CommitRecord) -> Option<&'static str> {
        let total_changes = commit.total_changed_lines();

        if total_changes > LARGE_COMMIT_LINES {
            self.unrealistic.large_commits += 1;
            self.unrealistic.total += 1;
            self.unrealistic.skipped_lines += total_changes;
            return Some("large_commit");
        }

        let author = commit.author_key();
        if let Some(last) = self.commit_times.get(&author) {
            let gap = commit.committer_date - *last;
            if total_changes > RAPID_COMMIT_LINES
                && gap < Duration::minutes(RAPID_COMMIT_WINDOW_MINUTES)
            {
                self.unrealistic.rapid_large_commits += 1;
                self.unrealistic.total += 1;
                self.unrealistic.skipped_lines += total_changes;
                return Some("rapid_large_commit");
            }
        }

        self.commit_times.insert(author, commit.committer_date);
        None
    }
}

fn percent(part: u64, whole: u64) -> f64 {
    if whole > 0 {
        part as f64 / whole as f64 * 100.0
    } else {
        0.0
    }
}

impl MeaningfulCodeSnapshot {
    /// Merges chunk snapshots: counters sum, percentages recomputed.
    pub fn merge(parts: &[MeaningfulCodeSnapshot]) -> MeaningfulCodeSnapshot {
        let files: u64 = parts.iter().map(|p| p.total.files).sum();
        let lines: u64 = parts.iter().map(|p| p.total.lines).sum();
        let meaningful: u64 = parts.iter().map(|p| p.total.meaningful_lines).sum();

        let auto_long: u64 = parts.iter().map(|p| p.auto_generated.long_sequences).sum();
        let auto_repeated: u64 = parts.iter().map(|p| p.auto_generated.repeated_chars).sum();
        let auto_repetitive: u64 = parts
            .iter()
            .map(|p| p.auto_generated.repetitive_patterns)
            .sum();
        let auto_total = auto_long + auto_repeated + auto_repetitive;

        // Weighted mean of the quality scores, weighted by line volume.
        let score_weight: f64 = parts.iter().map(|p| p.total.lines as f64).sum();
        let quality_score = if score_weight > 0.0 {
            parts
                .iter()
                .map(|p| p.quality_score * p.total.lines as f64)
                .sum::<f64>()
                / score_weight
        } else {
            0.0
        };

        MeaningfulCodeSnapshot {
            total: MeaningfulTotals {
                files,
                lines,
                meaningful_lines: meaningful,
                meaningful_percent: percent(meaningful, lines),
            },
            quality_score,
            unrealistic_commits: UnrealisticCommits {
                large_commits: parts.iter().map(|p| p.unrealistic_commits.large_commits).sum(),
                rapid_large_commits: parts
                    .iter()
                    .map(|p| p.unrealistic_commits.rapid_large_commits)
                    .sum(),
                total: parts.iter().map(|p| p.unrealistic_commits.total).sum(),
                skipped_lines: parts.iter().map(|p| p.unrealistic_commits.skipped_lines).sum(),
            },
            auto_generated: AutoGenerated {
                long_sequences: auto_long,
                repeated_chars: auto_repeated,
                repetitive_patterns: auto_repetitive,
                total: auto_total,
                percent: percent(auto_total, lines),
            },
        }
    }
}
