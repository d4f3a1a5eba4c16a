//! Cross-file moves and copy-paste detection within single commits.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::git::{ChangeType, CommitRecord};
use crate::metrics::{Metric, RenameMap};

/// Lines at or under this stripped length are too generic to match on.
const MIN_MATCH_LEN: usize = 5;

/// Detects identical line texts that disappear from one file and appear
/// in another within the same commit (moves), and added lines duplicated
/// with no matching deletion (copy-paste).
#[derive(Debug, Default)]
pub struct CodeMovement {
    renamed: RenameMap,
    total_changed_lines: u64,
    moved_lines: u64,
    copy_pasted_lines: u64,
}

/// Snapshot of movement counts and their share of changed lines.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CodeMovementSnapshot {
    /// Lines that moved between files.
    pub moved_lines_count: u64,
    /// Extra copies of duplicated added lines.
    pub copy_pasted_lines_count: u64,
    /// All considered changed lines.
    pub total_changed_lines: u64,
    /// `moved / total` as a percentage.
    pub moved_lines_percent: f64,
    /// `copy_pasted / total` as a percentage.
    pub copy_pasted_lines_percent: f64,
}

impl Metric for CodeMovement {
    type Snapshot = CodeMovementSnapshot;

    fn process_commit(&mut self, commit: &CommitRecord) {
        // (file, stripped text) for this commit only.
        let mut removed: Vec<(String, String)> = Vec::new();
        let mut added: Vec<(String, String)> = Vec::new();

        for mf in &commit.modified_files {
            let path = self.renamed.resolve(mf);
            if mf.change_type == ChangeType::Rename {
                continue;
            }

            for (_, text) in &mf.diff_parsed.deleted {
                let stripped = text.trim();
                if stripped.len() > MIN_MATCH_LEN {
                    removed.push((path.clone(), stripped.to_string()));
                }
            }
            for (_, text) in &mf.diff_parsed.added {
                let stripped = text.trim();
                if stripped.len() > MIN_MATCH_LEN {
                    added.push((path.clone(), stripped.to_string()));
                }
            }
        }

        self.total_changed_lines += (removed.len() + added.len()) as u64;

        // Pair up removed/added texts across different files.
        let mut matched_added = vec![false; added.len()];
        for (r_file, r_text) in &removed {
            for (a_idx, (a_file, a_text)) in added.iter().enumerate() {
                if matched_added[a_idx] {
                    continue;
                }
                if r_text == a_text && r_file != a_file {
                    self.moved_lines += 1;
                    matched_added[a_idx] = true;
                    break;
                }
            }
        }

        // Duplicated additions with no deletion counterpart anywhere in
        // the commit: the extra copies are copy-paste.
        let mut added_counts: HashMap<&str, u64> = HashMap::new();
        for (_, text) in &added {
            *added_counts.entry(text.as_str()).or_insert(0) += 1;
        }
        for (text, count) in added_counts {
            if count > 1 && !removed.iter().any(|(_, r)| r == text) {
                self.copy_pasted_lines += count - 1;
            }
        }
    }

    fn snapshot(&self) -> CodeMovementSnapshot {
        let (moved_pct, copied_pct) = if self.total_changed_lines > 0 {
            (
                self.moved_lines as f64 / self.total_changed_lines as f64 * 100.0,
                self.copy_pasted_lines as f64 / self.total_changed_lines as f64 * 100.0,
            )
        } else {
            (0.0, 0.0)
        };

        CodeMovementSnapshot {
            moved_lines_count: self.moved_lines,
            copy_pasted_lines_count: self.copy_pasted_lines,
            total_changed_lines: self.total_changed_lines,
            moved_lines_percent: moved_pct,
            copy_pasted_lines_percent: copied_pct,
        }
    }
}

impl CodeMovementSnapshot {
    /// Merges chunk snapshots: counts sum, percentages recomputed.
    pub fn merge(parts: &[CodeMovementSnapshot]) -> CodeMovementSnapshot {
        let moved: u64 = parts.iter().map(|p| p.moved_lines_count).sum();
        let copied: u64 = parts.iter().map(|p| p.copy_pasted_lines_count).sum();
        let total: u64 = parts.iter().map(|p| p.total_changed_lines).sum();

        let (moved_pct, copied_pct) = if total > 0 {
            (
                moved as f64 / total as f64 * 100.0,
                copied as f64 / total as f64 * 100.0,
            )
        } else {
            (0.0, 0.0)
        };

        CodeMovementSnapshot {
            moved_lines_count: moved,
            copy_pasted_lines_count: copied,
            total_changed_lines: total,
            moved_lines_percent: moved_pct,
            copy_pasted_lines_percent: copied_pct,
        }
    }
}
