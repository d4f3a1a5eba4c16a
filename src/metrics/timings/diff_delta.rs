//! Diff delta: a weighted per-developer measure of meaningful change.
//!
//! Weights by operation: add 1.0, update 0.75, delete 0.25, move 0.1.
//! Low-value files (lock files, minified output, binary assets, vendored
//! trees) are skipped entirely.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::diff::{detect_moved_lines, is_meaningful_line, VelocitySkipList};
use crate::engine::week::{day_key, week_key};
use crate::git::CommitRecord;
use crate::metrics::Metric;

/// Operation weights.
pub const WEIGHT_ADD: f64 = 1.0;
/// Weight of an in-place edit.
pub const WEIGHT_UPDATE: f64 = 0.75;
/// Weight of a deletion.
pub const WEIGHT_DELETE: f64 = 0.25;
/// Weight of a moved line.
pub const WEIGHT_MOVE: f64 = 0.1;

#[derive(Debug, Default)]
struct WeekState {
    diff_delta: f64,
    lines_added: u64,
    lines_updated: u64,
    lines_deleted: u64,
    lines_moved: u64,
    commits: u64,
    files_changed: BTreeSet<String>,
    active_days: BTreeSet<String>,
}

#[derive(Debug, Default)]
struct DeveloperState {
    total_diff_delta: f64,
    total_commits: u64,
    weekly: BTreeMap<String, WeekState>,
}

/// Per-developer weighted change scoring.
#[derive(Debug)]
pub struct DiffDelta {
    developers: BTreeMap<String, DeveloperState>,
    skip: VelocitySkipList,
    update_overlap_factor: f64,
}

impl Default for DiffDelta {
    fn default() -> Self {
        Self::new(0.8)
    }
}

/// One developer-week of velocity figures.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WeeklyVelocity {
    /// Weighted change score for the week.
    pub diff_delta: f64,
    /// Meaningful added lines.
    pub lines_added: u64,
    /// Estimated in-place edits.
    pub lines_updated: u64,
    /// Meaningful deleted lines.
    pub lines_deleted: u64,
    /// Moved lines.
    pub lines_moved: u64,
    /// Commits in the week.
    pub commits: u64,
    /// Distinct files touched.
    pub files_changed: u64,
    /// Distinct days with commits.
    pub active_days: u64,
    /// `diff_delta / max(1, active_days)`.
    pub velocity_per_day: f64,
}

/// One developer's velocity record.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DeveloperVelocity {
    /// Weighted change score across the bucket.
    pub total_diff_delta: f64,
    /// Commits across the bucket.
    pub total_commits: u64,
    /// Weekly breakdown keyed by Monday date.
    pub weekly_velocity: BTreeMap<String, WeeklyVelocity>,
}

/// Snapshot: `canonical email → velocity record`.
pub type DiffDeltaSnapshot = BTreeMap<String, DeveloperVelocity>;

impl DiffDelta {
    /// Creates the metric with a configurable update-overlap factor (the
    /// fraction of the add/delete overlap treated as an edit).
    pub fn new(update_overlap_factor: f64) -> Self {
        Self {
            developers: BTreeMap::new(),
            skip: VelocitySkipList::new(),
            update_overlap_factor,
        }
    }
}

impl Metric for DiffDelta {
    type Snapshot = DiffDeltaSnapshot;

    fn process_commit(&mut self, commit: &CommitRecord) {
        let developer = commit.author_key();
        let week = week_key(commit.committer_date);
        let day = day_key(commit.committer_date);

        let state = self.developers.entry(developer).or_default();
        state.total_commits += 1;
        {
            let week_state = state.weekly.entry(week.clone()).or_default();
            week_state.commits += 1;
            week_state.active_days.insert(day);
        }

        let mut commit_delta = 0.0;

        for mf in &commit.modified_files {
            let path = mf.path().to_string();
            let week_state = state.weekly.entry(week.clone()).or_default();
            week_state.files_changed.insert(path.clone());

            if self.skip.matches(&path) {
                continue;
            }

            let added = &mf.diff_parsed.added;
            let deleted = &mf.diff_parsed.deleted;
            let moved = detect_moved_lines(added, deleted);

            let mut meaningful_adds = 0u64;
            for (_, text) in added {
                if !moved.contains(text.trim()) && is_meaningful_line(text, &path) {
                    meaningful_adds += 1;
                    commit_delta += WEIGHT_ADD;
                }
            }

            let mut meaningful_deletes = 0u64;
            for (_, text) in deleted {
                if !moved.contains(text.trim()) && is_meaningful_line(text, &path) {
                    meaningful_deletes += 1;
                    commit_delta += WEIGHT_DELETE;
                }
            }

            let moves = added
                .iter()
                .filter(|(_, text)| moved.contains(text.trim()))
                .count() as u64;
            let overlap = (added.len() as u64)
                .saturating_sub(moves)
                .min((deleted.len() as u64).saturating_sub(moves));
            let updates = (overlap as f64 * self.update_overlap_factor) as u64;

            if updates > 0 {
                commit_delta += updates as f64 * WEIGHT_UPDATE;
                week_state.lines_updated += updates;
            }
            if moves > 0 {
                commit_delta += moves as f64 * WEIGHT_MOVE;
                week_state.lines_moved += moves;
            }

            week_state.lines_added += meaningful_adds;
            week_state.lines_deleted += meaningful_deletes;
        }

        let week_state = state.weekly.entry(week).or_default();
        week_state.diff_delta += commit_delta;
        state.total_diff_delta += commit_delta;
    }

    fn snapshot(&self) -> DiffDeltaSnapshot {
        self.developers
            .iter()
            .map(|(dev, state)| {
                let weekly_velocity = state
                    .weekly
                    .iter()
                    .map(|(week, w)| {
                        let active_days = w.active_days.len() as u64;
                        (
                            week.clone(),
                            WeeklyVelocity {
                                diff_delta: w.diff_delta,
                                lines_added: w.lines_added,
                                lines_updated: w.lines_updated,
                                lines_deleted: w.lines_deleted,
                                lines_moved: w.lines_moved,
                                commits: w.commits,
                                files_changed: w.files_changed.len() as u64,
                                active_days,
                                velocity_per_day: w.diff_delta / active_days.max(1) as f64,
                            },
                        )
                    })
                    .collect();
                (
                    dev.clone(),
                    DeveloperVelocity {
                        total_diff_delta: state.total_diff_delta,
                        total_commits: state.total_commits,
                        weekly_velocity,
                    },
                )
            })
            .collect()
    }
}

impl DiffDelta {
    /// Merges chunk snapshots field-wise; `velocity_per_day` is
    /// recomputed after the merge.
    pub fn merge(parts: &[DiffDeltaSnapshot]) -> DiffDeltaSnapshot {
        let mut merged: DiffDeltaSnapshot = BTreeMap::new();
        for part in parts {
            for (dev, velocity) in part {
                let entry = merged.entry(dev.clone()).or_default();
                entry.total_diff_delta += velocity.total_diff_delta;
                entry.total_commits += velocity.total_commits;
                for (week, weekly) in &velocity.weekly_velocity {
                    let target = entry.weekly_velocity.entry(week.clone()).or_default();
                    target.diff_delta += weekly.diff_delta;
                    target.lines_added += weekly.lines_added;
                    target.lines_updated += weekly.lines_updated;
                    target.lines_deleted += weekly.lines_deleted;
                    target.lines_moved += weekly.lines_moved;
                    target.commits += weekly.commits;
                    target.files_changed += weekly.files_changed;
                    target.active_days += weekly.active_days;
                }
            }
        }
        for velocity in merged.values_mut() {
            for weekly in velocity.weekly_velocity.values_mut() {
                weekly.velocity_per_day = weekly.diff_delta / weekly.active_days.max(1) as f64;
            }
        }
        merged
    }
}
