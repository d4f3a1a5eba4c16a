//! Metric accumulators and their merge algebras.
//!
//! Every metric is a small state machine over the commit stream: it
//! consumes [`CommitRecord`]s, yields one serializable snapshot, and
//! exposes a static `merge` over snapshots. Merges are monoidal — the
//! default snapshot is the identity and merging is associative — which is
//! what makes date-range chunking safe (see [`crate::engine::chunks`]).

pub mod productivity;
pub mod quality;
pub mod timings;

#[cfg(test)]
pub(crate) mod test_support;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::git::{ChangeType, CommitRecord, ModifiedFile};

pub use productivity::{
    change_set::{ChangeSet, ChangeSetSnapshot},
    commits::{CommitsCount, CommitsCountSnapshot},
    contributors::{Contributors, ContributorsSnapshot},
    hunks::{Hunks, HunksSnapshot},
    lines::{Lines, LinesSnapshot},
};
pub use quality::{
    bugs::{Bugs, BugsSnapshot},
    code_churn::{CodeChurn, CodeChurnSnapshot},
    code_movement::{CodeMovement, CodeMovementSnapshot},
    meaningful_code::{MeaningfulCode, MeaningfulCodeSnapshot},
    test_doc::{QualityCornerstones, QualityCornerstonesSnapshot},
};
pub use timings::{
    code_domain::{CodeDomain, CodeDomainSnapshot},
    code_provenance::{CodeProvenance, CodeProvenanceSnapshot},
    developer_hours::{DeveloperHours, DeveloperHoursSnapshot},
    diff_delta::{DiffDelta, DiffDeltaSnapshot},
    time_analysis::{TimeAnalysis, TimeAnalysisSnapshot},
};

/// A stateful observer of the commit stream.
pub trait Metric {
    /// The serializable result type, also the merge carrier.
    type Snapshot;

    /// Consumes one commit. Commits arrive in non-decreasing
    /// committer-date order within a traversal.
    fn process_commit(&mut self, commit: &CommitRecord);

    /// Produces the metric's current result. Idempotent.
    fn snapshot(&self) -> Self::Snapshot;
}

/// Tunables shared by the accumulators.
#[derive(Debug, Clone)]
pub struct MetricConfig {
    /// Fraction of the add/delete overlap treated as an in-place edit by
    /// the diff-delta metric.
    pub update_overlap_factor: f64,
}

impl Default for MetricConfig {
    fn default() -> Self {
        Self {
            update_overlap_factor: 0.8,
        }
    }
}

/// File-identity redirect that survives renames within one run.
///
/// Counts accumulated under the old path stay attached to it; from the
/// rename onward both paths collapse to the new one.
#[derive(Debug, Default, Clone)]
pub struct RenameMap {
    redirects: HashMap<String, String>,
}

impl RenameMap {
    /// Resolves the identity path for a modified file, recording a new
    /// redirect when the file was renamed in this commit.
    pub fn resolve(&mut self, mf: &ModifiedFile) -> String {
        let raw = mf.path().to_string();
        let path = self.redirects.get(&raw).cloned().unwrap_or(raw);
        if mf.change_type == ChangeType::Rename {
            if let Some(old) = &mf.old_path {
                self.redirects.insert(old.clone(), path.clone());
            }
        }
        path
    }
}

/// Rounds to two decimal places.
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// The full family of accumulators for one bucket (overall or one week).
pub struct MetricSet {
    /// Files-per-commit distribution.
    pub change_set: ChangeSet,
    /// Commits touching each file.
    pub commits_count: CommitsCount,
    /// Contributor counts and line shares per file.
    pub contributors: Contributors,
    /// Diff hunk counts per file.
    pub hunks: Hunks,
    /// Added/removed line statistics per file.
    pub lines: Lines,
    /// Total/net churn and same-author rewrite tracking.
    pub code_churn: CodeChurn,
    /// Bug-fix work share from commit messages.
    pub bugs: Bugs,
    /// Cross-file moves and copy-paste within commits.
    pub code_movement: CodeMovement,
    /// Test and documentation coverage.
    pub test_doc: QualityCornerstones,
    /// Meaningful-line accounting with unrealistic-commit filtering.
    pub meaningful_code: MeaningfulCode,
    /// Weighted per-developer change score.
    pub diff_delta: DiffDelta,
    /// Code-age classification of added lines.
    pub code_provenance: CodeProvenance,
    /// Session-based working-hours estimation.
    pub developer_hours: DeveloperHours,
    /// File-domain classification of changes.
    pub code_domain: CodeDomain,
    /// Cross-commit temporal behavior analysis.
    pub time_analysis: TimeAnalysis,
}

impl MetricSet {
    /// Creates a fresh set of accumulators.
    pub fn new(config: &MetricConfig) -> Self {
        Self {
            change_set: ChangeSet::default(),
            commits_count: CommitsCount::default(),
            contributors: Contributors::default(),
            hunks: Hunks::default(),
            lines: Lines::default(),
            code_churn: CodeChurn::default(),
            bugs: Bugs::default(),
            code_movement: CodeMovement::default(),
            test_doc: QualityCornerstones::default(),
            meaningful_code: MeaningfulCode::default(),
            diff_delta: DiffDelta::new(config.update_overlap_factor),
            code_provenance: CodeProvenance::default(),
            developer_hours: DeveloperHours::default(),
            code_domain: CodeDomain::default(),
            time_analysis: TimeAnalysis::default(),
        }
    }

    /// Dispatches one commit to every accumulator.
    pub fn process_commit(&mut self, commit: &CommitRecord) {
        self.change_set.process_commit(commit);
        self.commits_count.process_commit(commit);
        self.contributors.process_commit(commit);
        self.hunks.process_commit(commit);
        self.lines.process_commit(commit);
        self.code_churn.process_commit(commit);
        self.bugs.process_commit(commit);
        self.code_movement.process_commit(commit);
        self.test_doc.process_commit(commit);
        self.meaningful_code.process_commit(commit);
        self.diff_delta.process_commit(commit);
        self.code_provenance.process_commit(commit);
        self.developer_hours.process_commit(commit);
        self.code_domain.process_commit(commit);
        self.time_analysis.process_commit(commit);
    }

    /// Snapshots every accumulator into the output shape.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            productivity: ProductivitySnapshot {
                change_set: self.change_set.snapshot(),
                commits_count: self.commits_count.snapshot(),
                contributors_count: self.contributors.snapshot(),
                contributors_experience: self.contributors.experience_snapshot(),
                hunks_count: self.hunks.snapshot(),
                lines_count: self.lines.snapshot(),
            },
            quality: QualitySnapshotGroup {
                code_churn: self.code_churn.snapshot(),
                bugs: self.bugs.snapshot(),
                code_movement: self.code_movement.snapshot(),
                test_doc_pct: self.test_doc.snapshot(),
                meaningful_code: self.meaningful_code.snapshot(),
            },
            timings: TimingsSnapshot {
                diff_delta: self.diff_delta.snapshot(),
                code_provenance: self.code_provenance.snapshot(),
                developer_hours: self.developer_hours.snapshot(),
                code_domain: self.code_domain.snapshot(),
                comprehensive_time_analysis: self.time_analysis.snapshot(),
            },
        }
    }
}

/// Productivity metric results.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProductivitySnapshot {
    /// Files-per-commit distribution.
    pub change_set: ChangeSetSnapshot,
    /// Commits touching each file.
    pub commits_count: CommitsCountSnapshot,
    /// Contributor totals and minor-contributor counts per file.
    pub contributors_count: ContributorsSnapshot,
    /// Distinct author count per file.
    pub contributors_experience: std::collections::BTreeMap<String, u64>,
    /// Median hunk count per file.
    pub hunks_count: HunksSnapshot,
    /// Added/removed line statistics per file.
    pub lines_count: LinesSnapshot,
}

/// Quality metric results.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct QualitySnapshotGroup {
    /// Total/net churn statistics.
    pub code_churn: CodeChurnSnapshot,
    /// Bug-fix work share.
    pub bugs: BugsSnapshot,
    /// Moved and copy-pasted line counts.
    pub code_movement: CodeMovementSnapshot,
    /// Test/doc coverage.
    pub test_doc_pct: QualityCornerstonesSnapshot,
    /// Meaningful-code accounting.
    pub meaningful_code: MeaningfulCodeSnapshot,
}

/// Timing metric results.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TimingsSnapshot {
    /// Weighted per-developer change scores.
    pub diff_delta: DiffDeltaSnapshot,
    /// Code-age classification per developer.
    pub code_provenance: CodeProvenanceSnapshot,
    /// Estimated working hours per developer.
    pub developer_hours: DeveloperHoursSnapshot,
    /// Domain distribution per developer.
    pub code_domain: CodeDomainSnapshot,
    /// Temporal behavior analysis per developer.
    pub comprehensive_time_analysis: TimeAnalysisSnapshot,
}

/// One bucket's complete metric results, shaped for the output artifact.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MetricsSnapshot {
    /// Productivity metrics.
    pub productivity: ProductivitySnapshot,
    /// Quality metrics.
    pub quality: QualitySnapshotGroup,
    /// Timing metrics.
    pub timings: TimingsSnapshot,
}

impl MetricsSnapshot {
    /// Merges chunk snapshots by delegating to each metric's algebra.
    pub fn merge(parts: &[MetricsSnapshot]) -> MetricsSnapshot {
        MetricsSnapshot {
            productivity: ProductivitySnapshot {
                change_set: ChangeSetSnapshot::merge(
                    &parts.iter().map(|p| p.productivity.change_set.clone()).collect::<Vec<_>>(),
                ),
                commits_count: CommitsCount::merge(
                    &parts.iter().map(|p| p.productivity.commits_count.clone()).collect::<Vec<_>>(),
                ),
                contributors_count: ContributorsSnapshot::merge(
                    &parts
                        .iter()
                        .map(|p| p.productivity.contributors_count.clone())
                        .collect::<Vec<_>>(),
                ),
                contributors_experience: Contributors::merge_experience(
                    &parts
                        .iter()
                        .map(|p| p.productivity.contributors_experience.clone())
                        .collect::<Vec<_>>(),
                ),
                hunks_count: Hunks::merge(
                    &parts.iter().map(|p| p.productivity.hunks_count.clone()).collect::<Vec<_>>(),
                ),
                lines_count: LinesSnapshot::merge(
                    &parts.iter().map(|p| p.productivity.lines_count.clone()).collect::<Vec<_>>(),
                ),
            },
            quality: QualitySnapshotGroup {
                code_churn: CodeChurnSnapshot::merge(
                    &parts.iter().map(|p| p.quality.code_churn.clone()).collect::<Vec<_>>(),
                ),
                bugs: BugsSnapshot::merge(
                    &parts.iter().map(|p| p.quality.bugs.clone()).collect::<Vec<_>>(),
                ),
                code_movement: CodeMovementSnapshot::merge(
                    &parts.iter().map(|p| p.quality.code_movement.clone()).collect::<Vec<_>>(),
                ),
                test_doc_pct: QualityCornerstonesSnapshot::merge(
                    &parts.iter().map(|p| p.quality.test_doc_pct.clone()).collect::<Vec<_>>(),
                ),
                meaningful_code: MeaningfulCodeSnapshot::merge(
                    &parts.iter().map(|p| p.quality.meaningful_code.clone()).collect::<Vec<_>>(),
                ),
            },
            timings: TimingsSnapshot {
                diff_delta: DiffDelta::merge(
                    &parts.iter().map(|p| p.timings.diff_delta.clone()).collect::<Vec<_>>(),
                ),
                code_provenance: CodeProvenance::merge(
                    &parts.iter().map(|p| p.timings.code_provenance.clone()).collect::<Vec<_>>(),
                ),
                developer_hours: DeveloperHours::merge(
                    &parts.iter().map(|p| p.timings.developer_hours.clone()).collect::<Vec<_>>(),
                ),
                code_domain: CodeDomain::merge(
                    &parts.iter().map(|p| p.timings.code_domain.clone()).collect::<Vec<_>>(),
                ),
                comprehensive_time_analysis: TimeAnalysis::merge(
                    &parts
                        .iter()
                        .map(|p| p.timings.comprehensive_time_analysis.clone())
                        .collect::<Vec<_>>(),
                ),
            },
        }
    }
}
