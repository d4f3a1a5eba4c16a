//! Code provenance: classifying added lines by the age of the code they
//! replace.

use std::collections::{BTreeMap, HashMap};

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::diff::is_meaningful_line;
use crate::diff::language::is_code_file;
use crate::engine::week::week_key;
use crate::git::CommitRecord;
use crate::metrics::Metric;

/// Age boundary between recent and old code.
pub const RECENT_DAYS: i64 = 30;
/// Age boundary between old and legacy code.
pub const OLD_DAYS: i64 = 365;
/// Synthetic age stamped on pre-existing lines when a file is first seen.
///
/// The engine never runs a real blame, so lines that predate the run are
/// assumed 60 days old; on very young repositories this biases touched
/// lines toward `old_code`.
pub const BOOTSTRAP_AGE_DAYS: i64 = 60;

/// Raw counts for one developer-week.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProvenanceCounts {
    /// Lines landing in previously empty slots.
    pub new_code_lines: u64,
    /// Lines replacing code at most 30 days old.
    pub recent_code_lines: u64,
    /// Lines replacing code at most a year old.
    pub old_code_lines: u64,
    /// Lines replacing code older than a year.
    pub legacy_code_lines: u64,
    /// Sum of the four.
    pub total_lines: u64,
}

/// Counts plus derived percentages for one developer-week.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct ProvenanceWeek {
    /// Raw counts.
    #[serde(flatten)]
    pub counts: ProvenanceCounts,
    /// `new / total` percent.
    pub new_code_percent: f64,
    /// `recent / total` percent.
    pub recent_code_percent: f64,
    /// `old / total` percent.
    pub old_code_percent: f64,
    /// `legacy / total` percent.
    pub legacy_code_percent: f64,
}

/// One developer's provenance record.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DeveloperProvenance {
    /// Weekly breakdown keyed by Monday date.
    pub weekly_provenance: BTreeMap<String, ProvenanceWeek>,
}

/// Snapshot: `canonical email → provenance record`.
pub type CodeProvenanceSnapshot = BTreeMap<String, DeveloperProvenance>;

/// Classifies each added line in a code file by the age of the previous
/// occupant of its `(file, line_no)` slot.
#[derive(Debug, Default)]
pub struct CodeProvenance {
    developers: BTreeMap<String, BTreeMap<String, ProvenanceCounts>>,
    line_history: HashMap<String, HashMap<u32, NaiveDateTime>>,
}

impl Metric for CodeProvenance {
    type Snapshot = CodeProvenanceSnapshot;

    fn process_commit(&mut self, commit: &CommitRecord) {
        let developer = commit.author_key();
        let week = week_key(commit.committer_date);
        let now = commit.committer_date;

        for mf in &commit.modified_files {
            let path = mf.path().to_string();
            if !is_code_file(&path) {
                continue;
            }

            if !self.line_history.contains_key(&path) {
                self.bootstrap_file(&path, mf, now);
            }

            let slots = self.line_history.entry(path.clone()).or_default();

            for (line_no, _) in &mf.diff_parsed.deleted {
                slots.remove(line_no);
            }

            for (line_no, text) in &mf.diff_parsed.added {
                if !is_meaningful_line(text, &path) {
                    continue;
                }

                let counts = self
                    .developers
                    .entry(developer.clone())
                    .or_default()
                    .entry(week.clone())
                    .or_default();

                match slots.get(line_no) {
                    None => counts.new_code_lines += 1,
                    Some(last_modified) => {
                        let age = now - *last_modified;
                        if age <= Duration::days(RECENT_DAYS) {
                            counts.recent_code_lines += 1;
                        } else if age <= Duration::days(OLD_DAYS) {
                            counts.old_code_lines += 1;
                        } else {
                            counts.legacy_code_lines += 1;
                        }
                    }
                }
                counts.total_lines += 1;

                slots.insert(*line_no, now);
            }
        }
    }

    fn snapshot(&self) -> CodeProvenanceSnapshot {
        self.developers
            .iter()
            .map(|(dev, weeks)| {
                let weekly_provenance = weeks
                    .iter()
                    .filter(|(_, counts)| counts.total_lines > 0)
                    .map(|(week, counts)| (week.clone(), with_percentages(*counts)))
                    .collect();
                (
                    dev.clone(),
                    DeveloperProvenance { weekly_provenance },
                )
            })
            .collect()
    }
}

impl CodeProvenance {
    /// Stamps every meaningful pre-existing line with the synthetic
    /// bootstrap age on first sight of the file.
    fn bootstrap_file(&mut self, path: &str, mf: &crate::git::ModifiedFile, now: NaiveDateTime) {
        let slots = self.line_history.entry(path.to_string()).or_default();
        if let Some(before) = mf.source_code_before.as_deref() {
            let stamp = now - Duration::days(BOOTSTRAP_AGE_DAYS);
            for (idx, line) in before.lines().enumerate() {
                if is_meaningful_line(line, path) {
                    slots.insert(idx as u32 + 1, stamp);
                }
            }
        }
    }

    /// Merges chunk snapshots: raw counts sum, percentages recomputed.
    pub fn merge(parts: &[CodeProvenanceSnapshot]) -> CodeProvenanceSnapshot {
        let mut raw: BTreeMap<String, BTreeMap<String, ProvenanceCounts>> = BTreeMap::new();
        for part in parts {
            for (dev, record) in part {
                let weeks = raw.entry(dev.clone()).or_default();
                for (week, week_record) in &record.weekly_provenance {
                    let counts = weeks.entry(week.clone()).or_default();
                    counts.new_code_lines += week_record.counts.new_code_lines;
                    counts.recent_code_lines += week_record.counts.recent_code_lines;
                    counts.old_code_lines += week_record.counts.old_code_lines;
                    counts.legacy_code_lines += week_record.counts.legacy_code_lines;
                    counts.total_lines += week_record.counts.total_lines;
                }
            }
        }

        raw.into_iter()
            .map(|(dev, weeks)| {
                let weekly_provenance = weeks
                    .into_iter()
                    .filter(|(_, counts)| counts.total_lines > 0)
                    .map(|(week, counts)| (week, with_percentages(counts)))
                    .collect();
                (dev, DeveloperProvenance { weekly_provenance })
            })
            .collect()
    }
}

fn with_percentages(counts: ProvenanceCounts) -> ProvenanceWeek {
    let total = counts.total_lines.max(1) as f64;
    ProvenanceWeek {
        counts,
        new_code_percent: counts.new_code_lines as f64 / total * 100.0,
        recent_code_percent: counts.recent_code_lines as f64 / total * 100.0,
        old_code_percent: counts.old_code_lines as f64 / total * 100.0,
        legacy_code_percent: counts.legacy_code_lines as f64 / total * 100.0,
    }
}
