//! Session-based estimation of developer working hours.
//!
//! Commits are clustered into sessions (intra-gap at most two hours),
//! padded for the work before the first and after the last commit, then
//! scaled by commit count and change-rate heuristics and capped.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::diff::is_meaningful_line;
use crate::engine::week::{day_key, week_key};
use crate::git::CommitRecord;
use crate::metrics::{round2, Metric};

/// Maximum gap between commits of one session.
pub const MAX_COMMIT_GAP_HOURS: i64 = 2;
/// Sessions shorter than this are discarded.
pub const MIN_SESSION_MINUTES: i64 = 30;
/// Padding before the first commit of a session.
pub const LEAD_IN_MINUTES: i64 = 30;
/// Padding after the last commit of a session.
pub const LEAD_OUT_MINUTES: i64 = 15;
/// Hard cap on a single session's estimated hours.
pub const SESSION_CAP_HOURS: f64 = 8.0;

#[derive(Debug, Clone)]
struct CommitStamp {
    when: NaiveDateTime,
    changes: u64,
}

/// Estimates hours from per-developer commit timelines.
#[derive(Debug, Default)]
pub struct DeveloperHours {
    timelines: BTreeMap<String, Vec<CommitStamp>>,
}

/// One developer-week of estimated hours.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WeeklyHours {
    /// Estimated hours, rounded to two decimals.
    pub estimated_hours: f64,
    /// Number of sessions starting in the week.
    pub sessions: u64,
    /// Commits in those sessions.
    pub commits: u64,
    /// `estimated_hours / distinct productive days`.
    pub hours_per_day: f64,
    /// Distinct days with session starts; merge carrier, not serialized.
    #[serde(skip)]
    pub productive_days: BTreeSet<String>,
}

/// One developer's estimated-hours record.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DeveloperHoursRecord {
    /// Total estimated hours across the bucket.
    pub total_estimated_hours: f64,
    /// Total sessions across the bucket.
    pub total_sessions: u64,
    /// Weekly breakdown keyed by Monday date.
    pub weekly_hours: BTreeMap<String, WeeklyHours>,
}

/// Snapshot: `canonical email → hours record`.
pub type DeveloperHoursSnapshot = BTreeMap<String, DeveloperHoursRecord>;

impl Metric for DeveloperHours {
    type Snapshot = DeveloperHoursSnapshot;

    fn process_commit(&mut self, commit: &CommitRecord) {
        let meaningful: u64 = commit
            .modified_files
            .iter()
            .flat_map(|mf| {
                let path = mf.path().to_string();
                mf.diff_parsed
                    .added
                    .iter()
                    .chain(mf.diff_parsed.deleted.iter())
                    .filter(move |(_, text)| is_meaningful_line(text, &path))
                    .map(|_| 1u64)
                    .collect::<Vec<_>>()
            })
            .sum();
        let raw = commit.insertions + commit.deletions;

        self.timelines
            .entry(commit.author_key())
            .or_default()
            .push(CommitStamp {
                when: commit.committer_date,
                changes: if meaningful > 0 { meaningful } else { raw },
            });
    }

    fn snapshot(&self) -> DeveloperHoursSnapshot {
        let mut result = DeveloperHoursSnapshot::new();

        for (developer, stamps) in &self.timelines {
            let mut sorted = stamps.clone();
            sorted.sort_by_key(|s| s.when);

            let record = result.entry(developer.clone()).or_default();

            for session in cluster_sessions(&sorted) {
                let duration = session.end - session.start;
                if duration < Duration::minutes(MIN_SESSION_MINUTES) {
                    continue;
                }

                let hours = scale_session_hours(&session, duration);
                let week = week_key(session.start);
                let day = day_key(session.start);

                let weekly = record.weekly_hours.entry(week).or_default();
                weekly.estimated_hours += hours;
                weekly.sessions += 1;
                weekly.commits += session.commit_count;
                weekly.productive_days.insert(day);

                record.total_estimated_hours += hours;
                record.total_sessions += 1;
            }

            for weekly in record.weekly_hours.values_mut() {
                let days = weekly.productive_days.len() as f64;
                weekly.hours_per_day = if days > 0.0 {
                    round2(weekly.estimated_hours / days)
                } else {
                    0.0
                };
                weekly.estimated_hours = round2(weekly.estimated_hours);
            }
            record.total_estimated_hours = round2(record.total_estimated_hours);
        }

        result.retain(|_, record| record.total_sessions > 0);
        result
    }
}

struct Session {
    start: NaiveDateTime,
    end: NaiveDateTime,
    commit_count: u64,
    total_changes: u64,
}

/// Clusters a sorted commit timeline into padded sessions.
fn cluster_sessions(sorted: &[CommitStamp]) -> Vec<Session> {
    let open_session = |stamp: &CommitStamp| Session {
        start: stamp.when - Duration::minutes(LEAD_IN_MINUTES),
        end: stamp.when,
        commit_count: 1,
        total_changes: stamp.changes,
    };

    let mut sessions = Vec::new();
    let mut current: Option<Session> = None;

    for stamp in sorted {
        match current.take() {
            Some(mut session)
                if stamp.when - session.end <= Duration::hours(MAX_COMMIT_GAP_HOURS) =>
            {
                session.end = stamp.when;
                session.commit_count += 1;
                session.total_changes += stamp.changes;
                current = Some(session);
            }
            Some(mut finished) => {
                finished.end += Duration::minutes(LEAD_OUT_MINUTES);
                sessions.push(finished);
                current = Some(open_session(stamp));
            }
            None => current = Some(open_session(stamp)),
        }
    }

    if let Some(mut session) = current {
        session.end += Duration::minutes(LEAD_OUT_MINUTES);
        sessions.push(session);
    }

    sessions
}

/// Applies the session-quality scale factors and the 8-hour cap.
fn scale_session_hours(session: &Session, duration: Duration) -> f64 {
    let mut hours = duration.num_seconds() as f64 / 3600.0;

    if session.commit_count == 1 {
        hours *= 0.75;
    } else if session.commit_count > 10 {
        hours *= 0.9;
    }

    let changes_per_hour = session.total_changes as f64 / hours.max(0.1);
    if changes_per_hour > 1000.0 {
        hours *= 0.8;
    } else if changes_per_hour < 50.0 {
        hours *= 1.1;
    }

    hours.min(SESSION_CAP_HOURS)
}

impl DeveloperHours {
    /// Merges chunk snapshots: hours/sessions/commits sum, productive
    /// days union, `hours_per_day` recomputed.
    pub fn merge(parts: &[DeveloperHoursSnapshot]) -> DeveloperHoursSnapshot {
        let mut merged = DeveloperHoursSnapshot::new();
        for part in parts {
            for (dev, record) in part {
                let target = merged.entry(dev.clone()).or_default();
                target.total_estimated_hours =
                    round2(target.total_estimated_hours + record.total_estimated_hours);
                target.total_sessions += record.total_sessions;
                for (week, weekly) in &record.weekly_hours {
                    let entry = target.weekly_hours.entry(week.clone()).or_default();
                    entry.estimated_hours = round2(entry.estimated_hours + weekly.estimated_hours);
                    entry.sessions += weekly.sessions;
                    entry.commits += weekly.commits;
                    entry
                        .productive_days
                        .extend(weekly.productive_days.iter().cloned());
                }
            }
        }
        for record in merged.values_mut() {
            for weekly in record.weekly_hours.values_mut() {
                let days = weekly.productive_days.len() as f64;
                weekly.hours_per_day = if days > 0.0 {
                    round2(weekly.estimated_hours / days)
                } else {
                    0.0
                };
            }
        }
        merged
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::metrics::test_support::{commit_at, modified_file};

    fn three_line_commit(email: &str, when: &str, path: &str) -> crate::git::CommitRecord {
        commit_at(
            email,
            when,
            vec![modified_file(path, &["a = 1", "b = 2", "c = 3"], &[])],
        )
    }

    #[test]
    fn close_commits_form_one_session() {
        let mut metric = DeveloperHours::default();
        metric.process_commit(&three_line_commit("a@x", "2024-03-11 10:00:00", "a.py"));
        metric.process_commit(&three_line_commit("a@x", "2024-03-11 10:45:00", "b.py"));

        let snap = metric.snapshot();
        let record = &snap["a@x"];
        assert_eq!(record.total_sessions, 1);
        let weekly = &record.weekly_hours["2024-03-11"];
        assert_eq!(weekly.commits, 2);
        assert!(weekly.estimated_hours >= 0.5 && weekly.estimated_hours <= 8.0);
    }

    #[test]
    fn distant_commits_form_two_sessions() {
        let mut metric = DeveloperHours::default();
        metric.process_commit(&three_line_commit("a@x", "2024-03-11 08:00:00", "a.py"));
        metric.process_commit(&three_line_commit("a@x", "2024-03-11 16:00:00", "b.py"));
        assert_eq!(metric.snapshot()["a@x"].total_sessions, 2);
    }

    #[test]
    fn single_commit_session_scaled_down() {
        let mut metric = DeveloperHours::default();
        metric.process_commit(&three_line_commit("a@x", "2024-03-11 10:00:00", "a.py"));
        let snap = metric.snapshot();
        // Padded session is 45 min; single-commit scale 0.75, then the
        // low change-rate bump 1.1: 0.75h * 0.75 * 1.1 ≈ 0.62.
        let hours = snap["a@x"].total_estimated_hours;
        assert!(hours > 0.5 && hours < 0.75, "got {hours}");
    }

    #[test]
    fn sessions_never_exceed_cap() {
        let mut metric = DeveloperHours::default();
        // Commits every 90 minutes over 24 hours stay in one session.
        for hour in 0..16 {
            let when = format!("2024-03-11 {:02}:{}0:00", hour, if hour % 2 == 0 { 0 } else { 3 });
            metric.process_commit(&three_line_commit("a@x", &when, "a.py"));
        }
        let snap = metric.snapshot();
        for weekly in snap["a@x"].weekly_hours.values() {
            assert!(weekly.estimated_hours <= SESSION_CAP_HOURS + 1e-9);
        }
    }

    #[test]
    fn hours_per_day_uses_productive_days() {
        let mut metric = DeveloperHours::default();
        metric.process_commit(&three_line_commit("a@x", "2024-03-11 10:00:00", "a.py"));
        metric.process_commit(&three_line_commit("a@x", "2024-03-12 10:00:00", "b.py"));
        let snap = metric.snapshot();
        let weekly = &snap["a@x"].weekly_hours["2024-03-11"];
        assert!((weekly.hours_per_day - round2(weekly.estimated_hours / 2.0)).abs() < 0.02);
    }

    #[test]
    fn merge_unions_productive_days() {
        let mut a = DeveloperHours::default();
        a.process_commit(&three_line_commit("a@x", "2024-03-11 10:00:00", "a.py"));
        let mut b = DeveloperHours::default();
        b.process_commit(&three_line_commit("a@x", "2024-03-12 10:00:00", "b.py"));

        let merged = DeveloperHours::merge(&[a.snapshot(), b.snapshot()]);
        let weekly = &merged["a@x"].weekly_hours["2024-03-11"];
        assert_eq!(weekly.productive_days.len(), 2);
        assert_eq!(weekly.sessions, 2);
    }
}
