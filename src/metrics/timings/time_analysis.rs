//! Comprehensive temporal behavior analysis per developer.
//!
//! Works over the whole commit stream of a developer: inter-commit
//! intervals, work-session clustering, daily and weekly patterns,
//! downtime and sustained-activity runs.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::engine::week::week_key;
use crate::git::CommitRecord;
use crate::metrics::{round2, Metric};

/// Intra-session gap bound for work-session clustering, in hours.
pub const SESSION_GAP_HOURS: i64 = 4;
/// Breaks above this many hours count as long downtime.
pub const LONG_BREAK_HOURS: f64 = 24.0;

/// One observed commit, the raw material for all derived figures.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Activity {
    /// Commit timestamp, naive UTC.
    pub timestamp: NaiveDateTime,
    /// Added+deleted lines of the commit.
    pub lines_changed: u64,
    /// Files touched by the commit.
    pub files_changed: u64,
}

/// Span and volume totals.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BasicStats {
    /// Commits observed.
    pub total_commits: u64,
    /// First commit timestamp (ISO string).
    pub first_commit_date: String,
    /// Last commit timestamp (ISO string).
    pub last_commit_date: String,
    /// Days between first and last commit.
    pub total_span_days: f64,
    /// `commits / max(span, 1)`.
    pub commits_per_day: f64,
    /// Sum of per-commit line changes.
    pub total_lines_changed: u64,
    /// Sum of per-commit file counts.
    pub total_files_changed: u64,
}

/// Inter-commit interval statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TimingPatterns {
    /// Mean interval in hours.
    pub mean_interval_hours: f64,
    /// Median interval in hours.
    pub median_interval_hours: f64,
    /// Smallest interval in minutes.
    pub min_interval_minutes: f64,
    /// Largest interval in days.
    pub max_interval_days: f64,
}

/// Work-session clustering results.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WorkSessions {
    /// Number of sessions.
    pub session_count: u64,
    /// Mean session length in hours.
    pub avg_session_length_hours: f64,
    /// Longest session in hours.
    pub max_session_length_hours: f64,
    /// Mean commits per session.
    pub avg_commits_per_session: f64,
    /// Most commits in one session.
    pub max_commits_per_session: u64,
}

/// Weekday histogram.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DailyPatterns {
    /// Weekday with the most commits (0 = Monday).
    pub peak_day: u32,
    /// Commits on the peak day.
    pub peak_day_count: u64,
    /// `weekday → commits` (0 = Monday).
    pub day_distribution: BTreeMap<u32, u64>,
}

/// Distinct-week statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WeeklyPatterns {
    /// Distinct weeks with commits.
    pub total_weeks: u64,
    /// Mean commits per active week.
    pub avg_activities_per_week: f64,
    /// Most commits in one week.
    pub max_activities_per_week: u64,
    /// Fewest commits in one active week.
    pub min_activities_per_week: u64,
}

/// Break-length statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DowntimeAnalysis {
    /// Breaks of at most four hours.
    pub short_breaks_count: u64,
    /// Breaks longer than a day.
    pub long_breaks_count: u64,
    /// Mean break length in hours.
    pub avg_break_hours: f64,
}

/// Consecutive-day activity runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SustainedActivity {
    /// Distinct calendar days with commits.
    pub total_active_days: u64,
    /// Longest run of consecutive active days.
    pub max_consecutive_days: u64,
    /// Mean commits per active day.
    pub avg_activities_per_active_day: f64,
}

/// One developer's full temporal analysis.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DeveloperTimeAnalysis {
    /// Span and volume totals.
    pub basic_stats: BasicStats,
    /// Inter-commit interval statistics.
    pub timing_patterns: TimingPatterns,
    /// Session clustering.
    pub work_sessions: WorkSessions,
    /// Weekday histogram.
    pub daily_patterns: DailyPatterns,
    /// Week statistics.
    pub weekly_patterns: WeeklyPatterns,
    /// Break statistics.
    pub downtime_analysis: DowntimeAnalysis,
    /// Active-day runs.
    pub sustained_activity: SustainedActivity,
    /// Raw activity series; merge carrier only, never serialized.
    #[serde(skip)]
    pub activities: Vec<Activity>,
}

/// Snapshot: `canonical email → temporal analysis`.
///
/// Developers with fewer than two commits are omitted (no intervals to
/// analyze), but their activities are still carried for merging.
pub type TimeAnalysisSnapshot = BTreeMap<String, DeveloperTimeAnalysis>;

/// Collects per-developer activity series and derives temporal figures.
#[derive(Debug, Default)]
pub struct TimeAnalysis {
    activities: BTreeMap<String, Vec<Activity>>,
}

impl Metric for TimeAnalysis {
    type Snapshot = TimeAnalysisSnapshot;

    fn process_commit(&mut self, commit: &CommitRecord) {
        self.activities
            .entry(commit.author_key())
            .or_default()
            .push(Activity {
                timestamp: commit.committer_date,
                lines_changed: commit.total_changed_lines(),
                files_changed: commit.modified_files.len() as u64,
            });
    }

    fn snapshot(&self) -> TimeAnalysisSnapshot {
        self.activities
            .iter()
            .map(|(dev, activities)| (dev.clone(), analyze(activities.clone())))
            .collect()
    }
}

impl TimeAnalysis {
    /// Strictly monoidal merge: the carried activity series are
    /// concatenated per developer and every figure is recomputed.
    pub fn merge(parts: &[TimeAnalysisSnapshot]) -> TimeAnalysisSnapshot {
        let mut series: BTreeMap<String, Vec<Activity>> = BTreeMap::new();
        for part in parts {
            for (dev, analysis) in part {
                series
                    .entry(dev.clone())
                    .or_default()
                    .extend(analysis.activities.iter().cloned());
            }
        }
        series
            .into_iter()
            .map(|(dev, activities)| (dev, analyze(activities)))
            .collect()
    }
}

fn analyze(mut activities: Vec<Activity>) -> DeveloperTimeAnalysis {
    activities.sort_by_key(|a| a.timestamp);

    if activities.len() < 2 {
        return DeveloperTimeAnalysis {
            basic_stats: BasicStats {
                total_commits: activities.len() as u64,
                ..BasicStats::default()
            },
            activities,
            ..DeveloperTimeAnalysis::default()
        };
    }

    let first = activities[0].timestamp;
    let last = activities[activities.len() - 1].timestamp;
    let span_days = (last - first).num_seconds() as f64 / 86_400.0;

    let intervals: Vec<f64> = activities
        .windows(2)
        .map(|w| (w[1].timestamp - w[0].timestamp).num_seconds() as f64)
        .collect();

    DeveloperTimeAnalysis {
        basic_stats: BasicStats {
            total_commits: activities.len() as u64,
            first_commit_date: first.format("%Y-%m-%dT%H:%M:%S").to_string(),
            last_commit_date: last.format("%Y-%m-%dT%H:%M:%S").to_string(),
            total_span_days: round2(span_days),
            commits_per_day: round2(activities.len() as f64 / span_days.max(1.0)),
            total_lines_changed: activities.iter().map(|a| a.lines_changed).sum(),
            total_files_changed: activities.iter().map(|a| a.files_changed).sum(),
        },
        timing_patterns: timing_patterns(&intervals),
        work_sessions: work_sessions(&activities),
        daily_patterns: daily_patterns(&activities),
        weekly_patterns: weekly_patterns(&activities),
        downtime_analysis: downtime(&intervals),
        sustained_activity: sustained(&activities),
        activities,
    }
}

fn timing_patterns(intervals: &[f64]) -> TimingPatterns {
    if intervals.is_empty() {
        return TimingPatterns::default();
    }
    let mut sorted = intervals.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mean = intervals.iter().sum::<f64>() / intervals.len() as f64;
    let median = if sorted.len() % 2 == 1 {
        sorted[sorted.len() / 2]
    } else {
        (sorted[sorted.len() / 2 - 1] + sorted[sorted.len() / 2]) / 2.0
    };

    TimingPatterns {
        mean_interval_hours: round2(mean / 3600.0),
        median_interval_hours: round2(median / 3600.0),
        min_interval_minutes: round2(sorted[0] / 60.0),
        max_interval_days: round2(sorted[sorted.len() - 1] / 86_400.0),
    }
}

fn work_sessions(activities: &[Activity]) -> WorkSessions {
    let gap = chrono::Duration::hours(SESSION_GAP_HOURS);

    // (length_hours, commits) per session.
    let mut sessions: Vec<(f64, u64)> = Vec::new();
    let mut start = activities[0].timestamp;
    let mut prev = start;
    let mut commits = 1u64;

    for activity in &activities[1..] {
        if activity.timestamp - prev <= gap {
            commits += 1;
        } else {
            sessions.push(((prev - start).num_seconds() as f64 / 3600.0, commits));
            start = activity.timestamp;
            commits = 1;
        }
        prev = activity.timestamp;
    }
    sessions.push(((prev - start).num_seconds() as f64 / 3600.0, commits));

    let count = sessions.len() as f64;
    WorkSessions {
        session_count: sessions.len() as u64,
        avg_session_length_hours: round2(sessions.iter().map(|(h, _)| h).sum::<f64>() / count),
        max_session_length_hours: round2(
            sessions.iter().map(|(h, _)| *h).fold(0.0, f64::max),
        ),
        avg_commits_per_session: round2(
            sessions.iter().map(|(_, c)| *c as f64).sum::<f64>() / count,
        ),
        max_commits_per_session: sessions.iter().map(|(_, c)| *c).max().unwrap_or(0),
    }
}

fn daily_patterns(activities: &[Activity]) -> DailyPatterns {
    let mut distribution: BTreeMap<u32, u64> = BTreeMap::new();
    for activity in activities {
        *distribution
            .entry(activity.timestamp.weekday().num_days_from_monday())
            .or_insert(0) += 1;
    }
    let (peak_day, peak_day_count) = distribution
        .iter()
        .max_by_key(|(_, count)| **count)
        .map(|(day, count)| (*day, *count))
        .unwrap_or((0, 0));

    DailyPatterns {
        peak_day,
        peak_day_count,
        day_distribution: distribution,
    }
}

fn weekly_patterns(activities: &[Activity]) -> WeeklyPatterns {
    let mut weeks: BTreeMap<String, u64> = BTreeMap::new();
    for activity in activities {
        *weeks.entry(week_key(activity.timestamp)).or_insert(0) += 1;
    }
    if weeks.is_empty() {
        return WeeklyPatterns::default();
    }
    let counts: Vec<u64> = weeks.values().copied().collect();
    WeeklyPatterns {
        total_weeks: weeks.len() as u64,
        avg_activities_per_week: round2(
            counts.iter().sum::<u64>() as f64 / counts.len() as f64,
        ),
        max_activities_per_week: counts.iter().copied().max().unwrap_or(0),
        min_activities_per_week: counts.iter().copied().min().unwrap_or(0),
    }
}

fn downtime(intervals: &[f64]) -> DowntimeAnalysis {
    if intervals.is_empty() {
        return DowntimeAnalysis::default();
    }
    let hours: Vec<f64> = intervals.iter().map(|s| s / 3600.0).collect();
    DowntimeAnalysis {
        short_breaks_count: hours.iter().filter(|h| **h <= SESSION_GAP_HOURS as f64).count() as u64,
        long_breaks_count: hours.iter().filter(|h| **h > LONG_BREAK_HOURS).count() as u64,
        avg_break_hours: round2(hours.iter().sum::<f64>() / hours.len() as f64),
    }
}

fn sustained(activities: &[Activity]) -> SustainedActivity {
    let mut per_day: BTreeMap<NaiveDate, u64> = BTreeMap::new();
    for activity in activities {
        *per_day.entry(activity.timestamp.date()).or_insert(0) += 1;
    }

    let days: Vec<NaiveDate> = per_day.keys().copied().collect();
    let mut max_streak = 1u64;
    let mut streak = 1u64;
    for pair in days.windows(2) {
        if (pair[1] - pair[0]).num_days() == 1 {
            streak += 1;
            max_streak = max_streak.max(streak);
        } else {
            streak = 1;
        }
    }

    SustainedActivity {
        total_active_days: per_day.len() as u64,
        max_consecutive_days: max_streak,
        avg_activities_per_active_day: round2(
            per_day.values().sum::<u64>() as f64 / per_day.len().max(1) as f64,
        ),
    }
}
