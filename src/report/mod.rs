//! Cross-repository, per-developer aggregation: summaries, weekly stats
//! and trends composed from the weekly metric snapshots.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::metrics::{
    round2, CodeDomain, CodeProvenance, DeveloperHours, DiffDelta, MetricsSnapshot, TimeAnalysis,
};

/// Weeks in the "recent" window of the velocity trend.
const TREND_WINDOW_WEEKS: usize = 4;
/// Weeks considered by the consistency score.
const CONSISTENCY_WINDOW_WEEKS: usize = 8;

/// Headline figures for one developer.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DeveloperSummary {
    /// Weighted change score across all repositories.
    pub total_diff_delta: f64,
    /// Commits across all repositories.
    pub total_commits: u64,
    /// Estimated working hours.
    pub total_estimated_hours: f64,
    /// `domain → share of all changes` in percent.
    pub domain_distribution: BTreeMap<String, f64>,
    /// Days between first and last commit.
    pub total_span_days: f64,
    /// `active days / span days`.
    pub activity_density: f64,
    /// Mean work-session length in hours.
    pub avg_session_length_hours: f64,
    /// Coarse working-style label.
    pub work_pattern_type: String,
}

/// One developer-week across all metrics.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WeeklyStat {
    /// Weighted change score.
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
    /// Distinct active days.
    pub active_days: u64,
    /// `diff_delta / active_days`.
    pub velocity_per_day: f64,
    /// Share of additions landing in empty slots.
    pub new_code_percent: f64,
    /// Share replacing code at most 30 days old.
    pub recent_code_percent: f64,
    /// Share replacing code at most a year old.
    pub old_code_percent: f64,
    /// Share replacing older code.
    pub legacy_code_percent: f64,
    /// Estimated hours.
    pub estimated_hours: f64,
    /// Sessions in the week.
    pub sessions: u64,
    /// `estimated_hours / productive days`.
    pub hours_per_day: f64,
    /// `domain → share of the week's changes` in percent.
    pub domain_focus: BTreeMap<String, f64>,
}

/// Trend figures over the weekly series.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Trends {
    /// Percent change between the last four weeks' mean velocity and the
    /// previous four weeks'. Zero when the older window is empty.
    pub velocity_trend: f64,
    /// `max(0, 100 − coefficient of variation)` over the last 8 weeks.
    pub velocity_consistency: f64,
    /// `100 · active weeks / total weeks`.
    pub activity_rate: f64,
}

/// One developer's aggregated report.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DeveloperStats {
    /// Headline figures.
    pub summary: DeveloperSummary,
    /// Weekly records keyed by Monday date.
    pub weekly_stats: BTreeMap<String, WeeklyStat>,
    /// Trend figures.
    pub trends: Trends,
}

/// The organization-level report written by the catalog run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrgReport {
    /// Per-developer aggregation keyed by canonical email.
    pub developer_stats: BTreeMap<String, DeveloperStats>,
    /// Repositories that could not be processed.
    pub failed_repositories: Vec<String>,
}

/// Builds per-developer stats from one repository's weekly snapshots.
pub fn developer_stats(
    weekly: &BTreeMap<String, MetricsSnapshot>,
) -> BTreeMap<String, DeveloperStats> {
    let snapshots: Vec<&MetricsSnapshot> = weekly.values().collect();

    let delta_all = DiffDelta::merge(
        &snapshots.iter().map(|s| s.timings.diff_delta.clone()).collect::<Vec<_>>(),
    );
    let prov_all = CodeProvenance::merge(
        &snapshots.iter().map(|s| s.timings.code_provenance.clone()).collect::<Vec<_>>(),
    );
    let hours_all = DeveloperHours::merge(
        &snapshots.iter().map(|s| s.timings.developer_hours.clone()).collect::<Vec<_>>(),
    );
    let domain_all = CodeDomain::merge(
        &snapshots.iter().map(|s| s.timings.code_domain.clone()).collect::<Vec<_>>(),
    );
    let time_all = TimeAnalysis::merge(
        &snapshots
            .iter()
            .map(|s| s.timings.comprehensive_time_analysis.clone())
            .collect::<Vec<_>>(),
    );

    let mut developers: std::collections::BTreeSet<String> = std::collections::BTreeSet::new();
    developers.extend(delta_all.keys().cloned());
    developers.extend(hours_all.keys().cloned());
    developers.extend(domain_all.keys().cloned());
    developers.extend(time_all.keys().cloned());

    let mut stats = BTreeMap::new();
    for developer in developers {
        let mut record = DeveloperStats::default();

        if let Some(delta) = delta_all.get(&developer) {
            record.summary.total_diff_delta = delta.total_diff_delta;
            record.summary.total_commits = delta.total_commits;
            for (week, weekly) in &delta.weekly_velocity {
                let stat = record.weekly_stats.entry(week.clone()).or_default();
                stat.diff_delta = weekly.diff_delta;
                stat.lines_added = weekly.lines_added;
                stat.lines_updated = weekly.lines_updated;
                stat.lines_deleted = weekly.lines_deleted;
                stat.lines_moved = weekly.lines_moved;
                stat.commits = weekly.commits;
                stat.active_days = weekly.active_days;
                stat.velocity_per_day = weekly.velocity_per_day;
            }
        }

        if let Some(provenance) = prov_all.get(&developer) {
            for (week, weekly) in &provenance.weekly_provenance {
                let stat = record.weekly_stats.entry(week.clone()).or_default();
                stat.new_code_percent = weekly.new_code_percent;
                stat.recent_code_percent = weekly.recent_code_percent;
                stat.old_code_percent = weekly.old_code_percent;
                stat.legacy_code_percent = weekly.legacy_code_percent;
            }
        }

        if let Some(hours) = hours_all.get(&developer) {
            record.summary.total_estimated_hours = hours.total_estimated_hours;
            for (week, weekly) in &hours.weekly_hours {
                let stat = record.weekly_stats.entry(week.clone()).or_default();
                stat.estimated_hours = weekly.estimated_hours;
                stat.sessions = weekly.sessions;
                stat.hours_per_day = weekly.hours_per_day;
            }
        }

        if let Some(domains) = domain_all.get(&developer) {
            record.summary.domain_distribution = domains.domain_percentages.clone();
            for (week, weekly) in &domains.weekly_domains {
                let stat = record.weekly_stats.entry(week.clone()).or_default();
                stat.domain_focus = weekly.percentages.clone();
            }
        }

        if let Some(analysis) = time_all.get(&developer) {
            record.summary.total_span_days = analysis.basic_stats.total_span_days;
            record.summary.avg_session_length_hours =
                analysis.work_sessions.avg_session_length_hours;
            let span = analysis.basic_stats.total_span_days.max(1.0);
            record.summary.activity_density =
                round2(analysis.sustained_activity.total_active_days as f64 / span);
            record.summary.work_pattern_type = work_pattern_type(analysis);
        } else {
            record.summary.work_pattern_type = "unknown".to_string();
        }

        record.trends = trends_of(&record.weekly_stats);
        stats.insert(developer, record);
    }

    stats
}

/// Composes per-repository weekly snapshot maps into one cross-repo
/// developer report, merging same-week buckets across repositories.
pub fn aggregate_repositories(
    repos: &[BTreeMap<String, MetricsSnapshot>],
) -> BTreeMap<String, DeveloperStats> {
    let mut by_week: BTreeMap<String, Vec<MetricsSnapshot>> = BTreeMap::new();
    for repo in repos {
        for (week, snapshot) in repo {
            by_week.entry(week.clone()).or_default().push(snapshot.clone());
        }
    }
    let merged: BTreeMap<String, MetricsSnapshot> = by_week
        .into_iter()
        .map(|(week, parts)| (week, MetricsSnapshot::merge(&parts)))
        .collect();
    developer_stats(&merged)
}

/// Derives a coarse working-style label from the temporal analysis.
///
/// Heuristic only: weekend-heavy when 40%+ of commits land on Saturday
/// or Sunday, bursty when half the commits land on one weekday.
fn work_pattern_type(analysis: &crate::metrics::timings::time_analysis::DeveloperTimeAnalysis) -> String {
    let total: u64 = analysis.daily_patterns.day_distribution.values().sum();
    if total < 2 {
        return "unknown".to_string();
    }
    let weekend: u64 = analysis
        .daily_patterns
        .day_distribution
        .iter()
        .filter(|(day, _)| **day >= 5)
        .map(|(_, count)| *count)
        .sum();
    if weekend as f64 / total as f64 >= 0.4 {
        return "weekend_heavy".to_string();
    }
    if analysis.daily_patterns.peak_day_count as f64 / total as f64 >= 0.5 {
        return "bursty".to_string();
    }
    "steady".to_string()
}

fn trends_of(weekly_stats: &BTreeMap<String, WeeklyStat>) -> Trends {
    if weekly_stats.is_empty() {
        return Trends::default();
    }

    // BTreeMap iteration is already chronological for YYYY-MM-DD keys.
    let series: Vec<f64> = weekly_stats.values().map(|w| w.diff_delta).collect();

    let velocity_trend = if series.len() > TREND_WINDOW_WEEKS {
        let recent = &series[series.len() - TREND_WINDOW_WEEKS..];
        let older_start = series.len().saturating_sub(2 * TREND_WINDOW_WEEKS);
        let older = &series[older_start..series.len() - TREND_WINDOW_WEEKS];
        let recent_mean = mean(recent);
        let older_mean = mean(older);
        if older.is_empty() || older_mean <= 0.0 {
            0.0
        } else {
            round2((recent_mean - older_mean) / older_mean * 100.0)
        }
    } else {
        0.0
    };

    let tail_start = series.len().saturating_sub(CONSISTENCY_WINDOW_WEEKS);
    let tail = &series[tail_start..];
    let velocity_consistency = {
        let m = mean(tail);
        if tail.len() < 2 || m <= 0.0 {
            if m > 0.0 { 100.0 } else { 0.0 }
        } else {
            let variance =
                tail.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (tail.len() - 1) as f64;
            let cv = variance.sqrt() / m * 100.0;
            round2((100.0 - cv).max(0.0))
        }
    };

    let total_weeks = weekly_stats.len();
    let active_weeks = weekly_stats.values().filter(|w| w.diff_delta > 0.0).count();
    let activity_rate = round2(active_weeks as f64 / total_weeks as f64 * 100.0);

    Trends {
        velocity_trend,
        velocity_consistency,
        activity_rate,
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::engine::week::week_key;
    use crate::metrics::test_support::{commit_at, modified_file};
    use crate::metrics::{MetricConfig, MetricSet};

    /// Runs commits through weekly metric sets the way the engine does.
    fn weekly_snapshots(
        commits: Vec<crate::git::CommitRecord>,
    ) -> BTreeMap<String, MetricsSnapshot> {
        let mut buckets: BTreeMap<String, MetricSet> = BTreeMap::new();
        for commit in commits {
            buckets
                .entry(week_key(commit.committer_date))
                .or_insert_with(|| MetricSet::new(&MetricConfig::default()))
                .process_commit(&commit);
        }
        buckets
            .into_iter()
            .map(|(week, set)| (week, set.snapshot()))
            .collect()
    }

    fn simple_commit(email: &str, when: &str, path: &str, lines: usize) -> crate::git::CommitRecord {
        let text: Vec<String> = (0..lines).map(|i| format!("value_{i} = {i}")).collect();
        let refs: Vec<&str> = text.iter().map(String::as_str).collect();
        commit_at(email, when, vec![modified_file(path, &refs, &[])])
    }

    #[test]
    fn summary_totals_accumulate() {
        let weekly = weekly_snapshots(vec![
            simple_commit("alice@x", "2024-03-11 10:00:00", "src/a.py", 3),
            simple_commit("alice@x", "2024-03-18 10:00:00", "src/b.py", 2),
        ]);
        let stats = developer_stats(&weekly);
        let alice = &stats["alice@x"];
        assert_eq!(alice.summary.total_commits, 2);
        assert!(alice.summary.total_diff_delta > 0.0);
        assert_eq!(alice.weekly_stats.len(), 2);
    }

    #[test]
    fn weekly_diff_delta_sums_to_total() {
        let weekly = weekly_snapshots(vec![
            simple_commit("alice@x", "2024-03-11 10:00:00", "src/a.py", 3),
            simple_commit("alice@x", "2024-03-18 10:00:00", "src/b.py", 5),
            simple_commit("alice@x", "2024-03-25 10:00:00", "src/c.py", 1),
        ]);
        let stats = developer_stats(&weekly);
        let alice = &stats["alice@x"];
        let weekly_sum: f64 = alice.weekly_stats.values().map(|w| w.diff_delta).sum();
        assert!((weekly_sum - alice.summary.total_diff_delta).abs() < 1e-9);
    }

    #[test]
    fn activity_rate_counts_active_weeks() {
        let weekly = weekly_snapshots(vec![
            simple_commit("alice@x", "2024-03-11 10:00:00", "src/a.py", 3),
            simple_commit("alice@x", "2024-03-25 10:00:00", "src/b.py", 3),
        ]);
        let stats = developer_stats(&weekly);
        // Both observed weeks are active; weeks without commits produce
        // no bucket at all.
        assert!((stats["alice@x"].trends.activity_rate - 100.0).abs() < 1e-9);
    }

    #[test]
    fn trend_zero_with_short_history() {
        let weekly = weekly_snapshots(vec![simple_commit(
            "alice@x",
            "2024-03-11 10:00:00",
            "src/a.py",
            3,
        )]);
        let stats = developer_stats(&weekly);
        assert!((stats["alice@x"].trends.velocity_trend).abs() < 1e-9);
    }

    #[test]
    fn cross_repo_aggregation_merges_weeks() {
        let repo_a = weekly_snapshots(vec![simple_commit(
            "alice@x",
            "2024-03-11 10:00:00",
            "src/a.py",
            3,
        )]);
        let repo_b = weekly_snapshots(vec![simple_commit(
            "alice@x",
            "2024-03-11 15:00:00",
            "lib/b.py",
            2,
        )]);
        let stats = aggregate_repositories(&[repo_a, repo_b]);
        let alice = &stats["alice@x"];
        assert_eq!(alice.summary.total_commits, 2);
        assert_eq!(alice.weekly_stats.len(), 1);
        assert_eq!(alice.weekly_stats["2024-03-11"].commits, 2);
    }

    #[test]
    fn consistency_scores_steady_series_high() {
        let mut weekly_stats: BTreeMap<String, WeeklyStat> = BTreeMap::new();
        for (week, delta) in [
            ("2024-03-04", 10.0),
            ("2024-03-11", 10.0),
            ("2024-03-18", 10.0),
            ("2024-03-25", 10.0),
        ] {
            weekly_stats.insert(
                week.to_string(),
                WeeklyStat {
                    diff_delta: delta,
                    ..WeeklyStat::default()
                },
            );
        }
        let trends = trends_of(&weekly_stats);
        assert!((trends.velocity_consistency - 100.0).abs() < 1e-9);
        assert_eq!(trends.activity_rate, 100.0);
    }
}
