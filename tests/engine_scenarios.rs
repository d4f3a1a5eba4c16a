#![allow(clippy::unwrap_used, clippy::expect_used)]

//! End-to-end scenarios over fixture repositories: the traversal driver,
//! the accumulators and the chunk-merge algebra against known histories.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;

use anyhow::Result;
use chrono::NaiveDateTime;
use git2::{Repository, Signature, Time};
use tempfile::TempDir;

use gitmine::engine::{analyze_repository, traverse, week, EngineConfig, RepoContext};
use gitmine::git::MinedRepository;
use gitmine::metrics::{MetricConfig, MetricSet, MetricsSnapshot};
use gitmine::sched::memory::MemoryMonitor;

/// Test setup that creates a temporary git repository with controlled
/// authors, timestamps and file contents.
struct TestRepo {
    _temp_dir: TempDir,
    repo_path: PathBuf,
    repo: Repository,
    commits: Vec<git2::Oid>,
}

impl TestRepo {
    fn new() -> Result<Self> {
        let temp_dir = tempfile::tempdir()?;
        let repo_path = temp_dir.path().to_path_buf();
        let repo = Repository::init(&repo_path)?;

        let mut config = repo.config()?;
        config.set_str("user.name", "Test User")?;
        config.set_str("user.email", "test@example.com")?;

        Ok(Self {
            _temp_dir: temp_dir,
            repo_path,
            repo,
            commits: Vec::new(),
        })
    }

    /// Commits the given `(path, content)` pairs as one commit by
    /// `name <email>` at `when` (`YYYY-MM-DD HH:MM:SS`, UTC).
    fn add_commit(
        &mut self,
        name: &str,
        email: &str,
        when: &str,
        message: &str,
        files: &[(&str, &str)],
    ) -> Result<git2::Oid> {
        for (path, content) in files {
            let file_path = self.repo_path.join(path);
            if let Some(parent) = file_path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&file_path, content)?;
        }

        let mut index = self.repo.index()?;
        for (path, _) in files {
            index.add_path(Path::new(path))?;
        }
        index.write()?;

        let seconds = ts(when).and_utc().timestamp();
        let signature = Signature::new(name, email, &Time::new(seconds, 0))?;

        let tree_id = index.write_tree()?;
        let tree = self.repo.find_tree(tree_id)?;

        let parent_commit = match self.commits.last() {
            Some(oid) => Some(self.repo.find_commit(*oid)?),
            None => None,
        };
        let parents: Vec<&git2::Commit> = parent_commit.iter().collect();

        let commit_id = self.repo.commit(
            Some("HEAD"),
            &signature,
            &signature,
            message,
            &tree,
            &parents,
        )?;
        self.commits.push(commit_id);
        Ok(commit_id)
    }

    fn mined(&self) -> Result<MinedRepository> {
        Ok(MinedRepository::open_at(&self.repo_path)?)
    }
}

fn ts(text: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S").unwrap()
}

/// Runs a traversal over the whole fixture and returns the result.
fn run(repo: &TestRepo) -> gitmine::engine::TraversalResult {
    run_range(repo, None, None)
}

fn run_range(
    repo: &TestRepo,
    since: Option<NaiveDateTime>,
    to: Option<NaiveDateTime>,
) -> gitmine::engine::TraversalResult {
    let mined = repo.mined().unwrap();
    let config = EngineConfig::default();
    let mut monitor = MemoryMonitor::new();
    let cancel = AtomicBool::new(false);
    traverse(&mined, &config, since, to, &mut monitor, &cancel, |_batch| Ok(())).unwrap()
}

// ── S1: single three-line commit ───────────────────────────────

#[test]
fn single_commit_basic_counters() {
    let mut repo = TestRepo::new().unwrap();
    repo.add_commit(
        "alice",
        "alice@x",
        "2024-03-11 10:00:00",
        "add values",
        &[("a.py", "x=1\ny=2\nz=3\n")],
    )
    .unwrap();

    let result = run(&repo);
    let snap = &result.overall;

    assert_eq!(snap.productivity.change_set.max, 1);
    assert!((snap.productivity.change_set.avg - 1.0).abs() < 1e-9);
    assert_eq!(snap.productivity.lines_count.added.total["a.py"], 3);
    assert_eq!(
        snap.productivity.lines_count.removed.total.get("a.py"),
        Some(&0)
    );
    assert_eq!(snap.productivity.contributors_count.total["a.py"], 1);
    assert_eq!(snap.productivity.contributors_count.minor["a.py"], 0);
    assert_eq!(snap.quality.code_churn.added_removed.added, 3);
    assert_eq!(snap.quality.code_churn.added_removed.removed, 0);
    assert_eq!(snap.quality.meaningful_code.total.meaningful_lines, 3);
    assert_eq!(result.totals.total_commits, 1);
}

// ── S2: blank lines are no-ops ─────────────────────────────────

#[test]
fn blank_lines_counted_as_noop() {
    let mut repo = TestRepo::new().unwrap();
    repo.add_commit(
        "alice",
        "alice@x",
        "2024-03-11 10:00:00",
        "add values with padding",
        &[("a.py", "x=1\ny=2\nz=3\n\n\n")],
    )
    .unwrap();

    let result = run(&repo);
    let snap = &result.overall;

    assert_eq!(snap.productivity.lines_count.noop_added.total["a.py"], 2);
    assert_eq!(snap.productivity.lines_count.added.total["a.py"], 5);
    assert_eq!(snap.quality.meaningful_code.total.meaningful_lines, 3);
}

// ── S3: minor contributor threshold ────────────────────────────

#[test]
fn minor_contributor_detected() {
    let mut repo = TestRepo::new().unwrap();
    // alice lands 30 lines; bob's single line is a sub-5% share.
    let bulk_lines: String = (0..30).map(|i| format!("hello_{i}()\n")).collect();
    repo.add_commit(
        "alice",
        "alice@x",
        "2024-03-11 10:00:00",
        "bulk add",
        &[("a.py", &bulk_lines)],
    )
    .unwrap();
    let with_world = format!("{bulk_lines}world()\n");
    repo.add_commit(
        "bob",
        "bob@x",
        "2024-03-11 11:00:00",
        "tiny touch",
        &[("a.py", &with_world)],
    )
    .unwrap();

    let result = run(&repo);
    let snap = &result.overall;

    assert_eq!(snap.productivity.contributors_count.total["a.py"], 2);
    assert_eq!(snap.productivity.contributors_count.minor["a.py"], 1);
    assert_eq!(snap.productivity.commits_count["a.py"], 2);
}

// ── S4: bug-fix attribution ────────────────────────────────────

#[test]
fn bug_fix_commit_attributes_all_lines() {
    let mut repo = TestRepo::new().unwrap();
    repo.add_commit(
        "alice",
        "alice@x",
        "2024-03-01 10:00:00",
        "initial",
        &[("b.py", "old1()\nold2()\n")],
    )
    .unwrap();
    repo.add_commit(
        "alice",
        "alice@x",
        "2024-03-11 10:00:00",
        "Fix bug #42",
        &[("b.py", "new1()\nnew2()\nnew3()\nnew4()\nnew5()\n")],
    )
    .unwrap();

    // Scope the window to the fixing commit alone.
    let result = run_range(
        &repo,
        Some(ts("2024-03-10 00:00:00")),
        Some(ts("2024-03-12 00:00:00")),
    );
    let bugs = &result.overall.quality.bugs;

    assert_eq!(bugs.total_bug_lines, 7);
    assert_eq!(bugs.total_lines, 7);
    assert!((bugs.overall_bug_work_percent - 100.0).abs() < 1e-9);
}

// ── S5: session clustering ─────────────────────────────────────

#[test]
fn close_commits_form_single_session() {
    let mut repo = TestRepo::new().unwrap();
    repo.add_commit(
        "alice",
        "alice@x",
        "2024-03-11 10:00:00",
        "first",
        &[("a.py", "a1()\na2()\na3()\n")],
    )
    .unwrap();
    repo.add_commit(
        "alice",
        "alice@x",
        "2024-03-11 10:45:00",
        "second",
        &[("b.py", "b1()\nb2()\nb3()\n")],
    )
    .unwrap();

    let result = run(&repo);
    let hours = &result.overall.timings.developer_hours["alice@x"];

    assert_eq!(hours.total_sessions, 1);
    let weekly = &hours.weekly_hours["2024-03-11"];
    assert_eq!(weekly.commits, 2);
    assert!(weekly.estimated_hours >= 0.5 && weekly.estimated_hours <= 8.0);
}

// ── S6: domain attribution ─────────────────────────────────────

#[test]
fn domains_attributed_by_path() {
    let mut repo = TestRepo::new().unwrap();
    let js: String = (0..100).map(|i| format!("render_{i}();\n")).collect();
    let py: String = (0..50).map(|i| format!("handle_{i}()\n")).collect();
    repo.add_commit(
        "alice",
        "alice@x",
        "2024-03-11 10:00:00",
        "split frontend and backend",
        &[("src/frontend/app.js", js.as_str()), ("src/backend/api.py", py.as_str())],
    )
    .unwrap();

    let result = run(&repo);
    let domains = &result.overall.timings.code_domain["alice@x"];

    assert_eq!(domains.total_by_domain["frontend"], 100);
    assert_eq!(domains.total_by_domain["backend"], 50);
    assert!((domains.domain_percentages["frontend"] - 66.666).abs() < 0.01);
    assert!((domains.domain_percentages["backend"] - 33.333).abs() < 0.01);
}

// ── weekly bucketing ───────────────────────────────────────────

#[test]
fn commits_land_in_their_week_only() {
    let mut repo = TestRepo::new().unwrap();
    repo.add_commit(
        "alice",
        "alice@x",
        "2024-03-11 10:00:00",
        "week one",
        &[("a.py", "first()\n")],
    )
    .unwrap();
    repo.add_commit(
        "alice",
        "alice@x",
        "2024-03-20 10:00:00",
        "week two",
        &[("b.py", "first()\nsecond()\n")],
    )
    .unwrap();

    let result = run(&repo);
    assert_eq!(result.weekly.len(), 2);
    assert!(result.weekly.contains_key("2024-03-11"));
    assert!(result.weekly.contains_key("2024-03-18"));

    // No commit contributes to two weekly buckets.
    let week_one = &result.weekly["2024-03-11"];
    assert_eq!(week_one.productivity.change_set.commits, 1);
    assert!(week_one.productivity.commits_count.contains_key("a.py"));
    assert!(!week_one.productivity.commits_count.contains_key("b.py"));

    assert_eq!(week::week_key(ts("2024-03-20 10:00:00")), "2024-03-18");
}

#[test]
fn out_of_range_commits_are_skipped_entirely() {
    let mut repo = TestRepo::new().unwrap();
    repo.add_commit(
        "alice",
        "alice@x",
        "2024-01-01 10:00:00",
        "too early",
        &[("a.py", "early()\n")],
    )
    .unwrap();
    repo.add_commit(
        "alice",
        "alice@x",
        "2024-03-11 10:00:00",
        "in range",
        &[("b.py", "current()\n")],
    )
    .unwrap();

    let result = run_range(
        &repo,
        Some(ts("2024-03-01 00:00:00")),
        Some(ts("2024-03-31 00:00:00")),
    );

    assert_eq!(result.totals.total_commits, 1);
    assert!(!result.overall.productivity.commits_count.contains_key("a.py"));
    assert_eq!(result.weekly.len(), 1);
}

// ── chunk merge equals whole run (P1) ──────────────────────────

#[test]
fn chunk_merge_matches_whole_run_for_additive_metrics() {
    let mut repo = TestRepo::new().unwrap();
    // January activity on a.py, March activity on b.py: a chunk split at
    // the month boundary keeps every file within one chunk.
    repo.add_commit(
        "alice",
        "alice@x",
        "2024-01-08 10:00:00",
        "january work",
        &[("a.py", "a1()\na2()\na3()\n")],
    )
    .unwrap();
    repo.add_commit(
        "bob",
        "bob@x",
        "2024-01-09 11:00:00",
        "january follow-up",
        &[("a.py", "a1()\na2()\na3()\na4()\n")],
    )
    .unwrap();
    repo.add_commit(
        "alice",
        "alice@x",
        "2024-03-11 10:00:00",
        "march work",
        &[("b.py", "b1()\nb2()\n")],
    )
    .unwrap();

    let whole = run_range(
        &repo,
        Some(ts("2024-01-01 00:00:00")),
        Some(ts("2024-03-31 00:00:00")),
    );
    let first = run_range(
        &repo,
        Some(ts("2024-01-01 00:00:00")),
        Some(ts("2024-02-01 00:00:00")),
    );
    let second = run_range(
        &repo,
        Some(ts("2024-02-01 00:00:01")),
        Some(ts("2024-03-31 00:00:00")),
    );

    let merged = MetricsSnapshot::merge(&[first.overall, second.overall]);

    assert_eq!(merged.productivity.commits_count, whole.overall.productivity.commits_count);
    assert_eq!(
        merged.productivity.lines_count.added.total,
        whole.overall.productivity.lines_count.added.total
    );
    assert_eq!(
        merged.productivity.lines_count.removed.total,
        whole.overall.productivity.lines_count.removed.total
    );
    assert_eq!(
        merged.quality.code_churn.added_removed,
        whole.overall.quality.code_churn.added_removed
    );
    assert_eq!(
        merged.productivity.contributors_count.minor,
        whole.overall.productivity.contributors_count.minor
    );
    assert_eq!(merged.productivity.hunks_count, whole.overall.productivity.hunks_count);
}

// ── merge identity (P8 / I4) ───────────────────────────────────

#[test]
fn fresh_accumulators_snapshot_to_identity() {
    let empty = MetricSet::new(&MetricConfig::default()).snapshot();
    assert_eq!(empty, MetricsSnapshot::default());
    // merge([x]) == x
    let merged = MetricsSnapshot::merge(std::slice::from_ref(&empty));
    assert_eq!(merged, empty);
}

// ── full artifact pipeline ─────────────────────────────────────

#[test]
fn analyze_repository_writes_valid_artifact() {
    let mut repo = TestRepo::new().unwrap();
    repo.add_commit(
        "alice",
        "alice@x",
        "2024-03-11 10:00:00",
        "feature work",
        &[("src/app.py", "def main():\n    run_application()\n")],
    )
    .unwrap();
    repo.add_commit(
        "bob",
        "bob@x",
        "2024-03-12 09:30:00",
        "Fix bug #7",
        &[("src/app.py", "def main():\n    run_application()\n    log_startup()\n")],
    )
    .unwrap();

    let out_dir = tempfile::tempdir().unwrap();
    let artifact = out_dir.path().join("acme_fixture_analysis.json");
    let ctx = RepoContext {
        project_name: "acme".to_string(),
        repository_url: "local/fixture".to_string(),
        repository_name: "fixture".to_string(),
        ecosystem: "python".to_string(),
        repo_category: "core".to_string(),
    };

    let mined = repo.mined().unwrap();
    let cancel = AtomicBool::new(false);
    let analysis = analyze_repository(
        &ctx,
        &mined,
        &EngineConfig::default(),
        None,
        None,
        &artifact,
        &cancel,
    )
    .unwrap();

    assert_eq!(analysis.totals.total_commits, 2);

    let text = fs::read_to_string(&analysis.artifact_path).unwrap();
    let value: serde_json::Value = serde_json::from_str(&text).unwrap();

    assert_eq!(value["repository_name"], "fixture");
    assert_eq!(value["metrics_type"], "weekly");
    assert_eq!(value["commits"].as_array().unwrap().len(), 2);
    assert_eq!(value["processing"]["total_commits"], 2);

    // Both commits land in the same ISO week bucket.
    let metrics = value["process_metrics"].as_object().unwrap();
    assert!(metrics.contains_key("2024-03-11"));
    assert!(metrics.contains_key("developer_stats"));
    let alice = &metrics["developer_stats"]["alice@x"];
    assert_eq!(alice["summary"]["total_commits"], 1);

    // Commit summaries carry the parsed diff shape.
    let first = &value["commits"][0];
    assert!(first["modified_files"][0]["diff_parsed"]["added"].is_array());
    assert_eq!(first["author"]["email"], "alice@x");
}

// ── degraded records keep hash and date ────────────────────────

#[test]
fn commit_summaries_preserve_order_and_hashes() {
    let mut repo = TestRepo::new().unwrap();
    let first = repo
        .add_commit(
            "alice",
            "alice@x",
            "2024-03-11 10:00:00",
            "one",
            &[("a.py", "one()\n")],
        )
        .unwrap();
    let second = repo
        .add_commit(
            "alice",
            "alice@x",
            "2024-03-11 11:00:00",
            "two",
            &[("a.py", "one()\ntwo()\n")],
        )
        .unwrap();

    let mined = repo.mined().unwrap();
    let config = EngineConfig::default();
    let mut monitor = MemoryMonitor::new();
    let cancel = AtomicBool::new(false);
    let mut seen: Vec<String> = Vec::new();
    traverse(&mined, &config, None, None, &mut monitor, &cancel, |batch| {
        for value in batch {
            seen.push(value["hash"].as_str().unwrap().to_string());
        }
        Ok(())
    })
    .unwrap();

    assert_eq!(seen, vec![first.to_string(), second.to_string()]);
}

// ── rename identity (I6) ───────────────────────────────────────

#[test]
fn renames_collapse_to_new_path() {
    let mut repo = TestRepo::new().unwrap();
    repo.add_commit(
        "alice",
        "alice@x",
        "2024-03-11 10:00:00",
        "create",
        &[("old_name.py", "def work():\n    return 1\n")],
    )
    .unwrap();

    // Simulate a rename: remove the old path, add the new one with the
    // same content so git's similarity detection pairs them.
    fs::remove_file(repo.repo_path.join("old_name.py")).unwrap();
    {
        let mut index = repo.repo.index().unwrap();
        index.remove_path(Path::new("old_name.py")).unwrap();
        index.write().unwrap();
    }
    repo.add_commit(
        "alice",
        "alice@x",
        "2024-03-11 11:00:00",
        "rename",
        &[("new_name.py", "def work():\n    return 1\n")],
    )
    .unwrap();

    let result = run(&repo);
    let counts = &result.overall.productivity.commits_count;

    // The original path keeps the count it accumulated before the rename.
    assert_eq!(counts.get("old_name.py"), Some(&1));
    assert_eq!(counts.get("new_name.py"), Some(&1));
}
