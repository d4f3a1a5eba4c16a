//! The per-repository traversal driver and chunked analysis pipeline.

pub mod chunks;
pub mod output;
pub mod week;

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::git::{CommitRecord, CommitSummary, MinedRepository};
use crate::metrics::{MetricConfig, MetricSet, MetricsSnapshot};
use crate::sched::memory::MemoryMonitor;

use output::{ProcessingTotals, ReportHeader, ReportWriter};

/// Commits between memory-pressure polls.
const MEMORY_POLL_INTERVAL: u64 = 100;

/// Engine tunables.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Commit summaries buffered before a flush to disk.
    pub batch_size: usize,
    /// Memory usage percentage that triggers back-off.
    pub memory_limit_percent: f64,
    /// Free-memory floor in megabytes.
    pub memory_floor_mb: u64,
    /// Emit weekly buckets (otherwise a single overall bucket).
    pub weekly: bool,
    /// Accumulator tunables.
    pub metric: MetricConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            batch_size: 1_000,
            memory_limit_percent: 85.0,
            memory_floor_mb: 1_000,
            weekly: true,
            metric: MetricConfig::default(),
        }
    }
}

/// Catalog identity of the repository being analyzed.
#[derive(Debug, Clone)]
pub struct RepoContext {
    /// Organization or user owning the repository.
    pub project_name: String,
    /// Clone URL or local path.
    pub repository_url: String,
    /// Short repository name.
    pub repository_name: String,
    /// Ecosystem label.
    pub ecosystem: String,
    /// Category label.
    pub repo_category: String,
}

/// Result of one traversal pass (whole history or one chunk).
pub struct TraversalResult {
    /// Overall-bucket snapshot.
    pub overall: MetricsSnapshot,
    /// Weekly-bucket snapshots keyed by Monday date.
    pub weekly: BTreeMap<String, MetricsSnapshot>,
    /// Commit and line totals.
    pub totals: ProcessingTotals,
}

/// Result of a full repository analysis.
pub struct RepoAnalysis {
    /// Path of the written artifact.
    pub artifact_path: PathBuf,
    /// Merged weekly snapshots.
    pub weekly: BTreeMap<String, MetricsSnapshot>,
    /// Merged overall snapshot.
    pub overall: MetricsSnapshot,
    /// Commit and line totals.
    pub totals: ProcessingTotals,
}

/// Walks the commits of `repo` in `[since, to]` chronologically, feeding
/// every accumulator and handing batched commit summaries to `on_batch`.
///
/// Memory is polled every 100 commits; when over the limit the traversal
/// blocks until usage drops. `cancel` is honored between batches: the
/// in-flight commit always completes.
pub fn traverse(
    repo: &MinedRepository,
    config: &EngineConfig,
    since: Option<NaiveDateTime>,
    to: Option<NaiveDateTime>,
    monitor: &mut MemoryMonitor,
    cancel: &AtomicBool,
    mut on_batch: impl FnMut(&[Value]) -> Result<()>,
) -> Result<TraversalResult> {
    // First pass: count, so progress can be reported.
    let ids = repo.commit_ids_in_range(since, to)?;
    let total = ids.len();
    info!(repo = %repo.name(), commits = total, "traversing repository");

    let mut overall = MetricSet::new(&config.metric);
    let mut weekly: BTreeMap<String, MetricSet> = BTreeMap::new();
    let mut totals = ProcessingTotals::default();

    let head_branch = repo.head_branch();
    let mut batch: Vec<Value> = Vec::with_capacity(config.batch_size);
    let mut processed = 0u64;

    for oid in ids {
        let commit = repo
            .repository()
            .find_commit(oid)
            .context("Failed to find commit during traversal")?;

        let summary = match CommitRecord::from_git_commit(
            repo.repository(),
            &commit,
            repo.name(),
            &head_branch,
        ) {
            Ok(record) => {
                totals.total_lines_added += record.insertions;
                totals.total_lines_removed += record.deletions;

                overall.process_commit(&record);
                if config.weekly {
                    let key = week::week_key(record.committer_date);
                    weekly
                        .entry(key)
                        .or_insert_with(|| MetricSet::new(&config.metric))
                        .process_commit(&record);
                }
                CommitSummary::Full(Box::new(record))
            }
            Err(err) if err.is_per_commit() => {
                warn!(hash = %commit.id(), error = %err, "degrading commit record");
                CommitSummary::degraded(&commit, &err)
            }
            Err(err) => return Err(err).context("Unrecoverable extraction failure"),
        };

        totals.total_commits += 1;
        batch.push(serde_json::to_value(&summary)?);
        processed += 1;

        if processed % MEMORY_POLL_INTERVAL == 0 && monitor.over_limit(config.memory_limit_percent)
        {
            warn!(
                processed,
                total, "memory pressure during traversal, waiting"
            );
            monitor.block_until_released(config.memory_limit_percent, config.memory_floor_mb);
        }

        if batch.len() >= config.batch_size {
            on_batch(&batch)?;
            batch.clear();
            if cancel.load(Ordering::Relaxed) {
                debug!(processed, "traversal cancelled between batches");
                break;
            }
        }
    }

    if !batch.is_empty() {
        on_batch(&batch)?;
    }

    Ok(TraversalResult {
        overall: overall.snapshot(),
        weekly: weekly.iter().map(|(k, set)| (k.clone(), set.snapshot())).collect(),
        totals,
    })
}

/// Analyzes one repository end to end and writes its artifact.
///
/// Large histories (500+ commits) are split into date chunks, traversed
/// independently into per-chunk JSONL files, then spliced and merged.
pub fn analyze_repository(
    ctx: &RepoContext,
    repo: &MinedRepository,
    config: &EngineConfig,
    since: Option<NaiveDateTime>,
    to: Option<NaiveDateTime>,
    output_path: &Path,
    cancel: &AtomicBool,
) -> Result<RepoAnalysis> {
    let mut monitor = MemoryMonitor::new();

    // Resolve the window for full-history runs so chunking and weekly
    // bucketing have concrete bounds.
    let full_history = since.is_none() && to.is_none();
    let (since, to) = match (since, to) {
        (Some(s), Some(t)) => (Some(s), Some(t)),
        _ => match repo.date_range()? {
            Some((min, max)) => (since.or(Some(min)), to.or(Some(max))),
            None => (since, to),
        },
    };

    let header = ReportHeader {
        project_name: ctx.project_name.clone(),
        repository_url: ctx.repository_url.clone(),
        repository_name: ctx.repository_name.clone(),
        ecosystem: ctx.ecosystem.clone(),
        repo_category: ctx.repo_category.clone(),
        start_date: since.map(|d| d.format("%Y-%m-%d").to_string()),
        end_date: to.map(|d| d.format("%Y-%m-%d").to_string()),
        full_history,
    };

    let commit_count = repo.count_commits(since, to)?;
    let mut writer = ReportWriter::create(output_path, &header)?;

    let (overall, weekly, totals) = if chunks::should_split(commit_count) {
        let (Some(since), Some(to)) = (since, to) else {
            anyhow::bail!("cannot chunk a repository without a resolvable date range");
        };

        let n = chunks::chunk_count(commit_count);
        let ranges = chunks::split_date_range(since, to, n);
        info!(repo = %ctx.repository_name, chunks = ranges.len(), "processing large repository in chunks");

        let scratch = tempfile::tempdir().context("Failed to create chunk scratch directory")?;
        let mut chunk_files = Vec::new();
        let mut chunk_overall = Vec::new();
        let mut weekly_parts: BTreeMap<String, Vec<MetricsSnapshot>> = BTreeMap::new();
        let mut totals = ProcessingTotals::default();

        for (chunk_start, chunk_end) in ranges {
            if cancel.load(Ordering::Relaxed) {
                break;
            }

            let id = chunks::chunk_id(chunk_start, chunk_end);
            let chunk_path = scratch.path().join(format!("commits_{id}.jsonl"));
            debug!(chunk = %id, "processing chunk");

            let file = File::create(&chunk_path)
                .with_context(|| format!("Failed to create chunk file: {}", chunk_path.display()))?;
            let mut chunk_out = BufWriter::new(file);

            let outcome = traverse(
                repo,
                config,
                Some(chunk_start),
                Some(chunk_end),
                &mut monitor,
                cancel,
                |batch| {
                    for value in batch {
                        writeln!(chunk_out, "{}", serde_json::to_string(value)?)?;
                    }
                    Ok(())
                },
            );
            let result = match outcome {
                Ok(result) => result,
                Err(err) => {
                    // A broken chunk is dropped; the other chunks still
                    // produce a usable (if partial) artifact.
                    warn!(chunk = %id, error = %err, "dropping unreadable chunk result");
                    continue;
                }
            };
            chunk_out.flush()?;

            totals.total_commits += result.totals.total_commits;
            totals.total_lines_added += result.totals.total_lines_added;
            totals.total_lines_removed += result.totals.total_lines_removed;

            chunk_overall.push(result.overall);
            for (week, snapshot) in result.weekly {
                weekly_parts.entry(week).or_default().push(snapshot);
            }
            chunk_files.push(chunk_path);
        }

        // Splice the chunk commit files into the artifact in order.
        for chunk_path in &chunk_files {
            let file = File::open(chunk_path)
                .with_context(|| format!("Failed to reopen chunk file: {}", chunk_path.display()))?;
            for line in BufReader::new(file).lines() {
                let line = line?;
                if !line.trim().is_empty() {
                    writer.write_commit_raw(&line)?;
                }
            }
        }

        let overall = MetricsSnapshot::merge(&chunk_overall);
        let weekly: BTreeMap<String, MetricsSnapshot> = weekly_parts
            .into_iter()
            .map(|(week, parts)| (week, MetricsSnapshot::merge(&parts)))
            .collect();

        (overall, weekly, totals)
    } else {
        let result = traverse(repo, config, since, to, &mut monitor, cancel, |batch| {
            writer.write_commit_batch(batch)
        })?;
        (result.overall, result.weekly, result.totals)
    };

    let (process_metrics, metrics_type) = if config.weekly {
        let mut map = serde_json::Map::new();
        for (week, snapshot) in &weekly {
            map.insert(week.clone(), serde_json::to_value(snapshot)?);
        }
        let developer_stats = crate::report::developer_stats(&weekly);
        map.insert(
            "developer_stats".to_string(),
            serde_json::to_value(&developer_stats)?,
        );
        (Value::Object(map), "weekly")
    } else {
        (serde_json::to_value(&overall)?, "overall")
    };

    let artifact_path = writer.finish(&process_metrics, metrics_type, totals)?;
    info!(
        repo = %ctx.repository_name,
        commits = totals.total_commits,
        artifact = %artifact_path.display(),
        "repository analysis complete"
    );

    Ok(RepoAnalysis {
        artifact_path,
        weekly,
        overall,
        totals,
    })
}
