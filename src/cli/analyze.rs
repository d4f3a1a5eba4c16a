//! Analyze command — mines every repository of a CSV catalog through the
//! memory-aware scheduler and writes the per-developer report.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use crate::catalog::{read_catalog, CatalogEntry, CompletedUsers, ProcessedFilesCache};
use crate::config::Settings;
use crate::engine::{analyze_repository, RepoContext};
use crate::git::commit::parse_date;
use crate::git::remote::{clone_to_temp, is_remote_reachable};
use crate::metrics::MetricsSnapshot;
use crate::report::{aggregate_repositories, OrgReport};
use crate::sched::Scheduler;

/// Result of one repository job, feeding the cross-repo report.
struct RepoOutcome {
    username: String,
    url: String,
    weekly: BTreeMap<String, MetricsSnapshot>,
}

/// Analyze command options.
#[derive(Parser)]
pub struct AnalyzeCommand {
    /// Catalog CSV with `username,repo_name,url` rows.
    #[arg(value_name = "CATALOG")]
    pub catalog: PathBuf,

    /// Output directory (defaults to the configured output root).
    #[arg(long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Start of the analysis window, `YYYY-MM-DD`.
    #[arg(long, value_name = "DATE")]
    pub since: Option<String>,

    /// End of the analysis window, `YYYY-MM-DD`.
    #[arg(long, value_name = "DATE")]
    pub to: Option<String>,

    /// Worker thread count override.
    #[arg(long, value_name = "N")]
    pub jobs: Option<usize>,

    /// Ecosystem label recorded in the artifacts.
    #[arg(long, default_value = "unknown")]
    pub ecosystem: String,

    /// Settings file path.
    #[arg(long, value_name = "FILE")]
    pub settings: Option<PathBuf>,

    /// Reprocess repositories even when the resume caches list them.
    #[arg(long)]
    pub no_resume: bool,
}

impl AnalyzeCommand {
    /// Executes the analyze command.
    pub fn execute(self) -> Result<()> {
        let settings_path = self.settings.clone().unwrap_or_else(Settings::default_path);
        let mut settings = Settings::load_or_default(&settings_path)?;
        if let Some(jobs) = self.jobs {
            settings.max_workers = Some(jobs);
        }

        let output_root = self.output.clone().unwrap_or_else(|| settings.output_root.clone());
        std::fs::create_dir_all(&output_root)
            .with_context(|| format!("Failed to create output root: {}", output_root.display()))?;
        let cache_dir = output_root.join("cache");

        let since = self.since.as_deref().map(parse_date).transpose()?;
        let to = self.to.as_deref().map(parse_date).transpose()?;

        let entries = read_catalog(&self.catalog)?;
        if entries.is_empty() {
            warn!("catalog contains no usable rows");
            return Ok(());
        }

        let mut completed_users = CompletedUsers::load(&output_root);
        let mut processed = ProcessedFilesCache::load(&cache_dir);

        let mut failed_repositories: Vec<String> = Vec::new();
        let mut pending: Vec<CatalogEntry> = Vec::new();

        let probe_timeout = Duration::from_secs(settings.reachability_timeout_secs);
        for entry in entries {
            if !self.no_resume
                && (completed_users.contains(&entry.username) || processed.contains(&entry.url))
            {
                info!(repo = %entry.repo_name, "skipping already-processed repository");
                continue;
            }
            // Local paths need no network probe.
            if !Path::new(&entry.url).exists() && !is_remote_reachable(&entry.url, probe_timeout) {
                warn!(url = %entry.url, "repository unreachable, recording as failed");
                failed_repositories.push(entry.url.clone());
                continue;
            }
            pending.push(entry);
        }

        if pending.is_empty() && failed_repositories.is_empty() {
            info!("nothing to do");
            return Ok(());
        }

        let engine_config = Arc::new(settings.engine_config());
        let scratch_root = Arc::new(settings.scratch_dir.clone());
        let output_root_arc = Arc::new(output_root.clone());
        let ecosystem = Arc::new(self.ecosystem.clone());

        let mut scheduler: Scheduler<RepoOutcome> = Scheduler::new(settings.scheduler_config());
        let cancel = scheduler.cancel_flag();

        let total = pending.len() as i64;
        for (index, entry) in pending.iter().enumerate() {
            let entry = entry.clone();
            let engine_config = Arc::clone(&engine_config);
            let scratch_root = Arc::clone(&scratch_root);
            let output_root = Arc::clone(&output_root_arc);
            let ecosystem = Arc::clone(&ecosystem);
            let cancel = Arc::clone(&cancel);
            let window = (since, to);

            // Earlier catalog rows start first. The URL is the job id so
            // permanent failures land in `failed_repositories` verbatim.
            let priority = total - index as i64;
            let job_id = entry.url.clone();

            scheduler.submit(job_id, priority, 250, move || {
                let scratch = match scratch_root.as_ref() {
                    Some(dir) => {
                        std::fs::create_dir_all(dir)?;
                        tempfile::tempdir_in(dir)?
                    }
                    None => tempfile::tempdir()?,
                };

                let repo = clone_to_temp(&entry.url, scratch.path())?;
                let ctx = RepoContext {
                    project_name: entry.username.clone(),
                    repository_url: entry.url.clone(),
                    repository_name: entry.repo_name.clone(),
                    ecosystem: ecosystem.as_ref().clone(),
                    repo_category: "organization".to_string(),
                };

                let timeframe = match window {
                    (Some(s), Some(t)) => format!(
                        "{}_{}_to_{}_{}",
                        s.format("%Y"),
                        s.format("%m"),
                        t.format("%Y"),
                        t.format("%m")
                    ),
                    _ => "full_history".to_string(),
                };
                let artifact = output_root.join(format!(
                    "{}_{}_{}_analysis.json",
                    entry.username, entry.repo_name, timeframe
                ));

                let analysis = analyze_repository(
                    &ctx,
                    &repo,
                    &engine_config,
                    window.0,
                    window.1,
                    &artifact,
                    &cancel,
                )?;

                Ok(RepoOutcome {
                    username: entry.username.clone(),
                    url: entry.url.clone(),
                    weekly: analysis.weekly,
                })
            });
        }

        scheduler.start();
        scheduler.wait_idle();
        scheduler.stop(true);

        for (job_id, error) in scheduler.failed() {
            warn!(job = %job_id, error = %error, "repository failed permanently");
            failed_repositories.push(job_id);
        }

        let outcomes: Vec<RepoOutcome> = scheduler.take_completed().into_values().collect();

        // Persist the resume caches: every processed URL, and each user
        // whose repositories all completed.
        let mut repos_by_user: BTreeMap<String, usize> = BTreeMap::new();
        for entry in &pending {
            *repos_by_user.entry(entry.username.clone()).or_insert(0) += 1;
        }
        let mut completed_by_user: BTreeMap<String, usize> = BTreeMap::new();
        for outcome in &outcomes {
            processed.record(&outcome.url)?;
            *completed_by_user.entry(outcome.username.clone()).or_insert(0) += 1;
        }
        for (username, total) in &repos_by_user {
            if completed_by_user.get(username) == Some(total) {
                completed_users.record(username)?;
            }
        }

        let weekly_maps: Vec<BTreeMap<String, MetricsSnapshot>> =
            outcomes.into_iter().map(|o| o.weekly).collect();
        let report = OrgReport {
            developer_stats: aggregate_repositories(&weekly_maps),
            failed_repositories,
        };

        let report_path = output_root.join("developer_report.json");
        std::fs::write(&report_path, serde_json::to_string_pretty(&report)?)
            .with_context(|| format!("Failed to write report: {}", report_path.display()))?;

        info!(
            repos = weekly_maps.len(),
            failed = report.failed_repositories.len(),
            report = %report_path.display(),
            "catalog analysis complete"
        );
        println!("{}", report_path.display());
        Ok(())
    }
}
