//! Repo command — mines a single repository into one JSON artifact.

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;

use anyhow::{Context, Result};
use clap::Parser;

use crate::config::Settings;
use crate::engine::{analyze_repository, RepoContext};
use crate::git::commit::parse_date;
use crate::git::remote::clone_to_temp;

/// Repo command options.
#[derive(Parser)]
pub struct RepoCommand {
    /// Repository clone URL or local path.
    #[arg(value_name = "URL_OR_PATH")]
    pub source: String,

    /// Output directory (defaults to the configured output root).
    #[arg(long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Start of the analysis window, `YYYY-MM-DD`.
    #[arg(long, value_name = "DATE")]
    pub since: Option<String>,

    /// End of the analysis window, `YYYY-MM-DD`.
    #[arg(long, value_name = "DATE")]
    pub to: Option<String>,

    /// Project (owner) name recorded in the artifact.
    #[arg(long, default_value = "standalone")]
    pub project: String,

    /// Ecosystem label recorded in the artifact.
    #[arg(long, default_value = "unknown")]
    pub ecosystem: String,

    /// Category label recorded in the artifact.
    #[arg(long, default_value = "other")]
    pub category: String,

    /// Settings file path.
    #[arg(long, value_name = "FILE")]
    pub settings: Option<PathBuf>,

    /// Emit a single overall bucket instead of weekly buckets.
    #[arg(long)]
    pub overall: bool,
}

impl RepoCommand {
    /// Executes the repo command.
    pub fn execute(self) -> Result<()> {
        let settings_path = self.settings.clone().unwrap_or_else(Settings::default_path);
        let mut settings = Settings::load_or_default(&settings_path)?;
        if self.overall {
            settings.weekly = false;
        }

        let output_root = self.output.clone().unwrap_or_else(|| settings.output_root.clone());
        std::fs::create_dir_all(&output_root)
            .with_context(|| format!("Failed to create output root: {}", output_root.display()))?;

        let since = self.since.as_deref().map(parse_date).transpose()?;
        let to = self.to.as_deref().map(parse_date).transpose()?;

        // Temp clone removed on every exit path by the guard.
        let scratch = match &settings.scratch_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir)?;
                tempfile::tempdir_in(dir)?
            }
            None => tempfile::tempdir()?,
        };

        let repo = clone_to_temp(&self.source, scratch.path())?;

        let ctx = RepoContext {
            project_name: self.project.clone(),
            repository_url: self.source.clone(),
            repository_name: repo.name().to_string(),
            ecosystem: self.ecosystem.clone(),
            repo_category: self.category.clone(),
        };

        let timeframe = match (since, to) {
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
            ctx.project_name, ctx.repository_name, timeframe
        ));

        let cancel = AtomicBool::new(false);
        let analysis = analyze_repository(
            &ctx,
            &repo,
            &settings.engine_config(),
            since,
            to,
            &artifact,
            &cancel,
        )?;

        println!("{}", analysis.artifact_path.display());
        Ok(())
    }
}
