//! CLI interface for gitmine

use anyhow::Result;
use clap::{Parser, Subcommand};

pub mod analyze;
pub mod repo;

/// gitmine: a Git repository mining toolkit
#[derive(Parser)]
#[command(name = "gitmine")]
#[command(about = "Mine Git repositories into per-week software-process metrics", long_about = None)]
#[command(version)]
pub struct Cli {
    /// The main command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Main command categories
#[derive(Subcommand)]
pub enum Commands {
    /// Analyze every repository listed in a CSV catalog
    Analyze(analyze::AnalyzeCommand),
    /// Analyze a single repository by URL or local path
    Repo(repo::RepoCommand),
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        match self.command {
            Commands::Analyze(analyze_cmd) => analyze_cmd.execute(),
            Commands::Repo(repo_cmd) => repo_cmd.execute(),
        }
    }
}
