//! Settings file loading for the mining engine.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Engine settings, loadable from a JSON file.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    /// Directory receiving artifacts and the resume caches.
    #[serde(default = "default_output_root")]
    pub output_root: PathBuf,

    /// Directory for temp clones; a per-run subdirectory is created and
    /// removed on exit.
    #[serde(default)]
    pub scratch_dir: Option<PathBuf>,

    /// Commit summaries buffered before a flush to disk.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Memory usage percentage that triggers back-off in a traversal.
    #[serde(default = "default_memory_limit")]
    pub memory_limit_percent: f64,

    /// Memory usage percentage that closes the scheduler's admission gate.
    #[serde(default = "default_scheduler_memory_limit")]
    pub scheduler_memory_percent: f64,

    /// Free-memory floor in megabytes.
    #[serde(default = "default_memory_floor")]
    pub min_free_memory_mb: u64,

    /// Worker thread count; `None` means `cpus - 1`, capped at 4.
    #[serde(default)]
    pub max_workers: Option<usize>,

    /// Timeout for the `git ls-remote` reachability probe, in seconds.
    #[serde(default = "default_clone_timeout")]
    pub reachability_timeout_secs: u64,

    /// Fraction of the add/delete overlap treated as an in-place edit by
    /// the diff-delta metric.
    #[serde(default = "default_update_overlap")]
    pub update_overlap_factor: f64,

    /// Emit weekly buckets (otherwise a single overall bucket).
    #[serde(default = "default_true")]
    pub weekly: bool,
}

fn default_output_root() -> PathBuf {
    PathBuf::from("output")
}
fn default_batch_size() -> usize {
    1_000
}
fn default_memory_limit() -> f64 {
    85.0
}
fn default_scheduler_memory_limit() -> f64 {
    75.0
}
fn default_memory_floor() -> u64 {
    1_000
}
fn default_clone_timeout() -> u64 {
    5
}
fn default_update_overlap() -> f64 {
    0.8
}
fn default_true() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            output_root: default_output_root(),
            scratch_dir: None,
            batch_size: default_batch_size(),
            memory_limit_percent: default_memory_limit(),
            scheduler_memory_percent: default_scheduler_memory_limit(),
            min_free_memory_mb: default_memory_floor(),
            max_workers: None,
            reachability_timeout_secs: default_clone_timeout(),
            update_overlap_factor: default_update_overlap(),
            weekly: default_true(),
        }
    }
}

impl Settings {
    /// Default settings path (`~/.config/gitmine/settings.json`).
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("gitmine")
            .join("settings.json")
    }

    /// Loads settings from `path`, or the defaults when the file does not
    /// exist.
    pub fn load_or_default(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file: {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse settings file: {}", path.display()))
    }

    /// Saves settings to `path`, creating parent directories.
    pub fn save(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create settings directory: {parent:?}"))?;
        }
        let content = serde_json::to_string_pretty(self).context("Failed to serialize settings")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write settings file: {}", path.display()))?;
        Ok(())
    }

    /// Translates settings into the engine configuration.
    pub fn engine_config(&self) -> crate::engine::EngineConfig {
        crate::engine::EngineConfig {
            batch_size: self.batch_size,
            memory_limit_percent: self.memory_limit_percent,
            memory_floor_mb: self.min_free_memory_mb,
            weekly: self.weekly,
            metric: crate::metrics::MetricConfig {
                update_overlap_factor: self.update_overlap_factor,
            },
        }
    }

    /// Translates settings into the scheduler configuration.
    pub fn scheduler_config(&self) -> crate::sched::SchedulerConfig {
        let default = crate::sched::SchedulerConfig::default();
        crate::sched::SchedulerConfig {
            max_workers: self.max_workers.unwrap_or(default.max_workers),
            max_memory_percent: self.scheduler_memory_percent,
            min_free_memory_mb: self.min_free_memory_mb,
        }
    }
}
