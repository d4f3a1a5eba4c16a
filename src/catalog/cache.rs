//! Resume caches: completed users and processed repository URLs.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, warn};

/// The `completed_users.json` list in the output root.
#[derive(Debug)]
pub struct CompletedUsers {
    path: PathBuf,
    names: Vec<String>,
}

impl CompletedUsers {
    /// Loads the list, treating a missing or unreadable file as empty.
    pub fn load(output_root: &Path) -> Self {
        let path = output_root.join("completed_users.json");
        let names = match std::fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text).unwrap_or_else(|err| {
                warn!(path = %path.display(), error = %err, "ignoring corrupt completed-users file");
                Vec::new()
            }),
            Err(_) => Vec::new(),
        };
        debug!(entries = names.len(), "completed-users cache loaded");
        Self { path, names }
    }

    /// True iff the user was already fully processed.
    pub fn contains(&self, username: &str) -> bool {
        self.names.iter().any(|n| n == username)
    }

    /// Records a user as completed and persists the list.
    pub fn record(&mut self, username: &str) -> Result<()> {
        if !self.contains(username) {
            self.names.push(username.to_string());
        }
        let text = serde_json::to_string_pretty(&self.names)?;
        std::fs::write(&self.path, text)
            .with_context(|| format!("Failed to write {}", self.path.display()))?;
        Ok(())
    }
}

/// The `processed_files.json` map (`md5(url) → url`) in the cache dir.
#[derive(Debug)]
pub struct ProcessedFilesCache {
    path: PathBuf,
    entries: HashMap<String, String>,
}

impl ProcessedFilesCache {
    /// Loads the cache, treating a missing or unreadable file as empty.
    pub fn load(cache_dir: &Path) -> Self {
        let path = cache_dir.join("processed_files.json");
        let entries = match std::fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text).unwrap_or_else(|err| {
                warn!(path = %path.display(), error = %err, "ignoring corrupt processed-files cache");
                HashMap::new()
            }),
            Err(_) => HashMap::new(),
        };
        debug!(entries = entries.len(), "processed-files cache loaded");
        Self { path, entries }
    }

    /// Cache key of a repository URL.
    pub fn key_of(url: &str) -> String {
        format!("{:x}", md5::compute(url.as_bytes()))
    }

    /// True iff the URL was already processed.
    pub fn contains(&self, url: &str) -> bool {
        self.entries.contains_key(&Self::key_of(url))
    }

    /// Records a URL as processed and persists the map.
    pub fn record(&mut self, url: &str) -> Result<()> {
        self.entries.insert(Self::key_of(url), url.to_string());
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create cache dir: {}", parent.display()))?;
        }
        let text = serde_json::to_string_pretty(&self.entries)?;
        std::fs::write(&self.path, text)
            .with_context(|| format!("Failed to write {}", self.path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn completed_users_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = CompletedUsers::load(dir.path());
        assert!(!cache.contains("acme"));
        cache.record("acme").unwrap();

        let reloaded = CompletedUsers::load(dir.path());
        assert!(reloaded.contains("acme"));
        assert!(!reloaded.contains("other"));
    }

    #[test]
    fn processed_files_keyed_by_url_hash() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = ProcessedFilesCache::load(dir.path());
        let url = "https://example.com/acme/widgets.git";
        assert!(!cache.contains(url));
        cache.record(url).unwrap();

        let reloaded = ProcessedFilesCache::load(dir.path());
        assert!(reloaded.contains(url));
        assert!(!reloaded.contains("https://example.com/other.git"));
    }

    #[test]
    fn corrupt_cache_treated_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("processed_files.json"), "not json").unwrap();
        let cache = ProcessedFilesCache::load(dir.path());
        assert!(!cache.contains("anything"));
    }
}
