//! Repository handle and chronological commit walking.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use git2::{Oid, Repository, Sort};
use tracing::debug;

use crate::git::commit::naive_utc;

/// A repository opened (or cloned) for mining.
pub struct MinedRepository {
    repo: Repository,
    /// Short name derived from the URL or directory.
    name: String,
}

impl MinedRepository {
    /// Opens a repository at a local path.
    pub fn open_at<P: AsRef<Path>>(path: P) -> Result<Self> {
        let name = repo_name_from(&path.as_ref().to_string_lossy());
        let repo = Repository::open(path).context("Failed to open git repository")?;
        Ok(Self { repo, name })
    }

    /// Wraps an already opened repository (used by the clone driver).
    pub fn from_repository(repo: Repository, name: String) -> Self {
        Self { repo, name }
    }

    /// Short repository name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Local working directory (or gitdir for bare clones).
    pub fn path(&self) -> PathBuf {
        self.repo
            .workdir()
            .unwrap_or_else(|| self.repo.path())
            .to_path_buf()
    }

    /// Access to the underlying git2 repository.
    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    /// Shorthand of the walked head branch, when resolvable.
    pub fn head_branch(&self) -> String {
        self.repo
            .head()
            .ok()
            .and_then(|h| h.shorthand().map(str::to_string))
            .unwrap_or_else(|| "HEAD".to_string())
    }

    /// Commit ids reachable from HEAD in non-decreasing committer-date
    /// order, filtered to `[since, to]` on the naive-UTC committer date.
    pub fn commit_ids_in_range(
        &self,
        since: Option<NaiveDateTime>,
        to: Option<NaiveDateTime>,
    ) -> Result<Vec<Oid>> {
        let mut walker = self.repo.revwalk().context("Failed to create revwalk")?;
        walker.push_head().context("Failed to push HEAD")?;
        walker
            .set_sorting(Sort::TIME | Sort::REVERSE)
            .context("Failed to set revwalk sorting")?;

        let mut ids = Vec::new();
        for oid in walker {
            let oid = oid.context("Failed to read commit from walker")?;
            let commit = self.repo.find_commit(oid).context("Failed to find commit")?;
            let when = naive_utc(&commit.time());
            if let Some(since) = since {
                if when < since {
                    continue;
                }
            }
            if let Some(to) = to {
                if when > to {
                    continue;
                }
            }
            ids.push(oid);
        }

        debug!(repo = %self.name, commits = ids.len(), "collected commit range");
        Ok(ids)
    }

    /// Number of commits in `[since, to]`; the first of the two passes the
    /// traversal driver makes over the history.
    pub fn count_commits(
        &self,
        since: Option<NaiveDateTime>,
        to: Option<NaiveDateTime>,
    ) -> Result<usize> {
        Ok(self.commit_ids_in_range(since, to)?.len())
    }

    /// Minimum and maximum committer dates across the whole history.
    ///
    /// Used for full-history runs where no `--since/--to` was given.
    pub fn date_range(&self) -> Result<Option<(NaiveDateTime, NaiveDateTime)>> {
        let mut walker = self.repo.revwalk().context("Failed to create revwalk")?;
        walker.push_head().context("Failed to push HEAD")?;

        let mut min: Option<NaiveDateTime> = None;
        let mut max: Option<NaiveDateTime> = None;
        for oid in walker {
            let oid = oid.context("Failed to read commit from walker")?;
            let commit = self.repo.find_commit(oid).context("Failed to find commit")?;
            let when = naive_utc(&commit.time());
            min = Some(min.map_or(when, |m| m.min(when)));
            max = Some(max.map_or(when, |m| m.max(when)));
        }
        Ok(min.zip(max))
    }
}

/// Derives a short repository name from a URL or filesystem path.
pub fn repo_name_from(url_or_path: &str) -> String {
    let trimmed = url_or_path.trim_end_matches('/');
    let tail = trimmed.rsplit('/').next().unwrap_or(trimmed);
    tail.trim_end_matches(".git").to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn repo_name_from_url() {
        assert_eq!(repo_name_from("https://github.com/org/proj.git"), "proj");
        assert_eq!(repo_name_from("https://github.com/org/proj"), "proj");
        assert_eq!(repo_name_from("/tmp/work/checkout/"), "checkout");
        assert_eq!(repo_name_from("plain"), "plain");
    }
}
