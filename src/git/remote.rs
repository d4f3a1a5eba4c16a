//! Remote reachability probing and the temp-dir clone driver.

use std::path::Path;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::git::repository::{repo_name_from, MinedRepository};

/// Pre-flight reachability check: `git ls-remote <url>` with a timeout.
///
/// Returns false for unreachable or nonexistent remotes; the caller lists
/// such repositories under `failed_repositories` and keeps going.
pub fn is_remote_reachable(url: &str, timeout: Duration) -> bool {
    let child = Command::new("git")
        .args(["ls-remote", "--exit-code", url, "HEAD"])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn();

    let mut child = match child {
        Ok(child) => child,
        Err(err) => {
            warn!(url = %url, error = %err, "failed to spawn git ls-remote");
            return false;
        }
    };

    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return status.success(),
            Ok(None) => {
                if Instant::now() >= deadline {
                    let _ = child.kill();
                    let _ = child.wait();
                    debug!(url = %url, "ls-remote timed out");
                    return false;
                }
                std::thread::sleep(Duration::from_millis(50));
            }
            Err(err) => {
                warn!(url = %url, error = %err, "error waiting for git ls-remote");
                return false;
            }
        }
    }
}

/// Obtains a repository for mining: opens local paths directly, clones
/// remote URLs into `scratch_dir`.
///
/// The clone lands in a subdirectory of `scratch_dir`; the caller owns the
/// scratch directory's lifetime (a `TempDir` guard removes it on every
/// exit path).
pub fn clone_to_temp(url_or_path: &str, scratch_dir: &Path) -> Result<MinedRepository> {
    let name = repo_name_from(url_or_path);

    if Path::new(url_or_path).exists() {
        debug!(path = %url_or_path, "opening local repository");
        return MinedRepository::open_at(url_or_path);
    }

    let checkout = scratch_dir.join(&name);
    debug!(url = %url_or_path, dest = %checkout.display(), "cloning repository");
    let repo = git2::build::RepoBuilder::new()
        .clone(url_or_path, &checkout)
        .with_context(|| format!("Failed to clone {url_or_path}"))?;

    Ok(MinedRepository::from_repository(repo, name))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn unreachable_remote_is_rejected() {
        // A url that cannot resolve; the probe must come back false and
        // within the timeout rather than hanging.
        let reachable = is_remote_reachable(
            "https://invalid.invalid/nobody/nothing.git",
            Duration::from_secs(5),
        );
        assert!(!reachable);
    }
}
