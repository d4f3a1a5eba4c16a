//! Typed errors for the extraction layer.
//!
//! Every "skip" path in the spec surfaces as a variant here instead of a
//! string match on a message, so callers can decide between degrading a
//! commit record and dropping a single file.

use thiserror::Error;

/// Errors raised while turning a git2 commit into a [`super::CommitRecord`].
#[derive(Error, Debug)]
pub enum ExtractError {
    /// The commit references a submodule with a broken configuration.
    #[error("git submodule configuration issue")]
    SubmoduleConfig(#[source] git2::Error),

    /// A blob exceeded the per-file size cap and the file was dropped.
    #[error("source blob too large ({size} bytes): {path}")]
    OversizeBlob {
        /// Path of the offending file.
        path: String,
        /// Blob size in bytes.
        size: usize,
    },

    /// Any other libgit2 failure while reading trees or diffs.
    #[error("git error: {0}")]
    Git(#[from] git2::Error),
}

impl ExtractError {
    /// Classifies a raw git2 error into the skip taxonomy.
    pub fn from_git(err: git2::Error) -> Self {
        if err.class() == git2::ErrorClass::Submodule || err.class() == git2::ErrorClass::Config {
            ExtractError::SubmoduleConfig(err)
        } else {
            ExtractError::Git(err)
        }
    }

    /// True when the error degrades a single commit rather than the repo.
    pub fn is_per_commit(&self) -> bool {
        matches!(self, ExtractError::SubmoduleConfig(_))
    }
}
