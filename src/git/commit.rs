//! Commit and modified-file extraction from git2 diffs.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime};
use git2::{Commit, Delta, DiffFindOptions, DiffOptions, Patch, Repository};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::git::error::ExtractError;

/// Source blobs above this size are dropped from `modified_files` entirely.
pub const MAX_BLOB_BYTES: usize = 5 * 1024 * 1024;

/// Source blobs above this size are counted but their text is not stored.
pub const MAX_STORED_SOURCE_BYTES: usize = 1024 * 1024;

/// An author or committer identity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Identity {
    /// Display name as recorded in the commit.
    pub name: String,
    /// Email address as recorded in the commit.
    pub email: String,
}

impl Identity {
    /// Canonical developer key: trimmed, lower-cased email.
    pub fn canonical_email(&self) -> String {
        self.email.trim().to_lowercase()
    }
}

/// How a file changed in a commit.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeType {
    /// File created in this commit.
    Add,
    /// File removed in this commit.
    Delete,
    /// File content changed in place.
    Modify,
    /// File moved; `old_path` and `new_path` differ.
    Rename,
    /// File duplicated from another path.
    Copy,
    /// Any other libgit2 delta status (typechange, unreadable, ...).
    Other,
}

impl From<Delta> for ChangeType {
    fn from(delta: Delta) -> Self {
        match delta {
            Delta::Added => ChangeType::Add,
            Delta::Deleted => ChangeType::Delete,
            Delta::Modified => ChangeType::Modify,
            Delta::Renamed => ChangeType::Rename,
            Delta::Copied => ChangeType::Copy,
            _ => ChangeType::Other,
        }
    }
}

/// Added and deleted lines of one file's diff, with their line numbers.
///
/// Added lines carry new-file line numbers, deleted lines old-file ones.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiffParsed {
    /// `(new_line_no, text)` for every `+` line.
    pub added: Vec<(u32, String)>,
    /// `(old_line_no, text)` for every `-` line.
    pub deleted: Vec<(u32, String)>,
}

/// One file modified by a commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModifiedFile {
    /// Path before the change, when it existed.
    pub old_path: Option<String>,
    /// Path after the change, when it still exists.
    pub new_path: Option<String>,
    /// Basename of the file after the change.
    pub filename: String,
    /// Kind of modification.
    pub change_type: ChangeType,
    /// Unified diff body (hunk headers and `+`/`-`/context lines only).
    pub diff: String,
    /// Parsed added/deleted lines.
    pub diff_parsed: DiffParsed,
    /// Number of added lines.
    pub added_lines: u64,
    /// Number of deleted lines.
    pub deleted_lines: u64,
    /// File content after the change, when small enough to keep.
    pub source_code: Option<String>,
    /// File content before the change, when small enough to keep.
    pub source_code_before: Option<String>,
    /// Method inventory. Always empty: no AST analysis is performed.
    pub methods: Vec<String>,
    /// Changed-method inventory. Always empty: no AST analysis is performed.
    pub changed_methods: Vec<String>,
    /// Non-comment lines of code. Not computed.
    pub nloc: Option<u64>,
    /// Cyclomatic complexity. Not computed.
    pub complexity: Option<u64>,
    /// Token count. Not computed.
    pub token_count: Option<u64>,
}

impl ModifiedFile {
    /// The path used for file identity: new path, else old path.
    pub fn path(&self) -> &str {
        self.new_path
            .as_deref()
            .or(self.old_path.as_deref())
            .unwrap_or(&self.filename)
    }
}

/// A fully extracted commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitRecord {
    /// Full SHA-1 hash.
    pub hash: String,
    /// Complete commit message.
    pub msg: String,
    /// Author identity.
    pub author: Identity,
    /// Committer identity.
    pub committer: Identity,
    /// Author date, naive UTC.
    pub author_date: NaiveDateTime,
    /// Committer date, naive UTC.
    pub committer_date: NaiveDateTime,
    /// Branches known to contain the commit (the walked head).
    pub branches: Vec<String>,
    /// Whether the commit is on the walked main branch.
    pub in_main_branch: bool,
    /// True for merge commits.
    pub merge: bool,
    /// Parent hashes.
    pub parents: Vec<String>,
    /// Name of the project the commit belongs to.
    pub project_name: String,
    /// Local path of the repository.
    pub project_path: String,
    /// Total inserted lines across the diff.
    pub insertions: u64,
    /// Total deleted lines across the diff.
    pub deletions: u64,
    /// `insertions + deletions`.
    pub lines: u64,
    /// Number of files touched.
    pub files: u64,
    /// Per-file modifications.
    pub modified_files: Vec<ModifiedFile>,
}

impl CommitRecord {
    /// Canonical developer key of the author.
    pub fn author_key(&self) -> String {
        self.author.canonical_email()
    }

    /// Extracts a full record from a git2 commit.
    ///
    /// Oversize blobs drop their file from `modified_files` (the diff
    /// totals still count them); submodule configuration failures surface
    /// as [`ExtractError::SubmoduleConfig`] so the caller can degrade the
    /// commit instead of failing the repository.
    pub fn from_git_commit(
        repo: &Repository,
        commit: &Commit,
        project_name: &str,
        head_branch: &str,
    ) -> std::result::Result<Self, ExtractError> {
        let commit_tree = commit.tree().map_err(ExtractError::from_git)?;
        let parent_tree = if commit.parent_count() > 0 {
            Some(
                commit
                    .parent(0)
                    .map_err(ExtractError::from_git)?
                    .tree()
                    .map_err(ExtractError::from_git)?,
            )
        } else {
            None
        };

        let mut diff_opts = DiffOptions::new();
        diff_opts.context_lines(3).include_typechange(true);
        let mut diff = repo
            .diff_tree_to_tree(parent_tree.as_ref(), Some(&commit_tree), Some(&mut diff_opts))
            .map_err(ExtractError::from_git)?;

        let mut find_opts = DiffFindOptions::new();
        find_opts.renames(true).copies(true);
        diff.find_similar(Some(&mut find_opts))
            .map_err(ExtractError::from_git)?;

        let stats = diff.stats().map_err(ExtractError::from_git)?;
        let insertions = stats.insertions() as u64;
        let deletions = stats.deletions() as u64;

        let mut modified_files = Vec::new();
        for idx in 0..diff.deltas().len() {
            match extract_modified_file(repo, &diff, idx) {
                Ok(Some(mf)) => modified_files.push(mf),
                Ok(None) => {}
                Err(ExtractError::OversizeBlob { path, size }) => {
                    debug!(path = %path, size, "dropping oversize file from commit");
                }
                Err(err) => return Err(err),
            }
        }

        let author_sig = commit.author();
        let committer_sig = commit.committer();

        Ok(Self {
            hash: commit.id().to_string(),
            msg: commit.message().unwrap_or("").to_string(),
            author: Identity {
                name: author_sig.name().unwrap_or("Unknown").to_string(),
                email: author_sig.email().unwrap_or("").to_string(),
            },
            committer: Identity {
                name: committer_sig.name().unwrap_or("Unknown").to_string(),
                email: committer_sig.email().unwrap_or("").to_string(),
            },
            author_date: naive_utc(&author_sig.when()),
            committer_date: naive_utc(&commit.time()),
            branches: vec![head_branch.to_string()],
            in_main_branch: true,
            merge: commit.parent_count() > 1,
            parents: commit.parent_ids().map(|id| id.to_string()).collect(),
            project_name: project_name.to_string(),
            project_path: repo
                .workdir()
                .unwrap_or_else(|| repo.path())
                .to_string_lossy()
                .to_string(),
            insertions,
            deletions,
            lines: insertions + deletions,
            files: stats.files_changed() as u64,
            modified_files,
        })
    }

    /// Total added+deleted lines across all kept modified files.
    pub fn total_changed_lines(&self) -> u64 {
        self.modified_files
            .iter()
            .map(|mf| mf.added_lines + mf.deleted_lines)
            .sum()
    }
}

/// A commit as streamed into the output artifact: full, or degraded when
/// per-commit extraction failed in a recoverable way.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommitSummary {
    /// The full record.
    Full(Box<CommitRecord>),
    /// A degraded record replacing a commit that could not be extracted.
    Degraded {
        /// Full SHA-1 hash.
        hash: String,
        /// Author date, naive UTC.
        author_date: NaiveDateTime,
        /// First 100 characters of the message.
        msg: String,
        /// Human-readable reason for the degradation.
        error: String,
    },
}

impl CommitSummary {
    /// Builds a degraded record from a commit handle and the failure.
    pub fn degraded(commit: &Commit, err: &ExtractError) -> Self {
        let msg = commit.message().unwrap_or("");
        let head: String = msg.chars().take(100).collect();
        let msg = if msg.chars().count() > 100 {
            format!("{head}...")
        } else {
            head
        };
        CommitSummary::Degraded {
            hash: commit.id().to_string(),
            author_date: naive_utc(&commit.author().when()),
            msg,
            error: err.to_string(),
        }
    }
}

/// Converts a git2 time to naive UTC, dropping the recorded offset.
pub fn naive_utc(time: &git2::Time) -> NaiveDateTime {
    DateTime::from_timestamp(time.seconds(), 0)
        .unwrap_or_default()
        .naive_utc()
}

fn extract_modified_file(
    repo: &Repository,
    diff: &git2::Diff<'_>,
    idx: usize,
) -> std::result::Result<Option<ModifiedFile>, ExtractError> {
    let Some(delta) = diff.get_delta(idx) else {
        return Ok(None);
    };

    let old_path = delta
        .old_file()
        .path()
        .map(|p| p.to_string_lossy().to_string());
    let new_path = delta
        .new_file()
        .path()
        .map(|p| p.to_string_lossy().to_string());
    let change_type = ChangeType::from(delta.status());
    let filename = new_path
        .as_deref()
        .or(old_path.as_deref())
        .unwrap_or("")
        .rsplit('/')
        .next()
        .unwrap_or("")
        .to_string();

    // Known-problematic generated compiler blobs are dropped outright.
    if filename.starts_with("soljson-v") && filename.ends_with(".js") {
        debug!(file = %filename, "skipping generated compiler blob");
        return Ok(None);
    }

    // Size gate before any content is materialised.
    let display_path = new_path.clone().or_else(|| old_path.clone()).unwrap_or_default();
    let new_size = delta.new_file().size() as usize;
    let old_size = delta.old_file().size() as usize;
    if new_size > MAX_BLOB_BYTES || old_size > MAX_BLOB_BYTES {
        return Err(ExtractError::OversizeBlob {
            path: display_path,
            size: new_size.max(old_size),
        });
    }

    let mut diff_text = String::new();
    let mut parsed = DiffParsed::default();
    let mut added_lines = 0u64;
    let mut deleted_lines = 0u64;

    if let Ok(Some(mut patch)) = Patch::from_diff(diff, idx) {
        let (_, additions, deletions) = patch.line_stats().map_err(ExtractError::from_git)?;
        added_lines = additions as u64;
        deleted_lines = deletions as u64;

        for hunk_idx in 0..patch.num_hunks() {
            let line_count = {
                let (hunk, line_count) = patch.hunk(hunk_idx).map_err(ExtractError::from_git)?;
                diff_text.push_str(&String::from_utf8_lossy(hunk.header()));
                line_count
            };
            for line_idx in 0..line_count {
                let line = patch
                    .line_in_hunk(hunk_idx, line_idx)
                    .map_err(ExtractError::from_git)?;
                let content = String::from_utf8_lossy(line.content());
                let text = content.trim_end_matches('\n').to_string();
                match line.origin() {
                    '+' => {
                        if let Some(no) = line.new_lineno() {
                            parsed.added.push((no, text.clone()));
                        }
                        diff_text.push('+');
                        diff_text.push_str(&text);
                        diff_text.push('\n');
                    }
                    '-' => {
                        if let Some(no) = line.old_lineno() {
                            parsed.deleted.push((no, text.clone()));
                        }
                        diff_text.push('-');
                        diff_text.push_str(&text);
                        diff_text.push('\n');
                    }
                    ' ' => {
                        diff_text.push(' ');
                        diff_text.push_str(&text);
                        diff_text.push('\n');
                    }
                    _ => {}
                }
            }
        }
    }

    let source_code = blob_text(repo, delta.new_file().id());
    let source_code_before = blob_text(repo, delta.old_file().id());

    Ok(Some(ModifiedFile {
        old_path,
        new_path,
        filename,
        change_type,
        diff: diff_text,
        diff_parsed: parsed,
        added_lines,
        deleted_lines,
        source_code,
        source_code_before,
        methods: Vec::new(),
        changed_methods: Vec::new(),
        nloc: None,
        complexity: None,
        token_count: None,
    }))
}

/// Reads a blob as UTF-8 text if it exists, is not binary, and fits the
/// storage cap.
fn blob_text(repo: &Repository, oid: git2::Oid) -> Option<String> {
    if oid.is_zero() {
        return None;
    }
    let blob = repo.find_blob(oid).ok()?;
    if blob.is_binary() || blob.size() > MAX_STORED_SOURCE_BYTES {
        return None;
    }
    Some(String::from_utf8_lossy(blob.content()).to_string())
}

/// Parses a textual date (`YYYY-MM-DD`) into a naive midnight timestamp.
pub fn parse_date(text: &str) -> Result<NaiveDateTime> {
    let date = chrono::NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .with_context(|| format!("invalid date: {text}"))?;
    date.and_hms_opt(0, 0, 0)
        .context("invalid midnight timestamp")
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn canonical_email_normalised() {
        let id = Identity {
            name: "Alice".to_string(),
            email: "  Alice@Example.COM ".to_string(),
        };
        assert_eq!(id.canonical_email(), "alice@example.com");
    }

    #[test]
    fn change_type_from_delta() {
        assert_eq!(ChangeType::from(Delta::Added), ChangeType::Add);
        assert_eq!(ChangeType::from(Delta::Renamed), ChangeType::Rename);
        assert_eq!(ChangeType::from(Delta::Typechange), ChangeType::Other);
    }

    #[test]
    fn parse_date_roundtrip() {
        let dt = parse_date("2024-03-11").unwrap();
        assert_eq!(dt.format("%Y-%m-%d %H:%M").to_string(), "2024-03-11 00:00");
        assert!(parse_date("not-a-date").is_err());
    }

    #[test]
    fn modified_file_identity_prefers_new_path() {
        let mf = ModifiedFile {
            old_path: Some("old.rs".to_string()),
            new_path: Some("new.rs".to_string()),
            filename: "new.rs".to_string(),
            change_type: ChangeType::Rename,
            diff: String::new(),
            diff_parsed: DiffParsed::default(),
            added_lines: 0,
            deleted_lines: 0,
            source_code: None,
            source_code_before: None,
            methods: Vec::new(),
            changed_methods: Vec::new(),
            nloc: None,
            complexity: None,
            token_count: None,
        };
        assert_eq!(mf.path(), "new.rs");
    }
}
