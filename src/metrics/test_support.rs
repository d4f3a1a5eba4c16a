//! Builders for synthetic commits used by the accumulator unit tests.

use chrono::NaiveDateTime;

use crate::git::{ChangeType, CommitRecord, DiffParsed, Identity, ModifiedFile};

/// Parses `YYYY-MM-DD HH:MM:SS` into a naive timestamp.
pub fn ts(text: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S").unwrap()
}

/// Builds a modified file with the given added and deleted line texts.
///
/// Line numbers are assigned sequentially from 1; a plausible single-hunk
/// diff body is synthesized so hunk counting has something to chew on.
pub fn modified_file(path: &str, added: &[&str], deleted: &[&str]) -> ModifiedFile {
    let added_parsed: Vec<(u32, String)> = added
        .iter()
        .enumerate()
        .map(|(i, text)| (i as u32 + 1, (*text).to_string()))
        .collect();
    let deleted_parsed: Vec<(u32, String)> = deleted
        .iter()
        .enumerate()
        .map(|(i, text)| (i as u32 + 1, (*text).to_string()))
        .collect();

    let mut diff = format!("@@ -1,{} +1,{} @@\n", deleted.len(), added.len());
    for text in deleted {
        diff.push('-');
        diff.push_str(text);
        diff.push('\n');
    }
    for text in added {
        diff.push('+');
        diff.push_str(text);
        diff.push('\n');
    }

    let source: String = added.iter().map(|l| format!("{l}\n")).collect();

    ModifiedFile {
        old_path: None,
        new_path: Some(path.to_string()),
        filename: path.rsplit('/').next().unwrap_or(path).to_string(),
        change_type: ChangeType::Modify,
        diff,
        diff_parsed: DiffParsed {
            added: added_parsed,
            deleted: deleted_parsed,
        },
        added_lines: added.len() as u64,
        deleted_lines: deleted.len() as u64,
        source_code: if source.is_empty() { None } else { Some(source) },
        source_code_before: None,
        methods: Vec::new(),
        changed_methods: Vec::new(),
        nloc: None,
        complexity: None,
        token_count: None,
    }
}

/// Builds a commit by `email` at `when` with the given modified files.
pub fn commit_at(email: &str, when: &str, files: Vec<ModifiedFile>) -> CommitRecord {
    commit_with_message(email, when, "update", files)
}

/// Builds a commit with an explicit message.
pub fn commit_with_message(
    email: &str,
    when: &str,
    msg: &str,
    files: Vec<ModifiedFile>,
) -> CommitRecord {
    let insertions: u64 = files.iter().map(|f| f.added_lines).sum();
    let deletions: u64 = files.iter().map(|f| f.deleted_lines).sum();
    let when = ts(when);
    let name = email.split('@').next().unwrap_or("dev").to_string();
    CommitRecord {
        hash: format!("{:040x}", md5_like(email, when)),
        msg: msg.to_string(),
        author: Identity {
            name: name.clone(),
            email: email.to_string(),
        },
        committer: Identity {
            name,
            email: email.to_string(),
        },
        author_date: when,
        committer_date: when,
        branches: vec!["main".to_string()],
        in_main_branch: true,
        merge: false,
        parents: Vec::new(),
        project_name: "fixture".to_string(),
        project_path: "/tmp/fixture".to_string(),
        insertions,
        deletions,
        lines: insertions + deletions,
        files: files.len() as u64,
        modified_files: files,
    }
}

/// Builds a commit touching `paths`, one meaningful added line each.
pub fn commit_with_files(email: &str, when: &str, paths: &[&str]) -> CommitRecord {
    let files = paths
        .iter()
        .map(|p| modified_file(p, &["value = compute()"], &[]))
        .collect();
    commit_at(email, when, files)
}

fn md5_like(email: &str, when: NaiveDateTime) -> u128 {
    // Cheap deterministic hash for distinct fixture commit ids.
    let mut acc: u128 = 0xcbf2_9ce4_8422_2325;
    for b in email.bytes().chain(when.to_string().bytes()) {
        acc = acc.wrapping_mul(0x0100_0000_01b3).wrapping_add(u128::from(b));
    }
    acc
}
