//! Per-line classification: meaningful / trivial / auto-generated / moved.

use std::collections::HashSet;
use std::sync::LazyLock;

use globset::{Glob, GlobSet, GlobSetBuilder};
use regex::Regex;

use crate::diff::language::{comment_syntax, language_for_filename, Language};

static IMPORT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)^\s*(
            import\s |
            from\s+.*\s+import |
            \#include\s*[<\x22] |
            using\s+.*; |
            require\s*\( |
            include\s |
            use\s |
            package\s |
            extern\s+crate\s
        )",
    )
    .unwrap()
});

static LONG_ALNUM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[a-zA-Z0-9]{20,}").unwrap()
});

static RULER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"_{5,}|={5,}|-{5,}").unwrap()
});

/// Which auto-generation heuristic matched a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoGeneratedKind {
    /// A single alphanumeric run of 20+ characters dominates the line.
    LongSequence,
    /// Runs of `_____`, `=====` or `-----` (5 or more).
    RepeatedChars,
    /// Very long line with almost no distinct characters.
    RepetitivePattern,
}

/// True iff the line is empty or whitespace-only.
pub fn is_noop_line(text: &str) -> bool {
    text.trim().is_empty()
}

/// Detects machine-generated content: minified blobs, hash dumps, rulers.
pub fn looks_auto_generated(text: &str) -> Option<AutoGeneratedKind> {
    let trimmed = text.trim();

    if LONG_ALNUM_RE.is_match(trimmed) {
        let cleaned = LONG_ALNUM_RE.replace_all(trimmed, "");
        if cleaned.trim().len() < trimmed.len() * 3 / 10 {
            return Some(AutoGeneratedKind::LongSequence);
        }
    }

    if RULER_RE.is_match(trimmed) {
        return Some(AutoGeneratedKind::RepeatedChars);
    }

    if text.len() > 200 {
        let distinct: HashSet<char> = text.chars().filter(|c| *c != ' ').collect();
        if distinct.len() < 10 {
            return Some(AutoGeneratedKind::RepetitivePattern);
        }
    }

    None
}

/// True iff the line starts a comment for the given filename's language.
///
/// Unknown languages fall back to the common prefixes so that diff streams
/// from mixed repositories still get a reasonable classification.
fn is_comment_line(text: &str, filename: &str) -> bool {
    let trimmed = text.trim_start();
    let syntax = comment_syntax(filename);

    if let Some(prefix) = syntax.line {
        if trimmed.starts_with(prefix) {
            return true;
        }
    }
    if let Some((start, _)) = syntax.block {
        if trimmed.starts_with(start) || trimmed.starts_with('*') {
            return true;
        }
    }
    if language_for_filename(filename) == Language::Unknown {
        return trimmed.starts_with('#')
            || trimmed.starts_with("//")
            || trimmed.starts_with("/*")
            || trimmed.starts_with('*')
            || trimmed.starts_with("<!--")
            || trimmed.starts_with("--")
            || trimmed.starts_with("\"\"\"")
            || trimmed.starts_with("'''");
    }
    false
}

/// The meaningful-change test used by the velocity metrics.
///
/// A line is meaningful iff it is non-empty, longer than one character,
/// not a comment for the file's language, and not an import/include line.
pub fn is_meaningful_line(text: &str, filename: &str) -> bool {
    let stripped = text.trim();
    if stripped.is_empty() || stripped.len() <= 1 {
        return false;
    }
    if is_comment_line(text, filename) {
        return false;
    }
    !IMPORT_RE.is_match(text)
}

static BRACE_ONLY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?xi)^\s*(
            [{}()\[\]]\s*[;,]?
          | \}\s*else\s*\{
          | \}\s*catch\s*\{
          | \}\s*finally\s*\{
          | <\s*/?\s*[a-zA-Z][a-zA-Z0-9]*\s*>
        )\s*$",
    )
    .unwrap()
});

/// Keywords that carry no meaning when they are alone on a line.
const LONE_KEYWORDS: &[&str] = &[
    "else", "catch", "finally", "try", "if", "for", "while", "switch", "case", "default",
    "return", "break", "continue", "do", "end", "begin", "pass", "then", "match", "loop",
];

/// The substantive-source test used by the meaningful-code metric.
///
/// Stricter than [`is_meaningful_line`]: also rejects auto-generated
/// content and lone keyword/brace lines that add no information.
pub fn is_substantive_source_line(text: &str, _filename: &str) -> bool {
    let stripped = text.trim();
    if stripped.is_empty() {
        return false;
    }
    if looks_auto_generated(text).is_some() {
        return false;
    }
    if BRACE_ONLY_RE.is_match(text) {
        return false;
    }
    let cleaned = stripped.trim_end_matches([':', ';']).to_ascii_lowercase();
    !LONE_KEYWORDS.contains(&cleaned.as_str())
}

/// Counts maximal contiguous runs of `+`/`-` lines in a unified diff body.
///
/// `diff` is hunk content only (no `diff --git` / `---` / `+++` headers);
/// `@@` hunk headers and context lines break a run.
pub fn count_hunks(diff: &str) -> u64 {
    let mut hunks = 0u64;
    let mut in_run = false;
    for line in diff.lines() {
        if line.starts_with('+') || line.starts_with('-') {
            if !in_run {
                in_run = true;
                hunks += 1;
            }
        } else {
            in_run = false;
        }
    }
    hunks
}

/// Returns the stripped texts that occur on both sides of a diff.
///
/// A line whose trimmed text appears among both the added and the deleted
/// lines of the same file is a move (or a pure re-indent) rather than a
/// genuine add/delete.
pub fn detect_moved_lines<'a>(
    added: &'a [(u32, String)],
    deleted: &[(u32, String)],
) -> HashSet<&'a str> {
    let deleted_stripped: HashSet<&str> = deleted
        .iter()
        .map(|(_, text)| text.trim())
        .filter(|t| !t.is_empty())
        .collect();

    added
        .iter()
        .map(|(_, text)| text.trim())
        .filter(|t| !t.is_empty() && deleted_stripped.contains(t))
        .collect()
}

/// Glob-based skip list for files that should not contribute to velocity.
#[derive(Debug)]
pub struct VelocitySkipList {
    set: GlobSet,
}

impl Default for VelocitySkipList {
    fn default() -> Self {
        Self::new()
    }
}

impl VelocitySkipList {
    const PATTERNS: &'static [&'static str] = &[
        // Lock files
        "**/package-lock.json",
        "**/yarn.lock",
        "**/Gemfile.lock",
        "**/poetry.lock",
        "**/Pipfile.lock",
        "**/Cargo.lock",
        // Minified output and source maps
        "**/*.min.*",
        "**/*.map",
        // Generated code
        "**/*.generated.*",
        "**/*.auto.*",
        // Build artifacts and dependency trees
        "**/dist/**",
        "**/build/**",
        "**/target/**",
        "**/out/**",
        "**/vendor/**",
        "**/node_modules/**",
        // Editor metadata
        "**/.vscode/**",
        "**/.idea/**",
        "**/*.iml",
        "**/.DS_Store",
        // Binary assets
        "**/*.svg",
        "**/*.png",
        "**/*.jpg",
        "**/*.jpeg",
        "**/*.gif",
        "**/*.ico",
        "**/*.woff",
        "**/*.woff2",
        "**/*.ttf",
        "**/*.eot",
        "**/*.pdf",
        "**/*.zip",
        "**/*.tar.gz",
    ];

    /// Builds the skip list. The pattern set is a compile-time constant.
    pub fn new() -> Self {
        let mut builder = GlobSetBuilder::new();
        for pattern in Self::PATTERNS {
            if let Ok(glob) = Glob::new(pattern) {
                builder.add(glob);
            }
        }
        Self {
            set: builder.build().unwrap(),
        }
    }

    /// True iff the path should be excluded from velocity metrics.
    pub fn matches(&self, path: &str) -> bool {
        self.set.is_match(path)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    // ── line tags ──────────────────────────────────────────────

    #[test]
    fn noop_lines() {
        assert!(is_noop_line(""));
        assert!(is_noop_line("   \t  "));
        assert!(!is_noop_line("x = 1"));
    }

    #[test]
    fn meaningful_rejects_comments_by_language() {
        assert!(!is_meaningful_line("# comment", "a.py"));
        assert!(!is_meaningful_line("// comment", "a.rs"));
        assert!(!is_meaningful_line("-- comment", "a.sql"));
        assert!(!is_meaningful_line("<!-- comment -->", "a.html"));
    }

    #[test]
    fn meaningful_rejects_imports() {
        assert!(!is_meaningful_line("import os", "a.py"));
        assert!(!is_meaningful_line("from foo import bar", "a.py"));
        assert!(!is_meaningful_line("#include <stdio.h>", "a.c"));
        assert!(!is_meaningful_line("use std::fmt;", "a.rs"));
        assert!(!is_meaningful_line("package main", "a.go"));
    }

    #[test]
    fn meaningful_rejects_short_lines() {
        assert!(!is_meaningful_line("{", "a.c"));
        assert!(!is_meaningful_line("", "a.c"));
        assert!(is_meaningful_line("x = 1", "a.py"));
    }

    #[test]
    fn auto_generated_detection() {
        assert_eq!(
            looks_auto_generated("d41d8cd98f00b204e9800998ecf8427e8f14e45fceea167a"),
            Some(AutoGeneratedKind::LongSequence)
        );
        assert_eq!(
            looks_auto_generated("# ====================="),
            Some(AutoGeneratedKind::RepeatedChars)
        );
        let repetitive = "ababab ".repeat(40);
        assert_eq!(
            looks_auto_generated(&repetitive),
            Some(AutoGeneratedKind::RepetitivePattern)
        );
        assert_eq!(looks_auto_generated("let x = compute(y);"), None);
    }

    #[test]
    fn substantive_rejects_lone_keywords_and_braces() {
        assert!(!is_substantive_source_line("}", "a.c"));
        assert!(!is_substantive_source_line("} else {", "a.c"));
        assert!(!is_substantive_source_line("return", "a.py"));
        assert!(!is_substantive_source_line("else:", "a.py"));
        assert!(is_substantive_source_line("return compute(x)", "a.py"));
    }

    // ── hunks ──────────────────────────────────────────────────

    #[test]
    fn hunk_runs_counted() {
        let diff = "@@ -1,3 +1,4 @@\n+a\n+b\n context\n-c\n more\n+d\n";
        assert_eq!(count_hunks(diff), 3);
    }

    #[test]
    fn hunk_empty_diff() {
        assert_eq!(count_hunks(""), 0);
    }

    // ── moves ──────────────────────────────────────────────────

    #[test]
    fn moved_lines_by_stripped_text() {
        let added = vec![(1, "    let x = 1;".to_string()), (2, "new".to_string())];
        let deleted = vec![(5, "let x = 1;".to_string())];
        let moved = detect_moved_lines(&added, &deleted);
        assert!(moved.contains("let x = 1;"));
        assert!(!moved.contains("new"));
    }

    #[test]
    fn blank_lines_never_move() {
        let added = vec![(1, "   ".to_string())];
        let deleted = vec![(2, "".to_string())];
        assert!(detect_moved_lines(&added, &deleted).is_empty());
    }

    // ── skip list ──────────────────────────────────────────────

    #[test]
    fn skip_list_matches() {
        let skip = VelocitySkipList::new();
        assert!(skip.matches("package-lock.json"));
        assert!(skip.matches("web/app.min.js"));
        assert!(skip.matches("node_modules/lodash/index.js"));
        assert!(skip.matches("assets/logo.png"));
        assert!(!skip.matches("src/main.rs"));
    }
}
