//! Language detection and comment syntax tables keyed by file extension.

/// Comment delimiters for one language family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommentSyntax {
    /// Prefix that starts a line comment (`//`, `#`, `--`, ...).
    pub line: Option<&'static str>,
    /// Block comment delimiters, when the language has them.
    pub block: Option<(&'static str, &'static str)>,
    /// Documentation comment start, when distinct from `line`/`block`.
    pub doc: Option<&'static str>,
}

/// Coarse language identity derived from a filename.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    /// Hash-comment languages (Python, Ruby, Perl, shell, YAML, ...).
    Hash,
    /// C-family slash-comment languages (C, C++, Java, JS/TS, Rust, Go, ...).
    CFamily,
    /// Markup with `<!-- -->` comments (HTML, XML, Markdown).
    Markup,
    /// Double-dash comment languages (SQL, Haskell, Lua, Ada, Elm).
    DoubleDash,
    /// Anything we have no comment table for.
    Unknown,
}

/// Returns the file extension (lower-cased, without the dot) of a filename.
pub fn extension_of(filename: &str) -> Option<String> {
    let name = filename.rsplit('/').next().unwrap_or(filename);
    let (_, ext) = name.rsplit_once('.')?;
    if ext.is_empty() {
        None
    } else {
        Some(ext.to_ascii_lowercase())
    }
}

/// Maps a filename to its coarse [`Language`] by extension.
pub fn language_for_filename(filename: &str) -> Language {
    let Some(ext) = extension_of(filename) else {
        return Language::Unknown;
    };
    match ext.as_str() {
        "py" | "pyw" | "pyi" | "rb" | "rbw" | "pl" | "pm" | "sh" | "bash" | "zsh" | "fish"
        | "yaml" | "yml" | "r" | "jl" | "ex" | "exs" | "nim" | "tcl" | "coffee" | "ps1" => {
            Language::Hash
        }
        "c" | "h" | "cpp" | "cxx" | "cc" | "hpp" | "hxx" | "hh" | "cs" | "java" | "js" | "jsx"
        | "mjs" | "cjs" | "ts" | "tsx" | "go" | "rs" | "swift" | "kt" | "kts" | "scala" | "dart"
        | "php" | "groovy" | "d" | "m" | "mm" | "css" | "scss" | "less" | "zig" => {
            Language::CFamily
        }
        "html" | "htm" | "xhtml" | "xml" | "xsl" | "xslt" | "md" | "markdown" | "svg" => {
            Language::Markup
        }
        "sql" | "psql" | "mysql" | "hs" | "lhs" | "lua" | "elm" | "ada" | "adb" | "vhdl" => {
            Language::DoubleDash
        }
        _ => Language::Unknown,
    }
}

/// Comment syntax for a filename's language, if it is in the table.
pub fn comment_syntax(filename: &str) -> CommentSyntax {
    match language_for_filename(filename) {
        Language::Hash => CommentSyntax {
            line: Some("#"),
            block: None,
            doc: None,
        },
        Language::CFamily => CommentSyntax {
            line: Some("//"),
            block: Some(("/*", "*/")),
            doc: Some("///"),
        },
        Language::Markup => CommentSyntax {
            line: None,
            block: Some(("<!--", "-->")),
            doc: None,
        },
        Language::DoubleDash => CommentSyntax {
            line: Some("--"),
            block: None,
            doc: None,
        },
        Language::Unknown => CommentSyntax {
            line: None,
            block: None,
            doc: None,
        },
    }
}

/// Extension whitelist for files whose added lines are classified by code age.
pub fn is_code_file(filename: &str) -> bool {
    const CODE_EXTENSIONS: &[&str] = &[
        "py", "js", "java", "cpp", "c", "cs", "rb", "go", "rs", "kt", "swift", "m", "scala",
        "php", "ts", "tsx", "jsx", "vue", "dart", "r", "jl", "ex", "exs",
    ];
    extension_of(filename).is_some_and(|ext| CODE_EXTENSIONS.contains(&ext.as_str()))
}

/// Counts lines in `source` that are comments or documentation for the
/// filename's language. Tracks open block comments across lines.
pub fn count_comment_lines(filename: &str, source: &str) -> u64 {
    let syntax = comment_syntax(filename);
    if syntax.line.is_none() && syntax.block.is_none() {
        return 0;
    }

    let mut count = 0u64;
    let mut open_block: Option<&'static str> = None;

    for line in source.lines() {
        let trimmed = line.trim();

        if let Some(end) = open_block {
            count += 1;
            if trimmed.contains(end) {
                open_block = None;
            }
            continue;
        }

        if let Some(doc) = syntax.doc {
            if trimmed.starts_with(doc) {
                count += 1;
                continue;
            }
        }

        if let Some((start, end)) = syntax.block {
            if let Some(pos) = trimmed.find(start) {
                count += 1;
                if !trimmed[pos + start.len()..].contains(end) {
                    open_block = Some(end);
                }
                continue;
            }
        }

        if let Some(prefix) = syntax.line {
            if trimmed.starts_with(prefix) {
                count += 1;
            }
        }
    }

    count
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn extension_lowercased() {
        assert_eq!(extension_of("Foo.RS").as_deref(), Some("rs"));
        assert_eq!(extension_of("src/deep/path/x.Py").as_deref(), Some("py"));
        assert_eq!(extension_of("Makefile"), None);
    }

    #[test]
    fn languages_by_extension() {
        assert_eq!(language_for_filename("a.py"), Language::Hash);
        assert_eq!(language_for_filename("a.rs"), Language::CFamily);
        assert_eq!(language_for_filename("a.md"), Language::Markup);
        assert_eq!(language_for_filename("a.sql"), Language::DoubleDash);
        assert_eq!(language_for_filename("a.xyz"), Language::Unknown);
    }

    #[test]
    fn comment_lines_c_family() {
        let src = "// one\nint x = 1;\n/* block\nstill block\n*/\nint y;\n";
        assert_eq!(count_comment_lines("a.c", src), 4);
    }

    #[test]
    fn comment_lines_hash() {
        let src = "# a\nx = 1\n# b\n";
        assert_eq!(count_comment_lines("a.py", src), 2);
    }

    #[test]
    fn comment_lines_unknown_language() {
        assert_eq!(count_comment_lines("a.bin", "# not a comment\n"), 0);
    }

    #[test]
    fn block_comment_single_line() {
        assert_eq!(count_comment_lines("a.c", "/* inline */\ncode();\n"), 1);
    }
}
