//! Test and documentation coverage ("quality cornerstones").

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::RegexSet;
use serde::{Deserialize, Serialize};

use crate::diff::language::count_comment_lines;
use crate::git::CommitRecord;
use crate::metrics::Metric;

static TEST_PATTERNS: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r"(?:^|/)test_[^/]*\.[a-zA-Z]+$",
        r"_test\.[a-zA-Z]+$",
        r"Tests?\.[a-zA-Z]+$",
        r"Spec\.[a-zA-Z]+$",
        r"\.spec\.[a-zA-Z]+$",
        r"\.test\.[a-zA-Z]+$",
        r"(?:^|/)tests?/",
        r"(?:^|/)spec/",
        r"(?:^|/)__tests?__/",
        r"(?:^|/)testing/",
        r"_spec\.[a-zA-Z]+$",
        r"-test\.[a-zA-Z]+$",
        r"-spec\.[a-zA-Z]+$",
        r"(?:^|/)test[A-Z][^/]*\.[a-zA-Z]+$",
        r"(?:^|/)Test[A-Z][^/]*\.[a-zA-Z]+$",
    ])
    .unwrap()
});

static DOC_PATTERNS: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r"\.(?:md|markdown|rst|txt|adoc|asciidoc|wiki|rdoc|pod|tex|man)$",
        r"(?:^|/)docs?/",
        r"(?:^|/)documentation/",
        r"(?:^|/)man/",
        r"(?:^|/)wikis?/",
        r"(?:^|/)README[^/]*$",
        r"(?:^|/)CHANGELOG[^/]*$",
        r"(?:^|/)CONTRIBUTING[^/]*$",
        r"(?:^|/)LICENSE[^/]*$",
        r"(?:^|/)INSTALL[^/]*$",
        r"(?:^|/)USAGE[^/]*$",
        r"(?:^|/)FAQ[^/]*$",
        r"(?:^|/)TUTORIAL[^/]*$",
        r"(?:^|/)GUIDE[^/]*$",
    ])
    .unwrap()
});

/// True iff the path matches a known test-file pattern.
pub fn is_test_file(path: &str) -> bool {
    TEST_PATTERNS.is_match(path)
}

/// True iff the path matches a known documentation-file pattern.
pub fn is_doc_file(path: &str) -> bool {
    DOC_PATTERNS.is_match(path)
}

#[derive(Debug, Clone, Default)]
struct FileStats {
    is_test: bool,
    is_doc: bool,
}

/// Counts test and documentation files and lines across the stream.
///
/// Line counts come from the post-change file content, so a file touched
/// repeatedly contributes its size once per touching commit; coverage
/// percentages are ratios over the same accounting and stay comparable.
#[derive(Debug, Default)]
pub struct QualityCornerstones {
    file_stats: BTreeMap<String, FileStats>,
    test_files: u64,
    doc_files: u64,
    total_files: u64,
    test_lines: u64,
    doc_lines: u64,
    total_lines: u64,
}

/// files/lines/percent triple for one coverage category.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CoverageStats {
    /// Distinct files in the category.
    pub files: u64,
    /// Lines counted for the category.
    pub lines: u64,
    /// `lines / total.lines` as a percentage.
    pub percent: f64,
}

/// Totals across the bucket.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CoverageTotals {
    /// Distinct files observed.
    pub files: u64,
    /// Lines observed.
    pub lines: u64,
}

/// Snapshot of the coverage metric.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct QualityCornerstonesSnapshot {
    /// Test coverage.
    pub test_coverage: CoverageStats,
    /// Documentation coverage (doc files plus comment lines in code).
    pub doc_coverage: CoverageStats,
    /// Totals.
    pub total: CoverageTotals,
    /// `(test% + doc%) / 2`.
    pub quality_score: f64,
}

impl Metric for QualityCornerstones {
    type Snapshot = QualityCornerstonesSnapshot;

    fn process_commit(&mut self, commit: &CommitRecord) {
        for mf in &commit.modified_files {
            let path = mf.path().to_string();

            let stats = if let Some(stats) = self.file_stats.get(&path) {
                stats.clone()
            } else {
                let stats = FileStats {
                    is_test: is_test_file(&path),
                    is_doc: is_doc_file(&path),
                };
                self.total_files += 1;
                if stats.is_test {
                    self.test_files += 1;
                }
                if stats.is_doc {
                    self.doc_files += 1;
                }
                self.file_stats.insert(path.clone(), stats.clone());
                stats
            };

            let source = mf.source_code.as_deref().unwrap_or("");
            let source_lines = if source.is_empty() {
                0
            } else {
                source.lines().count() as u64
            };

            self.total_lines += source_lines;
            if stats.is_test {
                self.test_lines += source_lines;
            }
            if stats.is_doc {
                self.doc_lines += source_lines;
            } else if !source.is_empty() {
                self.doc_lines += count_comment_lines(&path, source);
            }
        }
    }

    fn snapshot(&self) -> QualityCornerstonesSnapshot {
        build_snapshot(
            self.test_files,
            self.test_lines,
            self.doc_files,
            self.doc_lines,
            self.total_files,
            self.total_lines,
        )
    }
}

fn build_snapshot(
    test_files: u64,
    test_lines: u64,
    doc_files: u64,
    doc_lines: u64,
    total_files: u64,
    total_lines: u64,
) -> QualityCornerstonesSnapshot {
    let pct = |lines: u64| {
        if total_lines > 0 {
            lines as f64 / total_lines as f64 * 100.0
        } else {
            0.0
        }
    };
    let test_pct = pct(test_lines);
    let doc_pct = pct(doc_lines);

    QualityCornerstonesSnapshot {
        test_coverage: CoverageStats {
            files: test_files,
            lines: test_lines,
            percent: test_pct,
        },
        doc_coverage: CoverageStats {
            files: doc_files,
            lines: doc_lines,
            percent: doc_pct,
        },
        total: CoverageTotals {
            files: total_files,
            lines: total_lines,
        },
        quality_score: (test_pct + doc_pct) / 2.0,
    }
}

impl QualityCornerstonesSnapshot {
    /// Merges chunk snapshots: files and lines sum, percentages and the
    /// quality score are recomputed from the merged totals.
    pub fn merge(parts: &[QualityCornerstonesSnapshot]) -> QualityCornerstonesSnapshot {
        build_snapshot(
            parts.iter().map(|p| p.test_coverage.files).sum(),
            parts.iter().map(|p| p.test_coverage.lines).sum(),
            parts.iter().map(|p| p.doc_coverage.files).sum(),
            parts.iter().map(|p| p.doc_coverage.lines).sum(),
            parts.iter().map(|p| p.total.files).sum(),
            parts.iter().map(|p| p.total.lines).sum(),
        )
    }
}
