//! Streaming writer for the per-repository JSON artifact.
//!
//! The artifact is written incrementally so commit payloads never sit in
//! memory all at once: header first, then the commits array in batches,
//! then the metrics object and the processing totals.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;

/// Artifact header fields.
#[derive(Debug, Clone, Serialize)]
pub struct ReportHeader {
    /// Organization or user the repository belongs to.
    pub project_name: String,
    /// Clone URL or local path.
    pub repository_url: String,
    /// Short repository name.
    pub repository_name: String,
    /// Ecosystem label from the catalog.
    pub ecosystem: String,
    /// Category label from the catalog.
    pub repo_category: String,
    /// Start of the analysis window, `YYYY-MM-DD`, when bounded.
    pub start_date: Option<String>,
    /// End of the analysis window, `YYYY-MM-DD`, when bounded.
    pub end_date: Option<String>,
    /// True when no window was configured.
    pub full_history: bool,
}

/// Totals appended at the end of the artifact.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ProcessingTotals {
    /// Commits written to the artifact.
    pub total_commits: u64,
    /// Summed insertions.
    pub total_lines_added: u64,
    /// Summed deletions.
    pub total_lines_removed: u64,
}

/// Streams one repository's artifact to disk.
pub struct ReportWriter {
    out: BufWriter<File>,
    path: PathBuf,
    commits_written: u64,
}

impl ReportWriter {
    /// Creates the artifact and writes the header and the opening of the
    /// commits array.
    pub fn create(path: &Path, header: &ReportHeader) -> Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("Failed to create output file: {}", path.display()))?;
        let mut out = BufWriter::new(file);

        writeln!(out, "{{")?;
        write_field(&mut out, "project_name", &header.project_name)?;
        write_field(&mut out, "repository_url", &header.repository_url)?;
        write_field(&mut out, "repository_name", &header.repository_name)?;
        write_field(&mut out, "ecosystem", &header.ecosystem)?;
        write_field(&mut out, "repo_category", &header.repo_category)?;
        writeln!(
            out,
            "  \"analysis_period\": {},",
            serde_json::to_string(&serde_json::json!({
                "start_date": header.start_date,
                "end_date": header.end_date,
                "full_history": header.full_history,
            }))?
        )?;
        writeln!(out, "  \"commits\": [")?;

        Ok(Self {
            out,
            path: path.to_path_buf(),
            commits_written: 0,
        })
    }

    /// Appends a batch of commit summaries as array elements. The very
    /// first element writes no leading comma.
    pub fn write_commit_batch(&mut self, batch: &[Value]) -> Result<()> {
        for value in batch {
            if self.commits_written > 0 {
                writeln!(self.out, ",")?;
            }
            write!(self.out, "    {}", serde_json::to_string(value)?)?;
            self.commits_written += 1;
        }
        Ok(())
    }

    /// Appends one pre-serialized commit line (used when splicing chunk
    /// files into the final artifact).
    pub fn write_commit_raw(&mut self, json_line: &str) -> Result<()> {
        if self.commits_written > 0 {
            writeln!(self.out, ",")?;
        }
        write!(self.out, "    {}", json_line.trim())?;
        self.commits_written += 1;
        Ok(())
    }

    /// Closes the commits array and writes metrics plus totals.
    pub fn finish(
        mut self,
        process_metrics: &Value,
        metrics_type: &str,
        totals: ProcessingTotals,
    ) -> Result<PathBuf> {
        writeln!(self.out)?;
        writeln!(self.out, "  ],")?;
        writeln!(
            self.out,
            "  \"process_metrics\": {},",
            serde_json::to_string_pretty(process_metrics)?
        )?;
        writeln!(self.out, "  \"metrics_type\": {},", serde_json::to_string(metrics_type)?)?;
        writeln!(
            self.out,
            "  \"processing\": {}",
            serde_json::to_string(&totals)?
        )?;
        writeln!(self.out, "}}")?;
        self.out.flush()?;
        Ok(self.path)
    }

    /// Number of commits written so far.
    pub fn commits_written(&self) -> u64 {
        self.commits_written
    }
}

fn write_field(out: &mut impl Write, key: &str, value: &str) -> Result<()> {
    writeln!(
        out,
        "  {}: {},",
        serde_json::to_string(key)?,
        serde_json::to_string(value)?
    )?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn header() -> ReportHeader {
        ReportHeader {
            project_name: "acme".to_string(),
            repository_url: "https://example.com/acme/widgets.git".to_string(),
            repository_name: "widgets".to_string(),
            ecosystem: "rust".to_string(),
            repo_category: "core".to_string(),
            start_date: Some("2024-01-01".to_string()),
            end_date: Some("2024-03-31".to_string()),
            full_history: false,
        }
    }

    #[test]
    fn artifact_is_valid_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");

        let mut writer = ReportWriter::create(&path, &header()).unwrap();
        writer
            .write_commit_batch(&[json!({"hash": "aaa"}), json!({"hash": "bbb"})])
            .unwrap();
        writer.write_commit_batch(&[json!({"hash": "ccc"})]).unwrap();
        let path = writer
            .finish(
                &json!({"2024-03-11": {"productivity": {}}}),
                "weekly",
                ProcessingTotals {
                    total_commits: 3,
                    total_lines_added: 10,
                    total_lines_removed: 2,
                },
            )
            .unwrap();

        let text = std::fs::read_to_string(path).unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["commits"].as_array().unwrap().len(), 3);
        assert_eq!(value["processing"]["total_commits"], 3);
        assert_eq!(value["repository_name"], "widgets");
        assert_eq!(value["metrics_type"], "weekly");
    }

    #[test]
    fn empty_commit_stream_still_valid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.json");
        let writer = ReportWriter::create(&path, &header()).unwrap();
        let path = writer
            .finish(&json!({}), "weekly", ProcessingTotals::default())
            .unwrap();
        let value: Value =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(value["commits"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn raw_lines_spliced_with_commas() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("raw.json");
        let mut writer = ReportWriter::create(&path, &header()).unwrap();
        writer.write_commit_raw("{\"hash\":\"x\"}").unwrap();
        writer.write_commit_raw("{\"hash\":\"y\"}").unwrap();
        assert_eq!(writer.commits_written(), 2);
        let path = writer
            .finish(&json!({}), "weekly", ProcessingTotals::default())
            .unwrap();
        let value: Value =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(value["commits"][1]["hash"], "y");
    }
}
