//! Repository catalog input and run-resume caches.

pub mod cache;

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub use cache::{CompletedUsers, ProcessedFilesCache};

/// One catalog row: a repository to mine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CatalogEntry {
    /// Owning user or organization.
    pub username: String,
    /// Short repository name.
    pub repo_name: String,
    /// Clone URL.
    pub url: String,
}

/// Reads the catalog CSV (`username,repo_name,url`).
///
/// A UTF-8 BOM on the header is stripped; rows missing any of the three
/// fields are skipped with a warning rather than failing the run.
pub fn read_catalog(path: &Path) -> Result<Vec<CatalogEntry>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Failed to open catalog: {}", path.display()))?;

    {
        let headers = reader
            .headers()
            .with_context(|| format!("Failed to read catalog headers: {}", path.display()))?;
        let cleaned: csv::StringRecord = headers
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}'))
            .collect();
        reader.set_headers(cleaned);
    }

    let mut entries = Vec::new();
    for (index, row) in reader.deserialize::<RawRow>().enumerate() {
        let row = match row {
            Ok(row) => row,
            Err(err) => {
                warn!(row = index + 1, error = %err, "skipping malformed catalog row");
                continue;
            }
        };
        match row.into_entry() {
            Some(entry) => entries.push(entry),
            None => {
                warn!(row = index + 1, "skipping catalog row with missing fields");
            }
        }
    }

    debug!(path = %path.display(), entries = entries.len(), "catalog loaded");
    Ok(entries)
}

#[derive(Debug, Deserialize)]
struct RawRow {
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    repo_name: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

impl RawRow {
    fn into_entry(self) -> Option<CatalogEntry> {
        let username = self.username.filter(|s| !s.is_empty())?;
        let repo_name = self.repo_name.filter(|s| !s.is_empty())?;
        let url = self.url.filter(|s| !s.is_empty())?;
        Some(CatalogEntry {
            username,
            repo_name,
            url,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_catalog(content: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("repos.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        (dir, path)
    }

    #[test]
    fn reads_well_formed_rows() {
        let (_dir, path) = write_catalog(
            "username,repo_name,url\n\
             acme,widgets,https://example.com/acme/widgets.git\n\
             acme,gears,https://example.com/acme/gears.git\n",
        );
        let entries = read_catalog(&path).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].username, "acme");
        assert_eq!(entries[1].repo_name, "gears");
    }

    #[test]
    fn skips_rows_with_missing_fields() {
        let (_dir, path) = write_catalog(
            "username,repo_name,url\n\
             acme,,https://example.com/a.git\n\
             acme,ok,https://example.com/ok.git\n\
             ,b,https://example.com/b.git\n",
        );
        let entries = read_catalog(&path).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].repo_name, "ok");
    }

    #[test]
    fn strips_bom_from_header() {
        let (_dir, path) = write_catalog(
            "\u{feff}username,repo_name,url\n\
             acme,widgets,https://example.com/w.git\n",
        );
        let entries = read_catalog(&path).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].username, "acme");
    }
}
