//! Date-range chunking for large repositories.
//!
//! Histories of 500+ commits are split into contiguous equal-day
//! sub-ranges, each traversed independently; the per-chunk snapshots are
//! then fused through the accumulators' merge algebras, and the per-chunk
//! commit files are spliced into the final artifact.

use chrono::{Duration, NaiveDateTime};

/// Commit count at which a repository is considered large.
pub const LARGE_REPO_COMMITS: usize = 500;

/// Divisor mapping commit count to chunk count.
pub const COMMITS_PER_CHUNK: usize = 200;

/// Upper bound on chunks per repository.
pub const MAX_CHUNKS: usize = 4;

/// True iff a history of `commit_count` commits should be chunked.
pub fn should_split(commit_count: usize) -> bool {
    commit_count >= LARGE_REPO_COMMITS
}

/// Number of chunks for a large history: `min(4, max(2, count / 200))`.
pub fn chunk_count(commit_count: usize) -> usize {
    (commit_count / COMMITS_PER_CHUNK).clamp(2, MAX_CHUNKS)
}

/// Splits `[start, end]` into contiguous sub-ranges of equal days; the
/// last range absorbs any remainder.
pub fn split_date_range(
    start: NaiveDateTime,
    end: NaiveDateTime,
    chunks: usize,
) -> Vec<(NaiveDateTime, NaiveDateTime)> {
    if chunks <= 1 || end <= start {
        return vec![(start, end)];
    }

    let total_days = (end - start).num_days() + 1;
    let days_per_chunk = (total_days / chunks as i64).max(1);

    let mut ranges = Vec::with_capacity(chunks);
    let mut chunk_start = start;

    for i in 0..chunks {
        let chunk_end = if i == chunks - 1 {
            end
        } else {
            let candidate = chunk_start + Duration::days(days_per_chunk - 1)
                + Duration::hours(23)
                + Duration::minutes(59)
                + Duration::seconds(59);
            candidate.min(end)
        };

        ranges.push((chunk_start, chunk_end));
        chunk_start = chunk_end + Duration::seconds(1);
        if chunk_start > end {
            break;
        }
    }

    ranges
}

/// Identifier used in per-chunk temp file names.
pub fn chunk_id(start: NaiveDateTime, end: NaiveDateTime) -> String {
    format!(
        "{}_to_{}",
        start.format("%Y%m%d"),
        end.format("%Y%m%d")
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn split_threshold() {
        assert!(!should_split(499));
        assert!(should_split(500));
    }

    #[test]
    fn chunk_count_bounds() {
        assert_eq!(chunk_count(500), 2);
        assert_eq!(chunk_count(600), 3);
        assert_eq!(chunk_count(800), 4);
        assert_eq!(chunk_count(10_000), 4);
    }

    #[test]
    fn ranges_are_contiguous_and_cover() {
        let start = at(2024, 1, 1);
        let end = at(2024, 3, 31);
        let ranges = split_date_range(start, end, 3);

        assert_eq!(ranges.len(), 3);
        assert_eq!(ranges[0].0, start);
        assert_eq!(ranges[ranges.len() - 1].1, end);
        for pair in ranges.windows(2) {
            assert_eq!(pair[1].0, pair[0].1 + Duration::seconds(1));
        }
    }

    #[test]
    fn last_range_absorbs_remainder() {
        let start = at(2024, 1, 1);
        let end = at(2024, 1, 10);
        let ranges = split_date_range(start, end, 3);
        // 10 days / 3 = 3 days per chunk; the final chunk gets the rest.
        assert_eq!(ranges[ranges.len() - 1].1, end);
        assert!(ranges[ranges.len() - 1].1 - ranges[ranges.len() - 1].0 >= Duration::days(3));
    }

    #[test]
    fn degenerate_range_single_chunk() {
        let day = at(2024, 1, 1);
        let ranges = split_date_range(day, day, 4);
        assert_eq!(ranges, vec![(day, day)]);
    }

    #[test]
    fn chunk_id_format() {
        assert_eq!(
            chunk_id(at(2024, 1, 1), at(2024, 2, 1)),
            "20240101_to_20240201"
        );
    }
}
