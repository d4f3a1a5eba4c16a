//! ISO-week bucketing: Monday keys and weekly date ranges.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};

/// Week key of a timestamp: the date of the Monday of its week,
/// formatted `YYYY-MM-DD`.
pub fn week_key(when: NaiveDateTime) -> String {
    monday_of(when.date()).format("%Y-%m-%d").to_string()
}

/// Day key of a timestamp, `YYYY-MM-DD`.
pub fn day_key(when: NaiveDateTime) -> String {
    when.date().format("%Y-%m-%d").to_string()
}

/// The Monday of the week containing `date`.
pub fn monday_of(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

/// True iff `when` lies inside the configured `[since, to]` range.
///
/// Commits outside the range are skipped entirely; they feed neither the
/// overall bucket nor any weekly bucket.
pub fn in_range(
    when: NaiveDateTime,
    since: Option<NaiveDateTime>,
    to: Option<NaiveDateTime>,
) -> bool {
    if let Some(since) = since {
        if when < since {
            return false;
        }
    }
    if let Some(to) = to {
        if when > to {
            return false;
        }
    }
    true
}
