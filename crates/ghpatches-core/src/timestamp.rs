//! Hourly timestamp tokens and range generation.
//!
//! The archive names each hourly dump `YYYY-MM-DD-H.json.gz`: date fields are
//! zero-padded, the hour is not. A [`TimestampToken`] is that name stem, and
//! doubles as the cache key for the chunk.
//!
//! # Range rules
//!
//! - both bounds empty: the previous UTC hour
//! - exactly one bound empty: nothing to do
//! - `from` valid, `to` not: [`Error::TimeOverflow`]
//! - any other invalid bound: [`Error::TimestampFormat`]
//! - otherwise every hour from `from` to `to`, inclusive, stepping backward
//!   when `from` is later than `to`

use crate::error::{Error, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta, Utc};
use std::fmt;

/// Layout used when formatting hours before the hour padding is stripped.
const TOKEN_LAYOUT: &str = "%Y-%m-%d-%H";

/// Upper bound on the pre-allocation for one range (one leap year of hours).
const MAX_PREALLOCATED_TOKENS: usize = 366 * 24;

/// Identifier of one hourly chunk, e.g. `2024-01-15-5`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TimestampToken(String);

impl TimestampToken {
    /// Build the token for the hour containing `at`.
    pub fn from_datetime(at: NaiveDateTime) -> Self {
        Self(strip_hour_padding(&at.format(TOKEN_LAYOUT).to_string()))
    }

    /// The token as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File name of the compressed dump for this hour.
    pub fn archive_file_name(&self) -> String {
        format!("{}.json.gz", self.0)
    }
}

impl fmt::Display for TimestampToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TimestampToken {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Generate the tokens to fetch for `(from, to)`, relative to the current time.
///
/// See the module docs for the rules. Invalid ranges return an input
/// validation error, which callers should treat as an empty range.
pub fn generate(from: &str, to: &str) -> Result<Vec<TimestampToken>> {
    generate_at(from, to, Utc::now())
}

/// Like [`generate`], with an explicit notion of "now".
pub fn generate_at(from: &str, to: &str, now: DateTime<Utc>) -> Result<Vec<TimestampToken>> {
    match (from.is_empty(), to.is_empty()) {
        (true, true) => {
            let previous_hour = now - TimeDelta::hours(1);
            return Ok(vec![TimestampToken::from_datetime(previous_hour.naive_utc())]);
        }
        (true, false) | (false, true) => return Ok(Vec::new()),
        (false, false) => {}
    }

    let (start, end) = match (parse_timestamp(from), parse_timestamp(to)) {
        (Some(start), Some(end)) => (start, end),
        (Some(_), None) => {
            return Err(Error::TimeOverflow {
                from: from.to_string(),
            });
        }
        _ => {
            return Err(Error::TimestampFormat {
                from: from.to_string(),
                to: to.to_string(),
            });
        }
    };

    let step = if start > end {
        TimeDelta::hours(-1)
    } else {
        TimeDelta::hours(1)
    };

    // Both bounds sit on whole hours, so stepping lands on `end` exactly.
    let mut tokens = Vec::with_capacity(capacity_hint(start, end));
    let mut current = start;
    loop {
        tokens.push(TimestampToken::from_datetime(current));
        if current == end {
            break;
        }
        current += step;
    }

    Ok(tokens)
}

/// Tokens to reserve up front: the span in hours, capped at one year.
fn capacity_hint(start: NaiveDateTime, end: NaiveDateTime) -> usize {
    let span = (end - start).num_hours().unsigned_abs().saturating_add(1);
    usize::try_from(span).map_or(MAX_PREALLOCATED_TOKENS, |n| n.min(MAX_PREALLOCATED_TOKENS))
}

/// Parse a `year-month-day-hour` bound.
///
/// The year has four digits; month, day and hour take one or two.
fn parse_timestamp(input: &str) -> Option<NaiveDateTime> {
    let mut parts = input.split('-');
    let (year, month, day, hour) = (parts.next()?, parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }

    if !is_digits(year, 4, 4)
        || !is_digits(month, 1, 2)
        || !is_digits(day, 1, 2)
        || !is_digits(hour, 1, 2)
    {
        return None;
    }

    let date = NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, day.parse().ok()?)?;
    date.and_hms_opt(hour.parse().ok()?, 0, 0)
}

fn is_digits(s: &str, min: usize, max: usize) -> bool {
    (min..=max).contains(&s.len()) && s.bytes().all(|b| b.is_ascii_digit())
}

/// Drop exactly one leading zero from the hour component.
///
/// `2024-01-02-05` becomes `2024-01-02-5` and `-00` becomes `-0`; date
/// components are never touched.
fn strip_hour_padding(raw: &str) -> String {
    let mut parts: Vec<&str> = raw.split('-').collect();
    if parts.len() == 4
        && let Some(stripped) = parts[3].strip_prefix('0')
        && !stripped.is_empty()
    {
        parts[3] = stripped;
    }
    parts.join("-")
}
