// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Best-effort extraction of a line's own timestamp (spec §4.2: "the file's
//! last-line timestamp if parseable, else the current UTC time").

use chrono::{DateTime, Utc};

/// Try to parse an RFC3339 timestamp from the start of `line`, optionally
/// wrapped in `[...]` as many log formats do. Returns `None` if the line
/// doesn't start with something timestamp-shaped.
pub(crate) fn parse_leading_timestamp(line: &str) -> Option<DateTime<Utc>> {
    let trimmed = line.trim_start();
    let candidate = trimmed.strip_prefix('[').unwrap_or(trimmed);
    let token = candidate.split(|c: char| c.is_whitespace() || c == ']').next()?;
    DateTime::parse_from_rfc3339(token)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_leading_timestamp() {
        let ts = parse_leading_timestamp("2026-01-01T00:00:00Z request completed");
        assert_eq!(
            ts,
            Some(
                DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
                    .unwrap()
                    .with_timezone(&Utc)
            )
        );
    }

    #[test]
    fn parses_bracketed_leading_timestamp() {
        let ts = parse_leading_timestamp("[2026-01-01T00:00:00Z] request completed");
        assert!(ts.is_some());
    }

    #[test]
    fn returns_none_for_unparseable_line() {
        assert!(parse_leading_timestamp("not a timestamp at all").is_none());
    }
}
