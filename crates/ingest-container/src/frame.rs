// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Decodes the container daemon's multiplexed log stream: an 8-byte header
//! (stream type + big-endian payload length) followed by that many bytes of
//! payload, repeated for the life of the connection (spec §4.1 step 3).

use chrono::{DateTime, Utc};
use logcap_core::StreamKind;

pub(crate) const HEADER_LEN: usize = 8;

pub(crate) fn decode_header(header: &[u8; HEADER_LEN]) -> (StreamKind, usize) {
    let stream_kind = match header[0] {
        1 => StreamKind::Stdout,
        2 => StreamKind::Stderr,
        _ => StreamKind::Unknown,
    };
    let len = u32::from_be_bytes([header[4], header[5], header[6], header[7]]) as usize;
    (stream_kind, len)
}

/// A log line was requested with `timestamps=true`, so each line in the
/// frame payload is prefixed with an RFC3339Nano timestamp followed by a
/// space. Falls back to `now` if the line doesn't start with one.
pub(crate) fn split_timestamped_lines(payload: &str, now: DateTime<Utc>) -> Vec<(DateTime<Utc>, String)> {
    payload
        .lines()
        .filter(|line| !line.is_empty())
        .map(|line| match line.split_once(' ') {
            Some((ts, rest)) => match DateTime::parse_from_rfc3339(ts) {
                Ok(parsed) => (parsed.with_timezone(&Utc), rest.to_string()),
                Err(_) => (now, line.to_string()),
            },
            None => (now, line.to_string()),
        })
        .collect()
}
