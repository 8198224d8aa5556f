// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! First-open seek resolution (spec §4.2).

use logcap_config::SeekStrategy;
use logcap_core::FilePosition;
use tracing::warn;

/// Resolve the byte offset a newly-discovered file should start tailing
/// from. A persisted position always wins, unless it's stale (offset beyond
/// current size), in which case it's reset to zero and the reset is logged.
pub(crate) fn resolve_offset(
    persisted: Option<&FilePosition>,
    strategy: SeekStrategy,
    recent_tail_bytes: u64,
    size: u64,
    path: &std::path::Path,
) -> u64 {
    if let Some(pos) = persisted {
        if pos.offset <= size {
            return pos.offset;
        }
        warn!(
            path = %path.display(),
            persisted_offset = pos.offset,
            size,
            "persisted offset beyond current file size, resetting to 0",
        );
        return 0;
    }

    match strategy {
        SeekStrategy::Beginning => 0,
        SeekStrategy::End => size,
        SeekStrategy::Recent => size.saturating_sub(recent_tail_bytes),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::path::PathBuf;

    fn position(offset: u64) -> FilePosition {
        let mut p = FilePosition::new(PathBuf::from("/var/log/app.log"), Utc::now());
        p.offset = offset;
        p
    }

    #[test]
    fn persisted_offset_wins_when_within_size() {
        let pos = position(42);
        let offset = resolve_offset(Some(&pos), SeekStrategy::End, 0, 1000, &pos.path.clone());
        assert_eq!(offset, 42);
    }

    #[test]
    fn persisted_offset_beyond_size_resets_to_zero() {
        let pos = position(5000);
        let offset = resolve_offset(Some(&pos), SeekStrategy::End, 0, 1000, &pos.path.clone());
        assert_eq!(offset, 0);
    }

    #[test]
    fn beginning_strategy_starts_at_zero() {
        let offset = resolve_offset(None, SeekStrategy::Beginning, 0, 1000, std::path::Path::new("x"));
        assert_eq!(offset, 0);
    }

    #[test]
    fn end_strategy_starts_at_current_size() {
        let offset = resolve_offset(None, SeekStrategy::End, 0, 1000, std::path::Path::new("x"));
        assert_eq!(offset, 1000);
    }

    #[test]
    fn recent_strategy_tails_last_n_bytes() {
        let offset = resolve_offset(None, SeekStrategy::Recent, 256, 1000, std::path::Path::new("x"));
        assert_eq!(offset, 744);
    }

    #[test]
    fn recent_strategy_clamps_at_zero_for_small_files() {
        let offset = resolve_offset(None, SeekStrategy::Recent, 65536, 1000, std::path::Path::new("x"));
        assert_eq!(offset, 0);
    }
}
