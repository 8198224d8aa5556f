// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Expands configured paths/globs into the current set of files to tail
//! (spec §4.2 discovery). Supports `*`, `**`, `[abc]` via the `glob` crate
//! and one extra layer of `{a,b}` brace alternation the crate doesn't do
//! natively.

use std::collections::BTreeSet;
use std::path::PathBuf;
use tracing::warn;

/// Expand `{a,b,c}` alternation groups into separate patterns. Handles
/// nested/sequential groups by recursing on each expansion.
pub(crate) fn expand_braces(pattern: &str) -> Vec<String> {
    let Some(start) = pattern.find('{') else {
        return vec![pattern.to_string()];
    };
    let Some(end) = pattern[start..].find('}').map(|i| i + start) else {
        return vec![pattern.to_string()];
    };
    let prefix = &pattern[..start];
    let suffix = &pattern[end + 1..];
    let options = &pattern[start + 1..end];

    options
        .split(',')
        .flat_map(|opt| expand_braces(&format!("{prefix}{opt}{suffix}")))
        .collect()
}

fn has_glob_chars(s: &str) -> bool {
    s.contains('*') || s.contains('?') || s.contains('[')
}

/// Resolve the configured `paths` entries against the filesystem, returning
/// every regular file currently matched. Non-existent static paths and
/// patterns matching nothing are silently skipped; periodic rediscovery
/// picks them up once they appear.
pub fn discover(paths: &[String]) -> Vec<PathBuf> {
    let mut found = BTreeSet::new();

    for raw in paths {
        for expanded in expand_braces(raw) {
            if !has_glob_chars(&expanded) {
                let path = PathBuf::from(&expanded);
                if path.is_file() {
                    found.insert(path);
                }
                continue;
            }
            match glob::glob(&expanded) {
                Ok(entries) => {
                    for entry in entries.flatten() {
                        if entry.is_file() {
                            found.insert(entry);
                        }
                    }
                }
                Err(e) => warn!(pattern = %expanded, error = %e, "invalid glob pattern"),
            }
        }
    }

    found.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn expands_single_brace_group() {
        let out = expand_braces("/var/log/{app,worker}.log");
        assert_eq!(out, vec!["/var/log/app.log", "/var/log/worker.log"]);
    }

    #[test]
    fn leaves_pattern_without_braces_untouched() {
        assert_eq!(expand_braces("/var/log/*.log"), vec!["/var/log/*.log"]);
    }

    #[test]
    fn discovers_static_path_and_glob_matches() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.log"), b"").unwrap();
        fs::write(dir.path().join("b.log"), b"").unwrap();
        fs::write(dir.path().join("c.txt"), b"").unwrap();

        let pattern = dir.path().join("*.log").to_string_lossy().to_string();
        let found = discover(&[pattern]);
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn skips_missing_static_paths() {
        let found = discover(&["/nonexistent/path/for/tests.log".to_string()]);
        assert!(found.is_empty());
    }
}
