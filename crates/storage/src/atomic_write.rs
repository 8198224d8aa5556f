// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Atomic-write and backup-rotation helpers shared by the position store and
//! DLQ store: write to `.tmp`, fsync, rename.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Write `data` to `path` atomically: serialize to a sibling `.tmp` file,
/// fsync it, then rename over the destination.
pub fn write_atomic(path: &Path, data: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp_path = path.with_extension("tmp");
    {
        let mut file = File::create(&tmp_path)?;
        file.write_all(data)?;
        file.sync_all()?;
    }
    fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Move an unreadable `path` aside to `path.corrupted`, overwriting any
/// earlier quarantine file. Distinct from [`rotate_backups`]: a corrupt live
/// file must never land on `.1`, where it would clobber the newest genuine
/// backup generation that recovery should fall back to.
pub fn quarantine(path: &Path) -> std::io::Result<PathBuf> {
    let quarantined = PathBuf::from(format!("{}.corrupted", path.to_string_lossy()));
    fs::rename(path, &quarantined)?;
    Ok(quarantined)
}

/// Rotate `path.1`, `path.2`, ... up to `generations`, dropping the oldest,
/// then move `path` itself into the freed `path.1` slot. Called before each
/// flush to keep historical backups around.
pub fn rotate_backups(path: &Path, generations: u32) -> std::io::Result<PathBuf> {
    let path_str = path.to_string_lossy().into_owned();
    let numbered = |n: u32| PathBuf::from(format!("{path_str}.{n}"));

    if generations == 0 {
        let _ = fs::remove_file(path);
        return Ok(path.to_path_buf());
    }

    let oldest = numbered(generations);
    if oldest.exists() {
        let _ = fs::remove_file(&oldest);
    }
    for n in (1..generations).rev() {
        let src = numbered(n);
        if src.exists() {
            let _ = fs::rename(&src, numbered(n + 1));
        }
    }

    let target = numbered(1);
    if path.exists() {
        fs::rename(path, &target)?;
    }
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_atomic_leaves_no_tmp_file_behind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        write_atomic(&path, b"{}").unwrap();
        assert!(path.exists());
        assert!(!path.with_extension("tmp").exists());
        assert_eq!(fs::read(&path).unwrap(), b"{}");
    }

    #[test]
    fn rotate_backups_shifts_generations_and_drops_oldest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("positions.json");
        fs::write(&path, b"gen0").unwrap();
        let target = rotate_backups(&path, 3).unwrap();
        assert_eq!(fs::read(&target).unwrap(), b"gen0");

        fs::write(&path, b"gen1").unwrap();
        rotate_backups(&path, 3).unwrap();
        assert_eq!(
            fs::read(dir.path().join("positions.json.1")).unwrap(),
            b"gen1"
        );
        assert_eq!(
            fs::read(dir.path().join("positions.json.2")).unwrap(),
            b"gen0"
        );

        fs::write(&path, b"gen2").unwrap();
        rotate_backups(&path, 3).unwrap();
        fs::write(&path, b"gen3").unwrap();
        rotate_backups(&path, 3).unwrap();
        // Only 3 generations kept; the original gen0 has been pushed out.
        assert!(!dir.path().join("positions.json.4").exists());
    }
}
