//! Filesystem helpers
//!
//! Copies keep permission bits and, where the process is allowed to, file
//! ownership. Feature scripts depend on their executable bits surviving the
//! trip into the generated buildpack and into build layers.

use crate::errors::{DevpackerError, Result};
use std::fs;
use std::os::unix::fs::{chown, symlink, MetadataExt, PermissionsExt};
use std::path::Path;
use tracing::{debug, warn};

/// Copy one file, keeping its mode and owner
pub fn copy_file(src: &Path, dst: &Path) -> Result<()> {
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent).map_err(|e| DevpackerError::io(parent, e))?;
    }
    if dst.symlink_metadata().is_ok_and(|m| !m.is_dir()) {
        fs::remove_file(dst).map_err(|e| DevpackerError::io(dst, e))?;
    }
    fs::copy(src, dst).map_err(|e| DevpackerError::io(src, e))?;
    let metadata = fs::metadata(src).map_err(|e| DevpackerError::io(src, e))?;
    fs::set_permissions(dst, metadata.permissions()).map_err(|e| DevpackerError::io(dst, e))?;
    copy_owner(&metadata, dst);
    Ok(())
}

/// Recursively copy `src` into `dst`, creating `dst` as needed
pub fn copy_dir_all(src: &Path, dst: &Path) -> Result<()> {
    fs::create_dir_all(dst).map_err(|e| DevpackerError::io(dst, e))?;
    let metadata = fs::metadata(src).map_err(|e| DevpackerError::io(src, e))?;
    // A read-only dst from an earlier copy must accept children
    let existing = fs::metadata(dst).map_err(|e| DevpackerError::io(dst, e))?;
    if existing.permissions().mode() & 0o700 != 0o700 {
        fs::set_permissions(
            dst,
            fs::Permissions::from_mode(existing.permissions().mode() | 0o700),
        )
        .map_err(|e| DevpackerError::io(dst, e))?;
    }

    for entry in fs::read_dir(src).map_err(|e| DevpackerError::io(src, e))? {
        let entry = entry.map_err(|e| DevpackerError::io(src, e))?;
        let ty = entry
            .file_type()
            .map_err(|e| DevpackerError::io(entry.path(), e))?;
        let target = dst.join(entry.file_name());
        if ty.is_dir() {
            copy_dir_all(&entry.path(), &target)?;
        } else if ty.is_symlink() {
            let link = fs::read_link(entry.path()).map_err(|e| DevpackerError::io(entry.path(), e))?;
            if target.symlink_metadata().is_ok() {
                fs::remove_file(&target).map_err(|e| DevpackerError::io(&target, e))?;
            }
            symlink(&link, &target).map_err(|e| DevpackerError::io(&target, e))?;
        } else {
            copy_file(&entry.path(), &target)?;
        }
    }

    fs::set_permissions(dst, metadata.permissions()).map_err(|e| DevpackerError::io(dst, e))?;
    copy_owner(&metadata, dst);
    Ok(())
}

/// Copy `src` to `dst` if it exists; returns whether anything was copied
pub fn copy_if_exists(src: &Path, dst: &Path) -> Result<bool> {
    if src.is_dir() {
        copy_dir_all(src, dst)?;
    } else if src.is_file() {
        copy_file(src, dst)?;
    } else {
        debug!("Skipping missing {}", src.display());
        return Ok(false);
    }
    Ok(true)
}

/// Write `contents` to `path` with the given mode, creating parent folders
pub fn write_file(path: &Path, contents: impl AsRef<[u8]>, mode: u32) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| DevpackerError::io(parent, e))?;
    }
    fs::write(path, contents).map_err(|e| DevpackerError::io(path, e))?;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
        .map_err(|e| DevpackerError::io(path, e))?;
    Ok(())
}

/// Remove everything inside `dir`, leaving `dir` itself in place
pub fn clear_dir(dir: &Path) -> Result<()> {
    for entry in fs::read_dir(dir).map_err(|e| DevpackerError::io(dir, e))? {
        let entry = entry.map_err(|e| DevpackerError::io(dir, e))?;
        let path = entry.path();
        let is_dir = entry
            .file_type()
            .map_err(|e| DevpackerError::io(&path, e))?
            .is_dir();
        if is_dir {
            fs::remove_dir_all(&path).map_err(|e| DevpackerError::io(&path, e))?;
        } else {
            fs::remove_file(&path).map_err(|e| DevpackerError::io(&path, e))?;
        }
    }
    Ok(())
}

fn copy_owner(metadata: &fs::Metadata, dst: &Path) {
    if let Err(e) = chown(dst, Some(metadata.uid()), Some(metadata.gid())) {
        warn!("Could not set owner of {}: {}", dst.display(), e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_copy_dir_all_keeps_modes() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        write_file(&src.join("bin").join("acquire"), "#!/bin/sh\n", 0o755).unwrap();
        write_file(&src.join("notes.txt"), "notes", 0o640).unwrap();
        symlink("notes.txt", src.join("link")).unwrap();

        let dst = dir.path().join("dst");
        copy_dir_all(&src, &dst).unwrap();

        let mode = |p: &Path| fs::metadata(p).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode(&dst.join("bin").join("acquire")), 0o755);
        assert_eq!(mode(&dst.join("notes.txt")), 0o640);
        assert_eq!(
            fs::read_link(dst.join("link")).unwrap(),
            Path::new("notes.txt")
        );

        // Copying again over an existing tree succeeds
        copy_dir_all(&src, &dst).unwrap();
    }

    #[test]
    fn test_copy_dir_all_read_only_source() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        write_file(&src.join("bin").join("acquire"), "#!/bin/sh\n", 0o755).unwrap();
        write_file(&src.join("README"), "docs", 0o444).unwrap();
        fs::set_permissions(src.join("bin"), fs::Permissions::from_mode(0o555)).unwrap();
        fs::set_permissions(&src, fs::Permissions::from_mode(0o555)).unwrap();

        let dst = dir.path().join("dst");
        copy_dir_all(&src, &dst).unwrap();
        // A second copy lands on the now read-only tree
        copy_dir_all(&src, &dst).unwrap();

        let mode = |p: &Path| fs::metadata(p).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode(&dst), 0o555);
        assert_eq!(mode(&dst.join("bin")), 0o555);
        assert_eq!(mode(&dst.join("bin").join("acquire")), 0o755);
        assert_eq!(fs::read_to_string(dst.join("README")).unwrap(), "docs");

        for path in [&src, &src.join("bin"), &dst, &dst.join("bin")] {
            fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
        }
    }

    #[test]
    fn test_copy_if_exists() {
        let dir = TempDir::new().unwrap();
        assert!(!copy_if_exists(&dir.path().join("missing"), &dir.path().join("out")).unwrap());
        assert!(!dir.path().join("out").exists());

        fs::write(dir.path().join("a.json"), "{}").unwrap();
        assert!(copy_if_exists(&dir.path().join("a.json"), &dir.path().join("out/a.json")).unwrap());
        assert!(dir.path().join("out/a.json").is_file());
    }

    #[test]
    fn test_clear_dir() {
        let dir = TempDir::new().unwrap();
        write_file(&dir.path().join("a/b/c.txt"), "x", 0o644).unwrap();
        write_file(&dir.path().join(".hidden"), "x", 0o644).unwrap();
        clear_dir(dir.path()).unwrap();
        assert!(dir.path().is_dir());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
