//! Filesystem port backed by the real disk.

use crate::error::{AppError, Result};
use crate::fs::FileSystem;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Handler for the local filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFs;

impl FileSystem for LocalFs {
    fn list_entries(&self, path: &Path) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in WalkDir::new(path).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| AppError::Io(e.into()))?;
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        Ok(names)
    }

    fn read_file(&self, path: &Path) -> Result<Vec<u8>> {
        Ok(std::fs::read(path)?)
    }

    fn write_file(&self, path: &Path, data: &[u8]) -> Result<()> {
        std::fs::write(path, data).map_err(|e| AppError::write(path, e))
    }

    fn create_symlink(&self, target: &Path, link: &Path) -> Result<()> {
        #[cfg(unix)]
        let result = std::os::unix::fs::symlink(target, link);
        #[cfg(windows)]
        let result = std::os::windows::fs::symlink_file(target, link);

        result.map_err(|e| AppError::write(link, e))
    }

    fn copy_file(&self, src: &Path, dst: &Path) -> Result<()> {
        std::fs::copy(src, dst)
            .map(|_| ())
            .map_err(|e| AppError::write(dst, e))
    }

    fn mod_time(&self, path: &Path) -> Result<DateTime<Utc>> {
        let modified = std::fs::metadata(path)?.modified()?;
        Ok(DateTime::<Utc>::from(modified))
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn read_link(&self, path: &Path) -> Option<PathBuf> {
        std::fs::read_link(path).ok()
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        std::fs::remove_file(path).map_err(|e| AppError::write(path, e))
    }

    fn make_dirs(&self, path: &Path) -> Result<()> {
        std::fs::create_dir_all(path).map_err(|e| AppError::write(path, e))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn symlink_round_trip_and_dangling_detection() {
        let dir = tempfile::tempdir().unwrap();
        let fs = LocalFs;
        let target = dir.path().join("book.epub");
        let link = dir.path().join("out").join("book.epub");

        fs.write_file(&target, b"epub").unwrap();
        fs.make_dirs(link.parent().unwrap()).unwrap();
        fs.create_symlink(&target, &link).unwrap();

        assert!(fs.exists(&link));
        assert_eq!(fs.read_link(&link), Some(target.clone()));
        assert_eq!(fs.read_file(&link).unwrap(), b"epub");

        std::fs::remove_file(&target).unwrap();
        assert!(!fs.exists(&link));
        assert!(fs.read_link(&link).is_some());
    }

    #[test]
    fn lists_direct_children_only() {
        let dir = tempfile::tempdir().unwrap();
        let fs = LocalFs;
        fs.make_dirs(&dir.path().join("Author").join("Book (1)")).unwrap();
        fs.write_file(&dir.path().join("top.txt"), b"").unwrap();

        let mut names = fs.list_entries(dir.path()).unwrap();
        names.sort();
        assert_eq!(names, vec!["Author".to_string(), "top.txt".to_string()]);
    }

    #[test]
    fn mod_time_fails_for_missing_path() {
        let dir = tempfile::tempdir().unwrap();
        assert!(LocalFs.mod_time(&dir.path().join("nope")).is_err());
    }
}
