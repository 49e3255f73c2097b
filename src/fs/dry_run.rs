//! Read-through wrapper that suppresses every mutation.

use crate::error::Result;
use crate::fs::FileSystem;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Wraps another filesystem, forwarding reads and logging writes instead of
/// performing them.
#[derive(Debug)]
pub struct DryRunFs<F> {
    inner: F,
    suppressed: AtomicUsize,
}

impl<F: FileSystem> DryRunFs<F> {
    /// Wrap `inner`.
    pub fn new(inner: F) -> Self {
        Self {
            inner,
            suppressed: AtomicUsize::new(0),
        }
    }

    /// Number of mutating calls that were swallowed so far.
    pub fn suppressed(&self) -> usize {
        self.suppressed.load(Ordering::Relaxed)
    }

    fn skip(&self, op: &str, path: &Path) {
        self.suppressed.fetch_add(1, Ordering::Relaxed);
        tracing::info!(op, path = %path.display(), "dry run: skipped");
    }
}

impl<F: FileSystem> FileSystem for DryRunFs<F> {
    fn list_entries(&self, path: &Path) -> Result<Vec<String>> {
        self.inner.list_entries(path)
    }

    fn read_file(&self, path: &Path) -> Result<Vec<u8>> {
        self.inner.read_file(path)
    }

    fn write_file(&self, path: &Path, _data: &[u8]) -> Result<()> {
        self.skip("write", path);
        Ok(())
    }

    fn create_symlink(&self, _target: &Path, link: &Path) -> Result<()> {
        self.skip("symlink", link);
        Ok(())
    }

    fn copy_file(&self, _src: &Path, dst: &Path) -> Result<()> {
        self.skip("copy", dst);
        Ok(())
    }

    fn mod_time(&self, path: &Path) -> Result<DateTime<Utc>> {
        self.inner.mod_time(path)
    }

    fn exists(&self, path: &Path) -> bool {
        self.inner.exists(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.inner.is_dir(path)
    }

    fn read_link(&self, path: &Path) -> Option<PathBuf> {
        self.inner.read_link(path)
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        self.skip("remove", path);
        Ok(())
    }

    fn make_dirs(&self, path: &Path) -> Result<()> {
        self.skip("mkdir", path);
        Ok(())
    }
}
