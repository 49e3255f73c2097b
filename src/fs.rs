mod dry_run;
mod local;
mod memory;

pub use dry_run::DryRunFs;
pub use local::LocalFs;
pub use memory::MemoryFs;

use crate::error::Result;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

/// Filesystem operations consumed by the engine.
///
/// The planner only ever calls the read-side methods. Everything that
/// mutates the destination tree goes through the executor, which is what
/// lets [`DryRunFs`] run the exact same code path without touching disk.
pub trait FileSystem: Send + Sync {
    /// Names of the entries directly inside `path`, in listing order.
    fn list_entries(&self, path: &Path) -> Result<Vec<String>>;

    /// Read a whole file.
    fn read_file(&self, path: &Path) -> Result<Vec<u8>>;

    /// Create or truncate a file with `data`.
    fn write_file(&self, path: &Path, data: &[u8]) -> Result<()>;

    /// Create a symlink at `link` pointing to `target`.
    fn create_symlink(&self, target: &Path, link: &Path) -> Result<()>;

    /// Copy `src` over `dst`.
    fn copy_file(&self, src: &Path, dst: &Path) -> Result<()>;

    /// Modification time, following symlinks. Fails if the path is absent.
    fn mod_time(&self, path: &Path) -> Result<DateTime<Utc>>;

    /// Whether `path` resolves to something. Dangling symlinks do not exist.
    fn exists(&self, path: &Path) -> bool;

    /// Whether `path` resolves to a directory.
    fn is_dir(&self, path: &Path) -> bool;

    /// Target of the symlink at `path`, if `path` is a symlink.
    fn read_link(&self, path: &Path) -> Option<PathBuf>;

    /// Remove a file or symlink.
    fn remove_file(&self, path: &Path) -> Result<()>;

    /// Create a directory and all missing parents.
    fn make_dirs(&self, path: &Path) -> Result<()>;
}

impl<T: FileSystem + ?Sized> FileSystem for &T {
    fn list_entries(&self, path: &Path) -> Result<Vec<String>> {
        (**self).list_entries(path)
    }

    fn read_file(&self, path: &Path) -> Result<Vec<u8>> {
        (**self).read_file(path)
    }

    fn write_file(&self, path: &Path, data: &[u8]) -> Result<()> {
        (**self).write_file(path, data)
    }

    fn create_symlink(&self, target: &Path, link: &Path) -> Result<()> {
        (**self).create_symlink(target, link)
    }

    fn copy_file(&self, src: &Path, dst: &Path) -> Result<()> {
        (**self).copy_file(src, dst)
    }

    fn mod_time(&self, path: &Path) -> Result<DateTime<Utc>> {
        (**self).mod_time(path)
    }

    fn exists(&self, path: &Path) -> bool {
        (**self).exists(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        (**self).is_dir(path)
    }

    fn read_link(&self, path: &Path) -> Option<PathBuf> {
        (**self).read_link(path)
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        (**self).remove_file(path)
    }

    fn make_dirs(&self, path: &Path) -> Result<()> {
        (**self).make_dirs(path)
    }
}
