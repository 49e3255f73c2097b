//! In-memory filesystem with a logical clock.

use crate::error::{AppError, Result};
use crate::fs::FileSystem;
use chrono::{DateTime, Duration, TimeZone, Utc};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

const MAX_LINK_DEPTH: usize = 8;

#[derive(Debug, Clone)]
enum Node {
    Dir,
    File {
        data: Vec<u8>,
        modified: DateTime<Utc>,
    },
    Symlink {
        target: PathBuf,
    },
}

#[derive(Debug)]
struct Inner {
    nodes: BTreeMap<PathBuf, Node>,
    clock: DateTime<Utc>,
}

impl Inner {
    /// Advance the clock and return the new time.
    fn tick(&mut self) -> DateTime<Utc> {
        self.clock += Duration::seconds(1);
        self.clock
    }

    /// Follow symlinks until a non-link node (or nothing) is reached.
    fn resolve(&self, path: &Path) -> Option<(PathBuf, &Node)> {
        let mut current = path.to_path_buf();
        for _ in 0..MAX_LINK_DEPTH {
            match self.nodes.get(&current)? {
                Node::Symlink { target } => current = target.clone(),
                node => return Some((current, node)),
            }
        }
        None
    }

    fn parent_is_dir(&self, path: &Path) -> bool {
        match path.parent() {
            Some(parent) if parent.as_os_str().is_empty() => true,
            Some(parent) => matches!(self.resolve(parent), Some((_, Node::Dir))),
            None => true,
        }
    }

    fn insert_dirs(&mut self, path: &Path) {
        for ancestor in path.ancestors() {
            if ancestor.as_os_str().is_empty() {
                continue;
            }
            self.nodes
                .entry(ancestor.to_path_buf())
                .or_insert(Node::Dir);
        }
    }
}

/// Filesystem that lives entirely in memory.
///
/// Every mutation advances a logical clock by one second, so "written later"
/// always means "newer" without depending on the host's timestamp
/// resolution.
#[derive(Debug)]
pub struct MemoryFs {
    inner: Mutex<Inner>,
}

impl Default for MemoryFs {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryFs {
    /// Create an empty filesystem.
    pub fn new() -> Self {
        let start = Utc
            .timestamp_opt(1_700_000_000, 0)
            .single()
            .unwrap_or_else(Utc::now);
        Self {
            inner: Mutex::new(Inner {
                nodes: BTreeMap::new(),
                clock: start,
            }),
        }
    }

    /// Add a file, creating its parent directories.
    pub fn add_file(&self, path: impl AsRef<Path>, data: impl Into<Vec<u8>>) {
        let path = path.as_ref();
        let mut inner = self.inner.lock();
        if let Some(parent) = path.parent() {
            inner.insert_dirs(parent);
        }
        let modified = inner.tick();
        inner.nodes.insert(
            path.to_path_buf(),
            Node::File {
                data: data.into(),
                modified,
            },
        );
    }

    /// Add a directory and its parents.
    pub fn add_dir(&self, path: impl AsRef<Path>) {
        self.inner.lock().insert_dirs(path.as_ref());
    }

    /// Bump the modification time of a file.
    pub fn touch(&self, path: impl AsRef<Path>) {
        let mut inner = self.inner.lock();
        let now = inner.tick();
        if let Some(Node::File { modified, .. }) = inner.nodes.get_mut(path.as_ref()) {
            *modified = now;
        }
    }

    /// Remove any node at `path` (used to simulate external deletions).
    pub fn remove(&self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        self.inner
            .lock()
            .nodes
            .retain(|p, _| p != path && !p.starts_with(path));
    }

    /// Read a file as UTF-8, following symlinks.
    pub fn read_string(&self, path: impl AsRef<Path>) -> Option<String> {
        let data = self.read_file(path.as_ref()).ok()?;
        String::from_utf8(data).ok()
    }
}

fn not_found(path: &Path) -> AppError {
    AppError::NotFound(path.to_path_buf())
}

fn write_err(path: &Path, kind: io::ErrorKind, message: &str) -> AppError {
    AppError::write(path, io::Error::new(kind, message.to_string()))
}

impl FileSystem for MemoryFs {
    fn list_entries(&self, path: &Path) -> Result<Vec<String>> {
        let inner = self.inner.lock();
        let dir = match inner.resolve(path) {
            Some((dir, Node::Dir)) => dir,
            _ => return Err(not_found(path)),
        };

        Ok(inner
            .nodes
            .keys()
            .filter(|p| p.parent() == Some(dir.as_path()))
            .filter_map(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .collect())
    }

    fn read_file(&self, path: &Path) -> Result<Vec<u8>> {
        match self.inner.lock().resolve(path) {
            Some((_, Node::File { data, .. })) => Ok(data.clone()),
            _ => Err(not_found(path)),
        }
    }

    fn write_file(&self, path: &Path, data: &[u8]) -> Result<()> {
        let mut inner = self.inner.lock();
        if !inner.parent_is_dir(path) {
            return Err(write_err(path, io::ErrorKind::NotFound, "parent missing"));
        }
        if matches!(inner.nodes.get(path), Some(Node::Dir)) {
            return Err(write_err(path, io::ErrorKind::Other, "is a directory"));
        }
        let modified = inner.tick();
        inner.nodes.insert(
            path.to_path_buf(),
            Node::File {
                data: data.to_vec(),
                modified,
            },
        );
        Ok(())
    }

    fn create_symlink(&self, target: &Path, link: &Path) -> Result<()> {
        let mut inner = self.inner.lock();
        if !inner.parent_is_dir(link) {
            return Err(write_err(link, io::ErrorKind::NotFound, "parent missing"));
        }
        if inner.nodes.contains_key(link) {
            return Err(write_err(link, io::ErrorKind::AlreadyExists, "link exists"));
        }
        inner.tick();
        inner.nodes.insert(
            link.to_path_buf(),
            Node::Symlink {
                target: target.to_path_buf(),
            },
        );
        Ok(())
    }

    fn copy_file(&self, src: &Path, dst: &Path) -> Result<()> {
        let data = self.read_file(src)?;
        self.write_file(dst, &data)
    }

    fn mod_time(&self, path: &Path) -> Result<DateTime<Utc>> {
        let inner = self.inner.lock();
        match inner.resolve(path) {
            Some((_, Node::File { modified, .. })) => Ok(*modified),
            Some((_, Node::Dir)) => Ok(inner.clock),
            _ => Err(not_found(path)),
        }
    }

    fn exists(&self, path: &Path) -> bool {
        self.inner.lock().resolve(path).is_some()
    }

    fn is_dir(&self, path: &Path) -> bool {
        matches!(self.inner.lock().resolve(path), Some((_, Node::Dir)))
    }

    fn read_link(&self, path: &Path) -> Option<PathBuf> {
        match self.inner.lock().nodes.get(path) {
            Some(Node::Symlink { target }) => Some(target.clone()),
            _ => None,
        }
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        let mut inner = self.inner.lock();
        match inner.nodes.get(path) {
            Some(Node::File { .. }) | Some(Node::Symlink { .. }) => {
                inner.nodes.remove(path);
                Ok(())
            }
            Some(Node::Dir) => Err(write_err(path, io::ErrorKind::Other, "is a directory")),
            None => Err(write_err(path, io::ErrorKind::NotFound, "no such file")),
        }
    }

    fn make_dirs(&self, path: &Path) -> Result<()> {
        let mut inner = self.inner.lock();
        if let Some((_, node)) = inner.resolve(path)
            && !matches!(node, Node::Dir)
        {
            return Err(write_err(path, io::ErrorKind::AlreadyExists, "not a directory"));
        }
        inner.insert_dirs(path);
        Ok(())
    }
}
