//! Walking the Calibre library for book folders.

use crate::config::Construct;
use crate::error::Result;
use crate::fs::FileSystem;
use std::path::PathBuf;

/// How much of the library to walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanScope {
    /// Only folders the policy could select. Under author selection this
    /// skips unconfigured authors entirely.
    Selectable,
    /// Every author folder, so rejected books can be reported too.
    Everything,
}

/// A book folder and the author folder it sits in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookFolder {
    /// Author folder name.
    pub author_folder: String,
    /// Full path to the book folder.
    pub path: PathBuf,
}

/// Calibre keeps bookkeeping folders (`.calnotes`, `.caltrash`) in the root.
fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

/// List candidate book folders of a construct, in listing order.
///
/// Fails only when the library root cannot be listed. An author folder that
/// is missing or unreadable is logged and skipped.
pub fn book_folders(
    fs: &dyn FileSystem,
    construct: &Construct,
    scope: ScanScope,
) -> Result<Vec<BookFolder>> {
    let root = &construct.source;

    let authors: Vec<String> = match (construct.selection.author_folders(), scope) {
        (Some(configured), ScanScope::Selectable) => configured.to_vec(),
        _ => fs
            .list_entries(root)?
            .into_iter()
            .filter(|name| !is_hidden(name) && fs.is_dir(&root.join(name)))
            .collect(),
    };

    let mut folders = Vec::new();
    for author in authors {
        let author_path = root.join(&author);
        if !fs.is_dir(&author_path) {
            tracing::warn!(
                construct = %construct.section,
                author = %author,
                "Author folder does not exist or is not a directory"
            );
            continue;
        }

        let entries = match fs.list_entries(&author_path) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(path = %author_path.display(), error = %e, "Could not list author folder");
                continue;
            }
        };

        folders.extend(
            entries
                .into_iter()
                .filter(|name| !is_hidden(name))
                .map(|name| author_path.join(name))
                .filter(|path| fs.is_dir(path))
                .map(|path| BookFolder {
                    author_folder: author.clone(),
                    path,
                }),
        );
    }

    Ok(folders)
}
