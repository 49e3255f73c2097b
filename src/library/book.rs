//! Source book model.

use crate::formats::BookFolderFiles;
use crate::fs::FileSystem;
use crate::metadata::MetadataRecord;
use std::path::{Path, PathBuf};

/// A book folder found in the Calibre library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceBook {
    /// Name of the author folder the book was found under.
    pub author_folder: String,

    /// Name of the book folder, e.g. `"Book A (42)"`.
    pub folder_name: String,

    /// Full path to the book folder.
    pub folder: PathBuf,

    /// Book, sidecar and cover file names.
    pub files: BookFolderFiles,

    /// Parsed sidecar, absent when missing or unparsable.
    pub metadata: Option<MetadataRecord>,

    /// Raw sidecar text, present whenever `metadata` is.
    pub metadata_content: Option<String>,
}

impl SourceBook {
    /// Inspect a book folder.
    ///
    /// Fails only when the folder itself cannot be listed. A sidecar that
    /// cannot be read or parsed leaves `metadata` empty.
    pub fn load(
        fs: &dyn FileSystem,
        author_folder: &str,
        folder: &Path,
        book_file_types: &[String],
    ) -> crate::Result<Self> {
        let names = fs.list_entries(folder)?;
        let files = BookFolderFiles::classify(book_file_types, &names);

        let mut book = Self {
            author_folder: author_folder.to_string(),
            folder_name: folder
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            folder: folder.to_path_buf(),
            files,
            metadata: None,
            metadata_content: None,
        };

        if let Some(path) = book.metadata_path() {
            match Self::read_metadata(fs, &path) {
                Ok((content, record)) => {
                    if record.title.is_none() {
                        tracing::warn!(book = %folder.display(), "Metadata has no <dc:title>");
                    }
                    if record.creators.is_empty() {
                        tracing::warn!(book = %folder.display(), "Metadata has no <dc:creator>");
                    }
                    book.metadata = Some(record);
                    book.metadata_content = Some(content);
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Could not read metadata");
                }
            }
        }

        Ok(book)
    }

    fn read_metadata(fs: &dyn FileSystem, path: &Path) -> crate::Result<(String, MetadataRecord)> {
        let bytes = fs.read_file(path)?;
        let content = String::from_utf8_lossy(&bytes).into_owned();
        let record = MetadataRecord::parse(&content)?;
        Ok((content, record))
    }

    /// Full path of the chosen book file.
    pub fn book_path(&self) -> Option<PathBuf> {
        self.files.book.as_ref().map(|n| self.folder.join(n))
    }

    /// Full path of the cover image.
    pub fn cover_path(&self) -> Option<PathBuf> {
        self.files.cover.as_ref().map(|n| self.folder.join(n))
    }

    /// Full path of the sidecar.
    pub fn metadata_path(&self) -> Option<PathBuf> {
        self.files.metadata.as_ref().map(|n| self.folder.join(n))
    }

    /// Title for display: sidecar title, or the folder name.
    pub fn title(&self) -> &str {
        self.metadata
            .as_ref()
            .and_then(|m| m.title.as_deref())
            .unwrap_or(&self.folder_name)
    }

    /// Authors for display: sidecar creators, or the author folder.
    pub fn authors_display(&self) -> String {
        match &self.metadata {
            Some(m) if !m.creators.is_empty() => m.authors_display(),
            _ => self.author_folder.clone(),
        }
    }
}
