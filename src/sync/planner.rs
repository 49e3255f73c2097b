//! Per-book planning: what the destination should contain and whether it
//! already does.

use crate::config::{Construct, LinkMode};
use crate::error::Result;
use crate::fs::FileSystem;
use crate::library::SourceBook;
use crate::metadata::{SeriesContext, mangle};
use crate::sync::layout;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Terminal decision for a selected book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanAction {
    /// Destination folder does not exist yet.
    Create,
    /// Destination exists but something is missing, stale, or forced.
    Update,
    /// Destination is up to date.
    Skip,
    /// No configured book type in the folder; nothing is exported.
    MissingBookFile,
}

impl fmt::Display for PlanAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PlanAction::Create => "create",
            PlanAction::Update => "update",
            PlanAction::Skip => "skip",
            PlanAction::MissingBookFile => "warn-missing-file",
        })
    }
}

/// Recoverable problem with a source book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BookWarning {
    /// No file with a configured extension.
    MissingBookFile,
    /// No cover image.
    MissingCover,
    /// Sidecar missing or unparsable.
    MissingMetadata,
}

impl fmt::Display for BookWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BookWarning::MissingBookFile => "missing book file",
            BookWarning::MissingCover => "missing cover",
            BookWarning::MissingMetadata => "missing metadata",
        })
    }
}

/// Kind of file placed in a destination book folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// The book file (linked or copied).
    Book,
    /// The cover image (linked or copied).
    Cover,
    /// The rewritten sidecar (always written).
    Metadata,
}

/// One file of a destination book folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// What it is.
    pub kind: ArtifactKind,
    /// Source file it derives from.
    pub source: PathBuf,
    /// Where it goes.
    pub destination: PathBuf,
    /// Whether the destination copy is already current.
    pub fresh: bool,
}

/// Everything needed to bring one destination book folder up to date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanEntry {
    /// Source book folder.
    pub source_folder: PathBuf,
    /// Destination book folder.
    pub destination_folder: PathBuf,
    /// Files that make up the destination folder.
    pub artifacts: Vec<Artifact>,
    /// Sidecar content to write, after mangling.
    pub metadata_content: Option<String>,
    /// Decision.
    pub action: PlanAction,
    /// Problems found on the way.
    pub warnings: Vec<BookWarning>,
}

impl PlanEntry {
    /// Artifacts that have to be (re)written.
    pub fn stale_artifacts(&self) -> impl Iterator<Item = &Artifact> {
        self.artifacts.iter().filter(|a| !a.fresh)
    }
}

/// Plans selected books of one construct against the current destination.
///
/// Only reads the filesystem.
pub struct Planner<'a> {
    fs: &'a dyn FileSystem,
    construct: &'a Construct,
    force: bool,
}

impl<'a> Planner<'a> {
    /// Create a planner. `force` marks every existing sidecar stale.
    pub fn new(fs: &'a dyn FileSystem, construct: &'a Construct, force: bool) -> Self {
        Self {
            fs,
            construct,
            force,
        }
    }

    /// Plan one selected book.
    ///
    /// Fails when a source file that was listed cannot be inspected.
    pub fn plan_book(&self, book: &SourceBook) -> Result<PlanEntry> {
        let mut warnings = Vec::new();

        let series = book
            .metadata
            .as_ref()
            .and_then(|m| SeriesContext::for_book(m, self.construct.folder_mode));
        let destination_folder = layout::destination_folder(self.construct, book, series.as_ref());

        let metadata_content = self.mangled_metadata(book, series.as_ref());
        if metadata_content.is_none() {
            warnings.push(BookWarning::MissingMetadata);
        }
        if book.files.cover.is_none() {
            warnings.push(BookWarning::MissingCover);
        }

        let Some(book_source) = book.book_path() else {
            warnings.insert(0, BookWarning::MissingBookFile);
            return Ok(PlanEntry {
                source_folder: book.folder.clone(),
                destination_folder,
                artifacts: Vec::new(),
                metadata_content,
                action: PlanAction::MissingBookFile,
                warnings,
            });
        };

        let folder_exists = self.fs.is_dir(&destination_folder);
        let mut artifacts = vec![self.linked(
            ArtifactKind::Book,
            book_source,
            &destination_folder,
            folder_exists,
        )?];

        if let Some(cover) = book.cover_path() {
            artifacts.push(self.linked(
                ArtifactKind::Cover,
                cover,
                &destination_folder,
                folder_exists,
            )?);
        }

        if metadata_content.is_some()
            && let Some(source) = book.metadata_path()
        {
            let destination = in_folder(&destination_folder, &source);
            let fresh =
                folder_exists && !self.force && self.sidecar_fresh(&source, &destination)?;
            artifacts.push(Artifact {
                kind: ArtifactKind::Metadata,
                source,
                destination,
                fresh,
            });
        }

        let action = if !folder_exists {
            PlanAction::Create
        } else if self.force || artifacts.iter().any(|a| !a.fresh) {
            PlanAction::Update
        } else {
            PlanAction::Skip
        };

        Ok(PlanEntry {
            source_folder: book.folder.clone(),
            destination_folder,
            artifacts,
            metadata_content,
            action,
            warnings,
        })
    }

    fn mangled_metadata(&self, book: &SourceBook, series: Option<&SeriesContext>) -> Option<String> {
        let record = book.metadata.as_ref()?;
        let content = book.metadata_content.as_deref()?;
        match mangle(content, record, series, self.construct.mangle) {
            Ok(mangled) => Some(mangled),
            Err(e) => {
                tracing::warn!(book = %book.folder.display(), error = %e, "Could not rewrite metadata");
                None
            }
        }
    }

    fn linked(
        &self,
        kind: ArtifactKind,
        source: PathBuf,
        folder: &Path,
        folder_exists: bool,
    ) -> Result<Artifact> {
        let destination = in_folder(folder, &source);
        let fresh = folder_exists && self.link_fresh(&source, &destination)?;
        Ok(Artifact {
            kind,
            source,
            destination,
            fresh,
        })
    }

    /// A symlink is current when it points at the source and resolves; a
    /// copy when it is a regular file at least as new as the source.
    fn link_fresh(&self, source: &Path, destination: &Path) -> Result<bool> {
        if !self.fs.exists(destination) {
            return Ok(false);
        }
        let link = self.fs.read_link(destination);
        match self.construct.link_mode {
            LinkMode::Symlink => Ok(link.as_deref() == Some(source)),
            LinkMode::Copy if link.is_some() => Ok(false),
            LinkMode::Copy => self.not_older(source, destination),
        }
    }

    fn sidecar_fresh(&self, source: &Path, destination: &Path) -> Result<bool> {
        if !self.fs.exists(destination) {
            return Ok(false);
        }
        self.not_older(source, destination)
    }

    /// The source was just listed, so failing to stat it is an error for
    /// this book. A destination that cannot be stat'ed is simply stale.
    fn not_older(&self, source: &Path, destination: &Path) -> Result<bool> {
        let source_time = self.fs.mod_time(source)?;
        Ok(self
            .fs
            .mod_time(destination)
            .is_ok_and(|dst| dst >= source_time))
    }
}

/// `folder/<file name of source>`.
fn in_folder(folder: &Path, source: &Path) -> PathBuf {
    match source.file_name() {
        Some(name) => folder.join(name),
        None => folder.to_path_buf(),
    }
}
