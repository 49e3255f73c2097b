use crate::error::{AppError, Result};
use crate::metadata::MangleOptions;
use crate::selector::SelectionPolicy;
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Prefix every construct section key starts with.
pub const SECTION_MARKER: &str = "Construct";

/// Mirror a curated part of a Calibre library into a media-server ebook tree.
#[derive(Parser, Debug, Clone)]
#[command(name = "ebook-mirror")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file.
    #[arg(short, long, env = "EBOOK_MIRROR_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Verbose logging.
    #[arg(long, global = true)]
    pub debug: bool,

    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create or refresh every configured construct (default if no command given).
    Sync {
        /// Rewrite every sidecar, e.g. after changing mangling options.
        #[arg(long)]
        update_all_metadata: bool,

        /// Plan and report without writing anything.
        #[arg(long, alias = "dry-run")]
        dryrun: bool,
    },

    /// List the books each construct selects, without touching the destination.
    List {
        /// Comma separated columns: author, section, title, folder,
        /// authorfolder, subject, series, index, action.
        #[arg(default_value = "section,authorfolder,title")]
        columns: String,

        /// List candidates that were not selected instead.
        #[arg(long)]
        invert: bool,

        /// Emit JSON rows instead of a text table.
        #[arg(long)]
        json: bool,
    },

    /// Write a commented default config file.
    Init {
        /// Force overwrite existing config.
        #[arg(short, long)]
        force: bool,
    },
}

/// Destination hierarchy shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FolderMode {
    /// `<root>/<author>/<series>/<book>`.
    AuthorSeriesBook,
    /// `<root>/<series>/<book>`.
    SeriesBook,
    /// `<root>/<book>`.
    Book,
}

impl FolderMode {
    /// Whether books are grouped under a series folder.
    pub fn has_series(self) -> bool {
        matches!(self, FolderMode::AuthorSeriesBook | FolderMode::SeriesBook)
    }

    /// Whether books are grouped under an author folder.
    pub fn has_author(self) -> bool {
        matches!(self, FolderMode::AuthorSeriesBook)
    }
}

impl FromStr for FolderMode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized: String = s
            .trim()
            .to_lowercase()
            .chars()
            .map(|c| if c == ',' { '/' } else { c })
            .filter(|c| !c.is_whitespace())
            .collect();
        match normalized.as_str() {
            "author/series/book" => Ok(FolderMode::AuthorSeriesBook),
            "series/book" => Ok(FolderMode::SeriesBook),
            "book" => Ok(FolderMode::Book),
            _ => Err(AppError::ConfigInvalid(format!(
                "folder_mode must be \"author/series/book\", \"series/book\" or \"book\", got \"{s}\""
            ))),
        }
    }
}

impl TryFrom<String> for FolderMode {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<FolderMode> for String {
    fn from(mode: FolderMode) -> Self {
        mode.to_string()
    }
}

impl fmt::Display for FolderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FolderMode::AuthorSeriesBook => "author/series/book",
            FolderMode::SeriesBook => "series/book",
            FolderMode::Book => "book",
        })
    }
}

/// How book and cover files reach the destination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkMode {
    /// Symlink to the source file.
    #[default]
    Symlink,
    /// Copy the source file.
    Copy,
}

/// Which selection policy a section uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionMode {
    /// Books under configured author folders.
    #[default]
    Author,
    /// Books whose tags satisfy a configured group.
    Subject,
    /// Every book with a configured file type.
    All,
}

/// One construct section as written in the TOML file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConstructConfig {
    /// Calibre library root.
    pub source: PathBuf,

    /// Destination library root.
    pub destination: PathBuf,

    /// Destination hierarchy shape.
    pub folder_mode: FolderMode,

    /// Book file extensions in order of preference.
    pub book_file_types: Vec<String>,

    /// Selection policy.
    #[serde(default)]
    pub selection: SelectionMode,

    /// Author folders to export (`author` selection).
    #[serde(default)]
    pub author_folders: Vec<String>,

    /// Tag groups, AND within a group, OR across groups (`subject` selection).
    #[serde(default)]
    pub subjects: Vec<Vec<String>>,

    /// Prefix titles with the series index.
    #[serde(default = "default_mangle_title")]
    pub mangle_title: bool,

    /// Prefix sort titles with the series index.
    #[serde(default)]
    pub mangle_title_sort: bool,

    /// Symlink or copy book and cover files.
    #[serde(default)]
    pub link_mode: LinkMode,
}

fn default_mangle_title() -> bool {
    MangleOptions::default().mangle_title
}

/// A validated export job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Construct {
    /// Section key the construct came from.
    pub section: String,
    /// Calibre library root.
    pub source: PathBuf,
    /// Destination library root.
    pub destination: PathBuf,
    /// Destination hierarchy shape.
    pub folder_mode: FolderMode,
    /// Which books qualify.
    pub selection: SelectionPolicy,
    /// Lowercased extensions without dots, most preferred first.
    pub book_file_types: Vec<String>,
    /// Sidecar mangling flags.
    pub mangle: MangleOptions,
    /// Symlink or copy.
    pub link_mode: LinkMode,
}

impl ConstructConfig {
    /// Check the section and turn it into a [`Construct`].
    pub fn validate(self, section: &str) -> Result<Construct> {
        let invalid = |msg: String| AppError::ConfigInvalid(format!("[{section}] {msg}"));

        if self.source.as_os_str().is_empty() || self.destination.as_os_str().is_empty() {
            return Err(invalid("source and destination must be set".into()));
        }
        // Links point at the source, so both roots are pinned to absolute
        // paths before anything is derived from them.
        let source = absolute_root(&self.source).map_err(|e| invalid(format!("source: {e}")))?;
        let destination =
            absolute_root(&self.destination).map_err(|e| invalid(format!("destination: {e}")))?;
        if source == destination {
            return Err(invalid("source and destination must be different".into()));
        }

        let mut book_file_types: Vec<String> = Vec::new();
        for ext in &self.book_file_types {
            let ext = ext.trim().trim_start_matches('.').to_lowercase();
            if !ext.is_empty() && !book_file_types.contains(&ext) {
                book_file_types.push(ext);
            }
        }
        if book_file_types.is_empty() {
            return Err(invalid("book_file_types must contain at least one entry".into()));
        }

        let selection = match self.selection {
            SelectionMode::Author => {
                let mut authors: Vec<String> = Vec::new();
                for author in self.author_folders {
                    let author = author.trim().to_string();
                    if !author.is_empty() && !authors.contains(&author) {
                        authors.push(author);
                    }
                }
                if authors.is_empty() {
                    return Err(invalid("author_folders must contain at least one entry".into()));
                }
                SelectionPolicy::ByAuthor(authors)
            }
            SelectionMode::Subject => {
                let groups: Vec<Vec<String>> = self
                    .subjects
                    .into_iter()
                    .map(|group| {
                        group
                            .into_iter()
                            .map(|tag| tag.trim().to_string())
                            .filter(|tag| !tag.is_empty())
                            .collect::<Vec<_>>()
                    })
                    .filter(|group| !group.is_empty())
                    .collect();
                if groups.is_empty() {
                    return Err(invalid("subjects must contain at least one tag group".into()));
                }
                SelectionPolicy::BySubject(groups)
            }
            SelectionMode::All => SelectionPolicy::All,
        };

        Ok(Construct {
            section: section.to_string(),
            source,
            destination,
            folder_mode: self.folder_mode,
            selection,
            book_file_types,
            mangle: MangleOptions {
                mangle_title: self.mangle_title,
                mangle_title_sort: self.mangle_title_sort,
            },
            link_mode: self.link_mode,
        })
    }
}

/// Absolute form of a configured root, relative to the working directory.
///
/// Existing roots are canonicalized so symlinked aliases resolve to one path.
fn absolute_root(path: &Path) -> std::io::Result<PathBuf> {
    match std::fs::canonicalize(path) {
        Ok(canonical) => Ok(canonical),
        Err(_) => std::path::absolute(path),
    }
}

/// Main configuration: the constructs, in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    /// Validated constructs.
    pub constructs: Vec<Construct>,
}

impl Config {
    /// Load configuration from file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AppError::ConfigInvalid(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let table: toml::Table = toml::from_str(content).map_err(|e| {
            AppError::ConfigInvalid(format!("Failed to parse config file: {}", e))
        })?;

        let mut constructs = Vec::new();
        for (key, value) in table {
            if !key.starts_with(SECTION_MARKER) {
                tracing::debug!(section = %key, "Ignoring non-construct section");
                continue;
            }
            let raw: ConstructConfig = value
                .try_into()
                .map_err(|e| AppError::ConfigInvalid(format!("[{key}] {e}")))?;
            constructs.push(raw.validate(&key)?);
        }

        if constructs.is_empty() {
            return Err(AppError::ConfigInvalid(format!(
                "no section starting with \"{SECTION_MARKER}\" found"
            )));
        }

        Ok(Self { constructs })
    }

    /// Find config file in default locations.
    pub fn find_config_file() -> Option<PathBuf> {
        let candidates = [
            PathBuf::from("ebook-mirror.toml"),
            dirs::config_dir()
                .map(|p| p.join("ebook-mirror").join("config.toml"))
                .unwrap_or_default(),
        ];

        candidates
            .into_iter()
            .find(|p| !p.as_os_str().is_empty() && p.exists())
    }

    /// Generate default config file content.
    pub fn generate_default() -> String {
        r#"# ebook-mirror configuration
#
# Every table whose name starts with "Construct" is one export job.
# Jobs run in the order they appear in this file.

[Construct1]
# Calibre library root
source = "/srv/calibre"
# Destination library root (e.g. a Jellyfin book library folder)
destination = "/srv/jellyfin/books"
# "author/series/book", "series/book" or "book"
folder_mode = "author/series/book"
# Book file types, most preferred first
book_file_types = ["epub", "mobi", "pdf"]
# "author" (default), "subject" or "all"
selection = "author"
author_folders = ["Terry Pratchett", "Ursula K. Le Guin"]
# Prefix titles with the series index
mangle_title = true
mangle_title_sort = false
# "symlink" (default) or "copy"
link_mode = "symlink"

# [Construct2]
# source = "/srv/calibre"
# destination = "/srv/jellyfin/kids"
# folder_mode = "series/book"
# book_file_types = ["epub"]
# selection = "subject"
# # Any group matches; every tag within a group must be present
# subjects = [["Juvenile Fiction", "Fantasy"], ["Picture Books"]]
"#
        .to_string()
    }
}
