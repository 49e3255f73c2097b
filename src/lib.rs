//! ebook-mirror: keep a media-server ebook library in step with Calibre.
//!
//! This crate mirrors a curated subset of a Calibre library into a folder
//! tree that media servers such as Jellyfin understand: books grouped by
//! author and series, folder names prefixed with a sortable series index,
//! and a rewritten metadata sidecar next to each book.
//!
//! # Features
//!
//! - Several export jobs ("constructs") from one TOML file
//! - Selection by author folder, by subject tag groups, or everything
//! - Series index normalization for correct lexical ordering
//! - Title, sort title and description rewriting that keeps the rest of
//!   the sidecar byte for byte
//! - Incremental updates: only missing or stale files are rewritten
//! - Dry runs and read-only listings

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Configuration and CLI.
pub mod config;
/// Error types.
pub mod error;
/// Book file classification.
pub mod formats;
/// Filesystem port and implementations.
pub mod fs;
/// Series index normalization.
pub mod index;
/// Source library models and traversal.
pub mod library;
/// Metadata sidecar parsing and rewriting.
pub mod metadata;
/// Listing projections.
pub mod report;
/// Selection policies.
pub mod selector;
/// Planning and applying the mirror.
pub mod sync;


pub use config::{Cli, Command, Config};
pub use error::{AppError, Result};
pub use fs::{FileSystem, LocalFs};
pub use sync::{RunContext, RunSummary, SyncEngine};
