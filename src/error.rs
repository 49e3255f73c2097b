use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the application.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found error.
    #[error("Not found: {0}")]
    NotFound(PathBuf),

    /// Configuration file is unreadable or fails validation.
    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),

    /// A construct's source or destination root cannot be used.
    #[error("Construct {section}: {role} root {path} is not an accessible directory")]
    ConstructRootInaccessible {
        /// Section key of the construct.
        section: String,
        /// Either "source" or "destination".
        role: &'static str,
        /// Offending path.
        path: PathBuf,
    },

    /// Metadata sidecar could not be parsed.
    #[error("Metadata parsing error: {0}")]
    MetadataParse(#[from] roxmltree::Error),

    /// Metadata sidecar could not be rewritten.
    #[error("Metadata rewrite error: {0}")]
    XmlWrite(#[from] quick_xml::Error),

    /// JSON output could not be produced.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A mutating filesystem call failed.
    #[error("Write to {path} failed: {source}")]
    FilesystemWrite {
        /// Path that was being written.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    /// Wrap an I/O error raised while mutating `path`.
    pub fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AppError::FilesystemWrite {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias for the application.
pub type Result<T> = std::result::Result<T, AppError>;
