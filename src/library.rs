//! Source library model and traversal.

pub mod book;
mod scanner;

pub use book::SourceBook;
pub use scanner::{BookFolder, ScanScope, book_folders};
