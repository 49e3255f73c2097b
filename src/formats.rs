//! Picking files out of a Calibre book folder.

/// Extension of the metadata sidecar Calibre writes next to each book.
pub const METADATA_EXTENSION: &str = "opf";

/// File name Calibre uses for the cover image.
pub const COVER_FILE_NAME: &str = "cover.jpg";

/// Extension of `name`, without the dot.
fn extension(name: &str) -> Option<&str> {
    let (stem, ext) = name.rsplit_once('.')?;
    (!stem.is_empty() && !ext.is_empty()).then_some(ext)
}

/// Pick the book file whose extension comes first in `preferred`.
///
/// `preferred` holds extensions without dots and is matched
/// case-insensitively. When two files share the winning extension the first
/// one in listing order wins.
pub fn resolve_book_file<'a>(preferred: &[String], names: &'a [String]) -> Option<&'a str> {
    preferred.iter().find_map(|wanted| {
        names
            .iter()
            .find(|name| extension(name).is_some_and(|ext| ext.eq_ignore_ascii_case(wanted)))
            .map(String::as_str)
    })
}

/// The files of interest inside one source book folder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookFolderFiles {
    /// Book file chosen by extension preference.
    pub book: Option<String>,
    /// Metadata sidecar (first `*.opf`).
    pub metadata: Option<String>,
    /// Cover image.
    pub cover: Option<String>,
}

impl BookFolderFiles {
    /// Classify the entries of a book folder.
    pub fn classify(preferred: &[String], names: &[String]) -> Self {
        let metadata = names
            .iter()
            .find(|n| extension(n).is_some_and(|e| e.eq_ignore_ascii_case(METADATA_EXTENSION)))
            .cloned();
        let cover = names.iter().find(|n| *n == COVER_FILE_NAME).cloned();

        Self {
            book: resolve_book_file(preferred, names).map(String::from),
            metadata,
            cover,
        }
    }
}
