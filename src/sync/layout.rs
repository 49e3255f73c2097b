//! Destination path computation.

use crate::config::Construct;
use crate::library::SourceBook;
use crate::metadata::SeriesContext;
use std::path::PathBuf;

const RESERVED_NAMES: &[&str] = &[
    "CON", "CONIN$", "CONOUT$", "PRN", "AUX", "CLOCK$", "NUL", "COM0", "COM1", "COM2", "COM3",
    "COM4", "COM5", "COM6", "COM7", "COM8", "COM9", "LPT0", "LPT1", "LPT2", "LPT3", "LPT4",
    "LPT5", "LPT6", "LPT7", "LPT8", "LPT9", "LST", "KEYBD$", "SCREEN$", "$IDLE$", "CONFIG$",
];

/// Make `name` safe to use as a single path component.
///
/// Characters that are illegal on common filesystems become `-`, a leading
/// Windows device name is neutralized, and a leading space or trailing dot
/// or space is replaced.
pub fn sanitize_file_name(name: &str) -> String {
    let mut out: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | '?' | '%' | '*' | ':' | '|' | '"' | '<' | '>' => '-',
            '\u{0}'..='\u{1f}' | '\u{7f}' => '-',
            c => c,
        })
        .collect();

    let body = out.strip_prefix(' ').unwrap_or(&out);
    let stem_len = body.find(['.', ' ']).unwrap_or(body.len());
    if RESERVED_NAMES
        .iter()
        .any(|r| r.eq_ignore_ascii_case(&body[..stem_len]))
    {
        let lead = out.len() - body.len();
        // The delimiter after the device name goes too.
        let end = (lead + stem_len + 1).min(out.len());
        out.replace_range(..end, "-");
    }

    if out.starts_with(' ') {
        out.replace_range(..1, "-");
    }
    if out.ends_with(['.', ' ']) {
        let last = out.len() - 1;
        out.replace_range(last.., "-");
    }

    out
}

/// Destination folder of a book.
///
/// With series context the book lands in a series folder and its folder
/// name carries the index prefix. Without it the series level collapses:
/// `author/series/book` becomes `author/book` and `series/book` becomes
/// `book`.
pub fn destination_folder(
    construct: &Construct,
    book: &SourceBook,
    series: Option<&SeriesContext>,
) -> PathBuf {
    let mut path = construct.destination.clone();
    if construct.folder_mode.has_author() {
        path.push(sanitize_file_name(&book.author_folder));
    }

    match series {
        Some(ctx) => {
            path.push(sanitize_file_name(&ctx.series));
            path.push(sanitize_file_name(&format!(
                "{}{}",
                ctx.prefix(),
                book.folder_name
            )));
        }
        None => path.push(sanitize_file_name(&book.folder_name)),
    }

    path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn illegal_characters_are_replaced() {
        assert_eq!(sanitize_file_name("What? A/B: C*"), "What- A-B- C-");
        assert_eq!(sanitize_file_name("tab\there"), "tab-here");
        assert_eq!(sanitize_file_name("Plain Name (12)"), "Plain Name (12)");
    }

    #[test]
    fn device_names_are_neutralized() {
        assert_eq!(sanitize_file_name("CON"), "-");
        assert_eq!(sanitize_file_name("con.txt"), "-txt");
        assert_eq!(sanitize_file_name("Lpt1 stories"), "-stories");
        assert_eq!(sanitize_file_name("Console"), "Console");
    }

    #[test]
    fn edge_spaces_and_dots() {
        assert_eq!(sanitize_file_name(" lead"), "-lead");
        assert_eq!(sanitize_file_name("Vol. 2."), "Vol. 2-");
        assert_eq!(sanitize_file_name("trail "), "trail-");
    }
}
