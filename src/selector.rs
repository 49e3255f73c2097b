//! Deciding which source books a construct exports.

use crate::library::SourceBook;
use std::fmt;

/// Selection rule of a construct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionPolicy {
    /// Books found under one of these author folders.
    ByAuthor(Vec<String>),
    /// Books whose tags satisfy at least one group; every tag of a group must
    /// be present. Tags compare case-insensitively.
    BySubject(Vec<Vec<String>>),
    /// Every book with a configured file type.
    All,
}

/// Why a book was selected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchReason {
    /// Author folder is configured.
    Author(String),
    /// This tag group matched.
    Subject(Vec<String>),
    /// Everything is selected.
    All,
}

impl MatchReason {
    /// The matched tag group joined for display, empty for non-subject matches.
    pub fn subject(&self) -> String {
        match self {
            MatchReason::Subject(group) => group.join(" & "),
            _ => String::new(),
        }
    }
}

impl fmt::Display for MatchReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchReason::Author(author) => write!(f, "author folder \"{author}\""),
            MatchReason::Subject(group) => write!(f, "subjects {}", group.join(" & ")),
            MatchReason::All => f.write_str("all books"),
        }
    }
}

/// Outcome of running a policy against one candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Exported.
    Selected(MatchReason),
    /// In scope but rejected by the policy.
    Excluded,
    /// Out of consideration: no configured book type in the folder.
    Ignored,
}

impl Selection {
    /// Whether the book is exported.
    pub fn is_selected(&self) -> bool {
        matches!(self, Selection::Selected(_))
    }
}

impl SelectionPolicy {
    /// Configured author folders, for policies that name them.
    pub fn author_folders(&self) -> Option<&[String]> {
        match self {
            SelectionPolicy::ByAuthor(authors) => Some(authors),
            _ => None,
        }
    }

    /// Decide whether `book` is exported.
    pub fn evaluate(&self, book: &SourceBook) -> Selection {
        match self {
            SelectionPolicy::ByAuthor(authors) => {
                if authors.iter().any(|a| *a == book.author_folder) {
                    Selection::Selected(MatchReason::Author(book.author_folder.clone()))
                } else {
                    Selection::Excluded
                }
            }
            SelectionPolicy::BySubject(groups) => {
                if book.files.book.is_none() {
                    return Selection::Ignored;
                }
                let Some(record) = book.metadata.as_ref() else {
                    return Selection::Excluded;
                };
                groups
                    .iter()
                    .find(|group| group.iter().all(|tag| record.has_tag(tag)))
                    .map(|group| Selection::Selected(MatchReason::Subject(group.clone())))
                    .unwrap_or(Selection::Excluded)
            }
            SelectionPolicy::All => {
                if book.files.book.is_none() {
                    Selection::Ignored
                } else {
                    Selection::Selected(MatchReason::All)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::BookFolderFiles;
    use crate::metadata::MetadataRecord;
    use std::path::PathBuf;

    fn book(author: &str, book_file: Option<&str>, tags: Option<&[&str]>) -> SourceBook {
        SourceBook {
            author_folder: author.to_string(),
            folder_name: "Book (1)".to_string(),
            folder: PathBuf::from("/lib").join(author).join("Book (1)"),
            files: BookFolderFiles {
                book: book_file.map(String::from),
                metadata: tags.map(|_| "metadata.opf".to_string()),
                cover: None,
            },
            metadata: tags.map(|tags| MetadataRecord {
                tags: tags.iter().map(|t| t.to_string()).collect(),
                ..Default::default()
            }),
            metadata_content: None,
        }
    }

    #[test]
    fn by_author_matches_folder_name_only() {
        let policy = SelectionPolicy::ByAuthor(vec!["Jane Doe".into()]);
        assert_eq!(
            policy.evaluate(&book("Jane Doe", Some("b.epub"), Some(&["x"]))),
            Selection::Selected(MatchReason::Author("Jane Doe".into()))
        );
        assert_eq!(
            policy.evaluate(&book("John Roe", Some("b.epub"), Some(&["x"]))),
            Selection::Excluded
        );
    }

    #[test]
    fn by_subject_or_of_and_groups() {
        let policy = SelectionPolicy::BySubject(vec![
            vec!["Fantasy".into(), "Dragons".into()],
            vec!["Poetry".into()],
        ]);

        let both = book("A", Some("b.epub"), Some(&["dragons", "FANTASY"]));
        assert_eq!(
            policy.evaluate(&both),
            Selection::Selected(MatchReason::Subject(vec!["Fantasy".into(), "Dragons".into()]))
        );

        let partial = book("A", Some("b.epub"), Some(&["Fantasy"]));
        assert_eq!(policy.evaluate(&partial), Selection::Excluded);

        let second = book("A", Some("b.epub"), Some(&["poetry"]));
        assert!(policy.evaluate(&second).is_selected());
    }

    #[test]
    fn by_subject_needs_metadata() {
        let policy = SelectionPolicy::BySubject(vec![vec!["Fantasy".into()]]);
        assert_eq!(policy.evaluate(&book("A", Some("b.epub"), None)), Selection::Excluded);
    }

    #[test]
    fn unconfigured_type_is_ignored_not_excluded() {
        let subject = SelectionPolicy::BySubject(vec![vec!["Fantasy".into()]]);
        assert_eq!(
            subject.evaluate(&book("A", None, Some(&["Fantasy"]))),
            Selection::Ignored
        );
        assert_eq!(SelectionPolicy::All.evaluate(&book("A", None, None)), Selection::Ignored);
        assert!(SelectionPolicy::All.evaluate(&book("A", Some("b.pdf"), None)).is_selected());
    }

    #[test]
    fn subject_reason_display() {
        let reason = MatchReason::Subject(vec!["A".into(), "B".into()]);
        assert_eq!(reason.subject(), "A & B");
        assert_eq!(MatchReason::All.subject(), "");
    }
}
