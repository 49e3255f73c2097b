//! Read-only projection of selection results into table rows.

use crate::config::{Config, Construct};
use crate::error::{AppError, Result};
use crate::fs::FileSystem;
use crate::library::ScanScope;
use crate::metadata::SeriesContext;
use crate::selector::Selection;
use crate::sync::{Candidate, Planner, check_roots, load_candidates};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// A projectable field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Column {
    /// Sidecar creators, or the author folder.
    Author,
    /// Construct section key.
    Section,
    /// Sidecar title, or the folder name.
    Title,
    /// Book folder name.
    Folder,
    /// Author folder name.
    AuthorFolder,
    /// Tag group that matched.
    Subject,
    /// Series name.
    Series,
    /// Normalized series index.
    Index,
    /// What a sync would do.
    Action,
}

impl Column {
    /// Name used on the command line and as JSON key.
    pub fn name(self) -> &'static str {
        match self {
            Column::Author => "author",
            Column::Section => "section",
            Column::Title => "title",
            Column::Folder => "folder",
            Column::AuthorFolder => "authorfolder",
            Column::Subject => "subject",
            Column::Series => "series",
            Column::Index => "index",
            Column::Action => "action",
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Column {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s.trim().to_lowercase().as_str() {
            "author" => Column::Author,
            "section" => Column::Section,
            "title" => Column::Title,
            "folder" => Column::Folder,
            "authorfolder" => Column::AuthorFolder,
            "subject" => Column::Subject,
            "series" => Column::Series,
            "index" => Column::Index,
            "action" => Column::Action,
            other => {
                return Err(AppError::ConfigInvalid(format!("unknown column \"{other}\"")));
            }
        })
    }
}

/// Parse a comma separated column list.
pub fn parse_columns(spec: &str) -> Result<Vec<Column>> {
    let columns = spec
        .split(',')
        .filter(|c| !c.trim().is_empty())
        .map(str::parse)
        .collect::<Result<Vec<Column>>>()?;
    if columns.is_empty() {
        return Err(AppError::ConfigInvalid("no columns requested".into()));
    }
    Ok(columns)
}

/// Rows of one construct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportSection {
    /// Section key.
    pub section: String,
    /// Projected values, one vector per book, sorted.
    pub rows: Vec<Vec<String>>,
}

/// A finished projection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    /// Projected columns, in requested order.
    pub columns: Vec<Column>,
    /// One group per construct, in configured order.
    pub sections: Vec<ReportSection>,
}

/// Project every construct of `config`.
///
/// Selected books are listed, or with `invert` the excluded ones. Books
/// that are out of consideration are never listed. A construct whose roots
/// are unusable is logged and yields no rows.
pub fn project(fs: &dyn FileSystem, config: &Config, columns: &[Column], invert: bool) -> Report {
    let sections = config
        .constructs
        .iter()
        .map(|construct| {
            let rows = match project_construct(fs, construct, columns, invert) {
                Ok(rows) => rows,
                Err(e) => {
                    tracing::error!(construct = %construct.section, error = %e, "Cannot list construct");
                    Vec::new()
                }
            };
            ReportSection {
                section: construct.section.clone(),
                rows,
            }
        })
        .collect();

    Report {
        columns: columns.to_vec(),
        sections,
    }
}

fn project_construct(
    fs: &dyn FileSystem,
    construct: &Construct,
    columns: &[Column],
    invert: bool,
) -> Result<Vec<Vec<String>>> {
    check_roots(fs, construct)?;
    let (candidates, _) = load_candidates(fs, construct, ScanScope::Everything)?;
    let planner = Planner::new(fs, construct, false);

    let mut rows: Vec<Vec<String>> = candidates
        .iter()
        .filter(|c| match c.selection {
            Selection::Selected(_) => !invert,
            Selection::Excluded => invert,
            Selection::Ignored => false,
        })
        .map(|c| {
            columns
                .iter()
                .map(|col| cell(&planner, construct, c, *col))
                .collect()
        })
        .collect();

    rows.sort();
    Ok(rows)
}

fn cell(planner: &Planner<'_>, construct: &Construct, candidate: &Candidate, column: Column) -> String {
    let book = &candidate.book;
    let series = || {
        book.metadata
            .as_ref()
            .and_then(|m| SeriesContext::for_book(m, construct.folder_mode))
    };

    match column {
        Column::Author => book.authors_display(),
        Column::Section => construct.section.clone(),
        Column::Title => book.title().to_string(),
        Column::Folder => book.folder_name.clone(),
        Column::AuthorFolder => book.author_folder.clone(),
        Column::Subject => match &candidate.selection {
            Selection::Selected(reason) => reason.subject(),
            _ => String::new(),
        },
        Column::Series => book
            .metadata
            .as_ref()
            .and_then(|m| m.series.clone())
            .unwrap_or_default(),
        Column::Index => series().map(|ctx| ctx.token).unwrap_or_default(),
        Column::Action => match &candidate.selection {
            Selection::Selected(_) => match planner.plan_book(book) {
                Ok(entry) => entry.action.to_string(),
                Err(e) => format!("error: {e}"),
            },
            Selection::Excluded => "excluded".to_string(),
            Selection::Ignored => "ignored".to_string(),
        },
    }
}

impl Report {
    /// Total number of rows.
    pub fn len(&self) -> usize {
        self.sections.iter().map(|s| s.rows.len()).sum()
    }

    /// Whether no construct produced a row.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Aligned text table, one block per construct.
    pub fn render_table(&self) -> String {
        let mut widths: Vec<usize> = self.columns.iter().map(|c| c.name().len()).collect();
        for row in self.sections.iter().flat_map(|s| &s.rows) {
            for (width, value) in widths.iter_mut().zip(row) {
                *width = (*width).max(value.chars().count());
            }
        }

        let line = |values: &mut dyn Iterator<Item = String>| -> String {
            values
                .zip(&widths)
                .map(|(v, &w)| format!("{v:<w$}"))
                .collect::<Vec<_>>()
                .join("  ")
                .trim_end()
                .to_string()
        };

        let header = line(&mut self.columns.iter().map(|c| c.name().to_uppercase()));
        let rule = "-".repeat(header.chars().count());

        let mut out = String::new();
        for section in &self.sections {
            out.push_str(&format!("[{}] ({} books)\n", section.section, section.rows.len()));
            if section.rows.is_empty() {
                out.push('\n');
                continue;
            }
            out.push_str(&header);
            out.push('\n');
            out.push_str(&rule);
            out.push('\n');
            for row in &section.rows {
                out.push_str(&line(&mut row.iter().cloned()));
                out.push('\n');
            }
            out.push('\n');
        }
        out
    }

    /// JSON rows keyed by column name, each tagged with its section.
    pub fn to_json(&self) -> Result<String> {
        let rows: Vec<serde_json::Map<String, serde_json::Value>> = self
            .sections
            .iter()
            .flat_map(|section| {
                section.rows.iter().map(move |row| {
                    let mut obj = serde_json::Map::new();
                    obj.insert("section".into(), section.section.clone().into());
                    for (column, value) in self.columns.iter().zip(row) {
                        obj.insert(column.name().into(), value.clone().into());
                    }
                    obj
                })
            })
            .collect();

        Ok(serde_json::to_string_pretty(&rows)?)
    }
}
