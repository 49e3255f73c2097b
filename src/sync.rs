//! The sync engine: scan, select, plan, apply.

mod executor;
pub mod layout;
mod planner;

pub use executor::apply;
pub use planner::{Artifact, ArtifactKind, BookWarning, PlanAction, PlanEntry, Planner};

use crate::config::{Config, Construct};
use crate::error::{AppError, Result};
use crate::fs::{DryRunFs, FileSystem};
use crate::library::{ScanScope, SourceBook, book_folders};
use crate::selector::{Selection, SelectionPolicy};
use serde::Serialize;
use std::path::PathBuf;

/// Run-wide switches, passed in rather than read from the environment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunContext {
    /// Treat every selected book as stale.
    pub force_update: bool,
    /// Plan and report without mutating the destination.
    pub dry_run: bool,
}

/// A scanned book and the policy's verdict on it.
#[derive(Debug, Clone)]
pub struct Candidate {
    /// The book.
    pub book: SourceBook,
    /// Verdict.
    pub selection: Selection,
}

/// A book whose processing failed.
#[derive(Debug, Clone, Serialize)]
pub struct BookFailure {
    /// Source book folder.
    pub folder: PathBuf,
    /// What went wrong.
    pub error: String,
}

/// A warning raised for one source book.
#[derive(Debug, Clone, Serialize)]
pub struct BookNotice {
    /// Source book folder.
    pub folder: PathBuf,
    /// Warning.
    pub warning: BookWarning,
}

/// Outcome of one construct.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConstructSummary {
    /// Section key.
    pub section: String,
    /// Books whose destination folder was created.
    pub created: usize,
    /// Books whose destination folder was refreshed.
    pub updated: usize,
    /// Books already up to date.
    pub skipped: usize,
    /// Books rejected by the selection policy.
    pub excluded: usize,
    /// Books without a configured file type, out of consideration.
    pub ignored: usize,
    /// Recoverable problems.
    pub warnings: Vec<BookNotice>,
    /// Books whose plan could not be computed or applied.
    pub failures: Vec<BookFailure>,
    /// Set when the construct could not run at all.
    pub fatal: Option<String>,
}

impl ConstructSummary {
    fn new(section: &str) -> Self {
        Self {
            section: section.to_string(),
            ..Default::default()
        }
    }

    fn warn(&mut self, folder: &std::path::Path, warning: BookWarning) {
        tracing::warn!(construct = %self.section, book = %folder.display(), "{warning}");
        self.warnings.push(BookNotice {
            folder: folder.to_path_buf(),
            warning,
        });
    }

    fn fail(&mut self, folder: PathBuf, error: AppError) {
        tracing::error!(construct = %self.section, book = %folder.display(), error = %error, "Book failed");
        self.failures.push(BookFailure {
            folder,
            error: error.to_string(),
        });
    }
}

/// Outcome of a whole run, one entry per construct in configured order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    /// Per-construct outcomes.
    pub constructs: Vec<ConstructSummary>,
}

impl RunSummary {
    /// Whether any construct could not run.
    pub fn has_fatal(&self) -> bool {
        self.constructs.iter().any(|c| c.fatal.is_some())
    }

    /// Log one line per construct.
    pub fn log(&self) {
        for c in &self.constructs {
            if let Some(fatal) = &c.fatal {
                tracing::error!(construct = %c.section, "Construct aborted: {fatal}");
                continue;
            }
            tracing::info!(
                construct = %c.section,
                created = c.created,
                updated = c.updated,
                skipped = c.skipped,
                excluded = c.excluded,
                ignored = c.ignored,
                warnings = c.warnings.len(),
                failures = c.failures.len(),
                "Construct finished"
            );
        }
    }
}

/// Fail unless both roots of `construct` are directories.
pub fn check_roots(fs: &dyn FileSystem, construct: &Construct) -> Result<()> {
    for (role, path) in [
        ("source", &construct.source),
        ("destination", &construct.destination),
    ] {
        if !fs.is_dir(path) {
            return Err(AppError::ConstructRootInaccessible {
                section: construct.section.clone(),
                role,
                path: path.clone(),
            });
        }
    }
    Ok(())
}

/// Scan a construct's library and evaluate its policy on every book.
///
/// Book folders that cannot be read are returned as failures; only an
/// unreadable library root fails the call.
pub fn load_candidates(
    fs: &dyn FileSystem,
    construct: &Construct,
    scope: ScanScope,
) -> Result<(Vec<Candidate>, Vec<BookFailure>)> {
    let mut candidates = Vec::new();
    let mut failures = Vec::new();

    for folder in book_folders(fs, construct, scope)? {
        match SourceBook::load(
            fs,
            &folder.author_folder,
            &folder.path,
            &construct.book_file_types,
        ) {
            Ok(book) => {
                let selection = construct.selection.evaluate(&book);
                candidates.push(Candidate { book, selection });
            }
            Err(e) => {
                tracing::warn!(path = %folder.path.display(), error = %e, "Could not read book folder");
                failures.push(BookFailure {
                    folder: folder.path,
                    error: e.to_string(),
                });
            }
        }
    }

    Ok((candidates, failures))
}

/// Drives constructs through the filesystem port.
pub struct SyncEngine<'a> {
    fs: &'a dyn FileSystem,
    ctx: RunContext,
}

impl<'a> SyncEngine<'a> {
    /// Create an engine over `fs`.
    pub fn new(fs: &'a dyn FileSystem, ctx: RunContext) -> Self {
        Self { fs, ctx }
    }

    /// Process every construct in order. Failures are collected, never
    /// propagated.
    pub fn run(&self, config: &Config) -> RunSummary {
        if self.ctx.dry_run {
            let dry = DryRunFs::new(self.fs);
            let summary = self.run_on(&dry, config);
            tracing::info!(suppressed = dry.suppressed(), "Dry run finished");
            summary
        } else {
            self.run_on(self.fs, config)
        }
    }

    fn run_on(&self, fs: &dyn FileSystem, config: &Config) -> RunSummary {
        RunSummary {
            constructs: config
                .constructs
                .iter()
                .map(|construct| self.run_construct(fs, construct))
                .collect(),
        }
    }

    /// Plan every selected book of `construct` without applying anything.
    pub fn plan_construct(&self, construct: &Construct) -> Result<Vec<PlanEntry>> {
        check_roots(self.fs, construct)?;
        let (candidates, _) = load_candidates(self.fs, construct, ScanScope::Selectable)?;
        let planner = Planner::new(self.fs, construct, self.ctx.force_update);
        candidates
            .iter()
            .filter(|c| c.selection.is_selected())
            .map(|c| planner.plan_book(&c.book))
            .collect()
    }

    fn run_construct(&self, fs: &dyn FileSystem, construct: &Construct) -> ConstructSummary {
        let mut summary = ConstructSummary::new(&construct.section);
        tracing::info!(
            construct = %construct.section,
            source = %construct.source.display(),
            destination = %construct.destination.display(),
            "Processing construct"
        );

        let scanned = check_roots(fs, construct)
            .and_then(|()| load_candidates(fs, construct, ScanScope::Selectable));
        let (candidates, failures) = match scanned {
            Ok(scanned) => scanned,
            Err(e) => {
                tracing::error!(construct = %construct.section, error = %e, "Skipping construct");
                summary.fatal = Some(e.to_string());
                return summary;
            }
        };
        summary.failures = failures;

        let planner = Planner::new(fs, construct, self.ctx.force_update);
        for candidate in &candidates {
            let book = &candidate.book;
            match &candidate.selection {
                Selection::Ignored => {
                    tracing::debug!(book = %book.folder.display(), "Ignored: no configured book type");
                    summary.ignored += 1;
                }
                Selection::Excluded => {
                    summary.excluded += 1;
                    if matches!(construct.selection, SelectionPolicy::BySubject(_))
                        && book.metadata.is_none()
                    {
                        summary.warn(&book.folder, BookWarning::MissingMetadata);
                    }
                }
                Selection::Selected(reason) => {
                    tracing::debug!(book = %book.folder.display(), %reason, "Selected");
                    match planner
                        .plan_book(book)
                        .and_then(|entry| apply(fs, &entry, construct.link_mode).map(|()| entry))
                    {
                        Ok(entry) => {
                            for warning in &entry.warnings {
                                summary.warn(&book.folder, *warning);
                            }
                            match entry.action {
                                PlanAction::Create => summary.created += 1,
                                PlanAction::Update => summary.updated += 1,
                                PlanAction::Skip => summary.skipped += 1,
                                PlanAction::MissingBookFile => {}
                            }
                            tracing::info!(
                                construct = %construct.section,
                                destination = %entry.destination_folder.display(),
                                action = %entry.action,
                                "Planned"
                            );
                        }
                        Err(e) => summary.fail(book.folder.clone(), e),
                    }
                }
            }
        }

        summary
    }
}
