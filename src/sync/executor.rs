//! Applying a plan entry to the destination.

use crate::config::LinkMode;
use crate::error::Result;
use crate::fs::FileSystem;
use crate::sync::planner::{ArtifactKind, PlanAction, PlanEntry};

/// Bring the destination folder of `entry` up to date.
///
/// Only stale artifacts are touched. A stale link or copy is removed before
/// it is recreated, which also takes care of dangling symlinks.
pub fn apply(fs: &dyn FileSystem, entry: &PlanEntry, link_mode: LinkMode) -> Result<()> {
    match entry.action {
        PlanAction::Skip | PlanAction::MissingBookFile => return Ok(()),
        PlanAction::Create | PlanAction::Update => {}
    }

    fs.make_dirs(&entry.destination_folder)?;

    for artifact in entry.stale_artifacts() {
        let dst = &artifact.destination;
        match artifact.kind {
            ArtifactKind::Metadata => {
                if let Some(content) = entry.metadata_content.as_deref() {
                    tracing::debug!(path = %dst.display(), "Writing metadata");
                    fs.write_file(dst, content.as_bytes())?;
                }
            }
            ArtifactKind::Book | ArtifactKind::Cover => {
                if fs.exists(dst) || fs.read_link(dst).is_some() {
                    fs.remove_file(dst)?;
                }
                match link_mode {
                    LinkMode::Symlink => {
                        tracing::debug!(src = %artifact.source.display(), dst = %dst.display(), "Linking");
                        fs.create_symlink(&artifact.source, dst)?;
                    }
                    LinkMode::Copy => {
                        tracing::debug!(src = %artifact.source.display(), dst = %dst.display(), "Copying");
                        fs.copy_file(&artifact.source, dst)?;
                    }
                }
            }
        }
    }

    Ok(())
}
