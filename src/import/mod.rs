//! Import pipeline orchestration.
//!
//! A run proceeds in fixed stages:
//!
//! 1. Parse the export manifest out of the archive.
//! 2. List the target organization's tags and diff them against the
//!    export's tags.
//! 3. Reconcile tags per the chosen strategy, freezing the key-to-id
//!    mapping ([`tags`]).
//! 4. Upload documents sequentially, attaching mapped tags ([`documents`]).
//!
//! Only the stages before tag creation can fail the run: an unreadable
//! archive or a failed tag listing. From there on every error is absorbed
//! into the run's [`ImportStats`] and the batch keeps going.

use std::fmt;
use std::io::{Read, Seek};
use std::str::FromStr;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::api::{ApiError, DocumentApi};
use crate::export::{ArchiveError, ExportArchive};

pub mod documents;
pub mod stats;
pub mod tags;

pub use documents::import_documents;
pub use stats::{DocumentOutcome, ImportErrorEntry, ImportStats};
pub use tags::{TagDiff, TagMapping, TagReconciliation, TagStrategy, diff_tags, reconcile_tags};

/// What to do with the export's documents once tags are reconciled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DocumentMode {
    /// Upload documents and attach their mapped tags.
    #[default]
    WithTags,
    /// Upload documents, leave all tags off.
    WithoutTags,
    /// Reconcile tags only, upload nothing.
    Skip,
}

impl fmt::Display for DocumentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DocumentMode::WithTags => "with-tags",
            DocumentMode::WithoutTags => "without-tags",
            DocumentMode::Skip => "skip",
        };
        write!(f, "{s}")
    }
}

impl FromStr for DocumentMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "with-tags" => Ok(DocumentMode::WithTags),
            "without-tags" => Ok(DocumentMode::WithoutTags),
            "skip" => Ok(DocumentMode::Skip),
            _ => Err(()),
        }
    }
}

/// Settings for a single import run.
#[derive(Debug, Clone)]
pub struct ImportOptions {
    pub organization_id: String,
    pub tag_strategy: TagStrategy,
    pub document_mode: DocumentMode,
    pub dry_run: bool,
}

/// Failures that abort a run before any document is touched.
#[derive(Error, Debug)]
pub enum ImportRunError {
    #[error(transparent)]
    Archive(#[from] ArchiveError),
    #[error("failed to list existing tags: {}", .0.message())]
    ListTags(ApiError),
}

/// Run the full import pipeline against one archive.
///
/// With `dry_run` set, the run stops after reporting the manifest preview
/// and the tag diff; nothing is written to the target.
pub async fn run_import<A, R>(
    api: &A,
    archive: &mut ExportArchive<R>,
    options: &ImportOptions,
    cancel: &CancellationToken,
) -> Result<ImportStats, ImportRunError>
where
    A: DocumentApi,
    R: Read + Seek,
{
    log::info!("importing into organization {}", options.organization_id);

    let manifest = archive.manifest()?;
    let preview = manifest.preview();
    log::info!(
        "export contains {} document(s) and {} tag(s)",
        preview.document_count,
        preview.tag_count
    );
    if let (Some(earliest), Some(latest)) = (preview.earliest_created, preview.latest_created) {
        log::info!(
            "documents dated {} to {}",
            earliest.format("%Y-%m-%d"),
            latest.format("%Y-%m-%d")
        );
    }

    let existing = api
        .list_tags(&options.organization_id)
        .await
        .map_err(ImportRunError::ListTags)?;
    let diff = diff_tags(&manifest.tags, existing);
    log::info!(
        "target has a name match for {} of {} export tag(s), {} missing",
        manifest.tags.len() - diff.missing.len(),
        manifest.tags.len(),
        diff.missing.len()
    );

    if options.dry_run {
        log::info!("dry run: stopping before any write");
        return Ok(ImportStats::default());
    }

    let reconciliation = reconcile_tags(
        api,
        &options.organization_id,
        &manifest.tags,
        &diff,
        options.tag_strategy,
        cancel,
    )
    .await;

    let mut stats = ImportStats {
        tags_created: reconciliation.tags_created,
        ..ImportStats::default()
    };

    match options.document_mode {
        DocumentMode::Skip => {
            log::info!("document mode skip: ending run after tag reconciliation");
        }
        mode => {
            import_documents(
                api,
                archive,
                &options.organization_id,
                &manifest.documents,
                &reconciliation.mapping,
                mode == DocumentMode::WithTags,
                cancel,
                &mut stats,
            )
            .await;
        }
    }

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_mode_round_trips_through_str() {
        for mode in [
            DocumentMode::WithTags,
            DocumentMode::WithoutTags,
            DocumentMode::Skip,
        ] {
            assert_eq!(mode.to_string().parse::<DocumentMode>(), Ok(mode));
        }
        assert_eq!("tags-only".parse::<DocumentMode>(), Err(()));
    }
}
