//! Tag reconciliation.
//!
//! Compares the export's tags against the tags already present in the
//! target organization and builds the key-to-id mapping that document
//! import attaches tags with. The mapping is frozen before any document
//! is uploaded.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use tokio_util::sync::CancellationToken;

use crate::api::{DocumentApi, RemoteTag};
use crate::export::ExportTag;

/// How export tags are matched up with tags in the target organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TagStrategy {
    /// Create tags missing from the target, map the rest by name.
    #[default]
    CreateAndMap,
    /// Create every export tag, even when one with the same name exists.
    CreateAll,
    /// Create nothing and import documents without tags.
    Skip,
}

impl fmt::Display for TagStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TagStrategy::CreateAndMap => "create-and-map",
            TagStrategy::CreateAll => "create-all",
            TagStrategy::Skip => "skip",
        };
        write!(f, "{s}")
    }
}

impl FromStr for TagStrategy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "create-and-map" => Ok(TagStrategy::CreateAndMap),
            "create-all" => Ok(TagStrategy::CreateAll),
            "skip" => Ok(TagStrategy::Skip),
            _ => Err(()),
        }
    }
}

/// Export tag key to remote tag id. A key absent from the mapping means the
/// tag was deliberately left unmapped; lookups must not treat that as an
/// error.
pub type TagMapping = HashMap<i64, String>;

/// The target organization's tag listing, plus the export tags that have
/// no name match in it.
#[derive(Debug, Clone, Default)]
pub struct TagDiff {
    pub existing: Vec<RemoteTag>,
    pub missing: Vec<ExportTag>,
}

/// Split `export_tags` against the remote listing by exact name match.
pub fn diff_tags(export_tags: &[ExportTag], existing: Vec<RemoteTag>) -> TagDiff {
    let missing = export_tags
        .iter()
        .filter(|tag| !existing.iter().any(|remote| remote.name == tag.name))
        .cloned()
        .collect();
    TagDiff { existing, missing }
}

/// Result of tag reconciliation: the frozen mapping plus how many creation
/// calls succeeded.
#[derive(Debug, Clone, Default)]
pub struct TagReconciliation {
    pub mapping: TagMapping,
    pub tags_created: usize,
}

/// Reconcile the export's tags against the target organization.
///
/// Creation failures are logged and skipped; the affected tag simply stays
/// out of the mapping. Only [`TagStrategy::CreateAndMap`] maps tags that
/// already existed remotely, and each remote tag claims at most one export
/// key (the first unmapped key with a matching name, in export order).
pub async fn reconcile_tags<A: DocumentApi>(
    api: &A,
    organization_id: &str,
    export_tags: &[ExportTag],
    diff: &TagDiff,
    strategy: TagStrategy,
    cancel: &CancellationToken,
) -> TagReconciliation {
    if export_tags.is_empty() {
        log::info!("export contains no tags, nothing to reconcile");
        return TagReconciliation::default();
    }

    let strategy = if diff.missing.is_empty() && strategy != TagStrategy::CreateAndMap {
        log::info!("all export tags already exist in the target, mapping by name");
        TagStrategy::CreateAndMap
    } else {
        strategy
    };

    if strategy == TagStrategy::Skip {
        log::info!("tag strategy skip: documents will be imported without tags");
        return TagReconciliation::default();
    }

    let to_create: &[ExportTag] = match strategy {
        TagStrategy::CreateAll => export_tags,
        _ => &diff.missing,
    };

    let mut reconciliation = TagReconciliation::default();
    for tag in to_create {
        if cancel.is_cancelled() {
            log::warn!("cancelled, stopping tag creation");
            break;
        }
        match api.create_tag(organization_id, &tag.name, &tag.color).await {
            Ok(created) => {
                reconciliation.mapping.insert(tag.key, created.id);
                reconciliation.tags_created += 1;
            }
            Err(e) => {
                log::warn!("failed to create tag \"{}\": {}", tag.name, e.message());
            }
        }
    }

    if strategy == TagStrategy::CreateAndMap {
        for remote in &diff.existing {
            let unmapped = export_tags.iter().find(|tag| {
                tag.name == remote.name && !reconciliation.mapping.contains_key(&tag.key)
            });
            if let Some(tag) = unmapped {
                reconciliation
                    .mapping
                    .insert(tag.key, remote.id.clone());
            }
        }
    }

    log::info!(
        "tag reconciliation done: {} created, {} mapped",
        reconciliation.tags_created,
        reconciliation.mapping.len()
    );
    reconciliation
}
