//! Document upload loop.
//!
//! Walks the manifest's documents in order, uploading each payload and
//! attaching mapped tags. Every document gets exactly one outcome; a
//! failure is recorded and the loop moves on.

use std::io::{Read, Seek};

use tokio_util::sync::CancellationToken;

use crate::api::DocumentApi;
use crate::export::{ExportArchive, ExportDocument};
use crate::import::stats::{DocumentOutcome, ImportStats};
use crate::import::tags::TagMapping;

const FALLBACK_MIME_TYPE: &str = "application/octet-stream";

/// Mime type from the manifest if present, guessed from the file name
/// otherwise.
fn resolve_mime_type(document: &ExportDocument, file_name: &str) -> String {
    if let Some(mime_type) = &document.mime_type {
        if !mime_type.is_empty() {
            return mime_type.clone();
        }
    }
    mime_guess::from_path(file_name)
        .first()
        .map(|mime| mime.to_string())
        .unwrap_or_else(|| FALLBACK_MIME_TYPE.to_string())
}

/// Upload `documents` sequentially, folding each outcome into `stats`.
///
/// A cancelled token stops the loop before the next document starts; the
/// document in flight finishes and is still accounted.
pub async fn import_documents<A, R>(
    api: &A,
    archive: &mut ExportArchive<R>,
    organization_id: &str,
    documents: &[ExportDocument],
    mapping: &TagMapping,
    apply_tags: bool,
    cancel: &CancellationToken,
    stats: &mut ImportStats,
) where
    A: DocumentApi,
    R: Read + Seek,
{
    let total = documents.len();
    log::info!("importing {total} document(s)");

    for (index, document) in documents.iter().enumerate() {
        if cancel.is_cancelled() {
            log::warn!("cancelled after {index} of {total} document(s), stopping import");
            break;
        }

        log::info!("importing document {}/{}: {}", index + 1, total, document.title);
        let file_name = document.display_file_name();
        let outcome = import_single_document(
            api,
            archive,
            organization_id,
            document,
            &file_name,
            mapping,
            apply_tags,
        )
        .await;

        if let DocumentOutcome::Failed(reason) = &outcome {
            log::warn!("failed to import \"{}\": {}", document.title, reason);
        }
        stats.record(&file_name, outcome);
    }
}

async fn import_single_document<A, R>(
    api: &A,
    archive: &mut ExportArchive<R>,
    organization_id: &str,
    document: &ExportDocument,
    file_name: &str,
    mapping: &TagMapping,
    apply_tags: bool,
) -> DocumentOutcome
where
    A: DocumentApi,
    R: Read + Seek,
{
    let Some(payload_path) = &document.payload_path else {
        return DocumentOutcome::Failed(
            "export records no archive path for this document".to_string(),
        );
    };
    let bytes = match archive.read_payload(payload_path) {
        Ok(bytes) => bytes,
        Err(e) => return DocumentOutcome::Failed(e.to_string()),
    };

    let mime_type = resolve_mime_type(document, file_name);
    let uploaded = match api
        .upload_document(organization_id, file_name, &mime_type, bytes)
        .await
    {
        Ok(uploaded) => uploaded,
        Err(e) if e.is_conflict() => return DocumentOutcome::AlreadyExists,
        Err(e) => return DocumentOutcome::Failed(e.message()),
    };

    if apply_tags {
        // Keys missing from the mapping were deliberately left unmapped.
        for tag_id in document.tag_keys.iter().filter_map(|key| mapping.get(key)) {
            if let Err(e) = api
                .add_tag_to_document(organization_id, &uploaded.id, tag_id)
                .await
            {
                log::warn!(
                    "failed to attach tag {} to \"{}\": {}",
                    tag_id,
                    document.title,
                    e.message()
                );
            }
        }
    }

    DocumentOutcome::Imported
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document(mime_type: Option<&str>) -> ExportDocument {
        ExportDocument {
            key: 1,
            title: "Quarterly report".to_string(),
            original_filename: Some("report.pdf".to_string()),
            mime_type: mime_type.map(str::to_string),
            tag_keys: vec![],
            payload_path: Some("originals/report.pdf".to_string()),
            created: None,
        }
    }

    #[test]
    fn test_manifest_mime_type_wins() {
        let document = document(Some("application/pdf"));
        assert_eq!(
            resolve_mime_type(&document, "report.bin"),
            "application/pdf"
        );
    }

    #[test]
    fn test_mime_type_guessed_from_file_name() {
        let document = document(None);
        assert_eq!(
            resolve_mime_type(&document, "report.pdf"),
            "application/pdf"
        );
    }

    #[test]
    fn test_unknown_extension_falls_back_to_octet_stream() {
        let document = document(Some(""));
        assert_eq!(
            resolve_mime_type(&document, "report.payload"),
            FALLBACK_MIME_TYPE
        );
    }
}
