//! Export archive access.
//!
//! An export is a zip archive holding `manifest.json` plus one payload file
//! per document. The archive is the only thing read during a run; everything
//! written goes to the target service.

use std::fs::File;
use std::io::{self, Read, Seek};
use std::path::Path;
use thiserror::Error;
use zip::ZipArchive;
use zip::result::ZipError;

use super::manifest::{self, ExportManifest, ManifestError};

/// Archive member holding the export manifest.
const MANIFEST_MEMBER: &str = "manifest.json";

/// Preallocation cap for member reads; sizes come from the archive header
/// and a corrupt one can claim anything.
const MEMBER_PREALLOC_CAP: u64 = 256 * 1024;

/// Errors raised while reading the export archive.
///
/// A missing or unreadable manifest aborts the run; a missing payload is
/// caught per document and folded into that document's failure outcome.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("failed to read export archive: {0}")]
    Io(#[from] io::Error),
    #[error("not a readable zip archive: {0}")]
    Zip(#[from] ZipError),
    #[error("archive has no manifest.json member; is this a document export?")]
    MissingManifest,
    #[error("archive has no member `{path}`")]
    MissingPayload { path: String },
    #[error(transparent)]
    Manifest(#[from] ManifestError),
}

/// Read access to a document export archive.
#[derive(Debug)]
pub struct ExportArchive<R> {
    archive: ZipArchive<R>,
}

impl ExportArchive<File> {
    /// Open an export archive from disk.
    pub fn open(path: &Path) -> Result<Self, ArchiveError> {
        let file = File::open(path)?;
        Self::from_reader(file)
    }
}

impl<R: Read + Seek> ExportArchive<R> {
    /// Wrap any seekable reader holding zip data.
    pub fn from_reader(reader: R) -> Result<Self, ArchiveError> {
        let archive = ZipArchive::new(reader)?;
        Ok(Self { archive })
    }

    /// Extract and parse the manifest.
    pub fn manifest(&mut self) -> Result<ExportManifest, ArchiveError> {
        let raw = self.read_member(MANIFEST_MEMBER).map_err(|error| match error {
            ArchiveError::MissingPayload { .. } => ArchiveError::MissingManifest,
            other => other,
        })?;

        log::debug!("extracted manifest ({} bytes)", raw.len());
        Ok(manifest::parse_manifest(&raw)?)
    }

    /// Extract one document payload by its manifest-recorded archive path.
    pub fn read_payload(&mut self, path: &str) -> Result<Vec<u8>, ArchiveError> {
        self.read_member(path)
    }

    fn read_member(&mut self, path: &str) -> Result<Vec<u8>, ArchiveError> {
        let mut member = match self.archive.by_name(path) {
            Ok(member) => member,
            Err(ZipError::FileNotFound) => {
                return Err(ArchiveError::MissingPayload {
                    path: path.to_string(),
                });
            }
            Err(error) => return Err(error.into()),
        };

        let mut bytes = Vec::with_capacity(member.size().min(MEMBER_PREALLOC_CAP) as usize);
        member.read_to_end(&mut bytes)?;
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ExportArchiveBuilder;
    use std::io::Cursor;

    #[test]
    fn test_read_manifest_and_payload() {
        let mut archive = ExportArchiveBuilder::new()
            .tag(1, "Invoices", "#ff0000")
            .document(10, "January invoice", "invoice.pdf", &[1], b"%PDF-1.4")
            .build();

        let manifest = archive.manifest().expect("manifest parses");
        assert_eq!(manifest.tags.len(), 1);
        assert_eq!(manifest.documents.len(), 1);

        let path = manifest.documents[0]
            .payload_path
            .clone()
            .expect("payload path recorded");
        let payload = archive.read_payload(&path).expect("payload extracts");
        assert_eq!(payload, b"%PDF-1.4");
    }

    #[test]
    fn test_payload_larger_than_prealloc_cap_reads_fully() {
        let payload = vec![7u8; MEMBER_PREALLOC_CAP as usize + 1];
        let mut archive = ExportArchiveBuilder::new()
            .document(10, "Scanned bundle", "bundle.pdf", &[], &payload)
            .build();

        let extracted = archive
            .read_payload("originals/bundle.pdf")
            .expect("payload extracts");
        assert_eq!(extracted, payload);
    }

    #[test]
    fn test_missing_payload_is_reported_with_path() {
        let mut archive = ExportArchiveBuilder::new()
            .tag(1, "Invoices", "#ff0000")
            .build();

        let error = archive.read_payload("originals/absent.pdf").unwrap_err();
        assert!(matches!(
            error,
            ArchiveError::MissingPayload { ref path } if path == "originals/absent.pdf"
        ));
    }

    #[test]
    fn test_archive_without_manifest_is_rejected() {
        use std::io::Write;
        use zip::ZipWriter;
        use zip::write::SimpleFileOptions;

        let mut cursor = Cursor::new(Vec::new());
        {
            let mut zip = ZipWriter::new(&mut cursor);
            zip.start_file("originals/loose.pdf", SimpleFileOptions::default())
                .unwrap();
            zip.write_all(b"%PDF-1.4").unwrap();
            zip.finish().unwrap();
        }

        let mut archive =
            ExportArchive::from_reader(Cursor::new(cursor.into_inner())).expect("zip opens");
        let error = archive.manifest().unwrap_err();
        assert!(matches!(error, ArchiveError::MissingManifest));
    }

    #[test]
    fn test_garbage_bytes_are_not_an_archive() {
        let error = ExportArchive::from_reader(Cursor::new(b"not a zip".to_vec())).unwrap_err();
        assert!(matches!(error, ArchiveError::Zip(_)));
    }
}
