//! Export archive reading and manifest parsing.

pub mod archive;
pub mod manifest;

pub use archive::{ArchiveError, ExportArchive};
pub use manifest::{
    ExportDocument, ExportManifest, ExportPreview, ExportTag, ManifestError, parse_manifest,
};
