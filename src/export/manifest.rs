//! Export manifest parsing and normalization.
//!
//! The manifest is a single JSON array of typed records (`model`, `pk`,
//! `fields`). Tag and document records are extracted in manifest order;
//! records of any other model (correspondents, users, saved views, ...) are
//! ignored. Text fields are sanitized and tag colors are normalized here so
//! the rest of the pipeline only ever sees well-formed values.
//!
//! A malformed manifest is fatal: the import has not written anything yet,
//! so the run aborts with a clear message instead of guessing.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Deserialize;
use std::sync::OnceLock;
use thiserror::Error;

/// Manifest model name for tag records.
const TAG_MODEL: &str = "documents.tag";
/// Manifest model name for document records.
const DOCUMENT_MODEL: &str = "documents.document";

/// Color applied when an export tag carries no usable color.
pub const DEFAULT_TAG_COLOR: &str = "#a6cee3";

/// Hex values for the legacy integer color palette (1-based) used by older
/// exports that store `colour` as a palette index instead of a hex string.
const LEGACY_COLOR_PALETTE: [&str; 13] = [
    "#a6cee3", "#1f78b4", "#b2df8a", "#33a02c", "#fb9a99", "#e31a1c", "#fdbf6f", "#ff7f00",
    "#cab2d6", "#6a3d9a", "#b15928", "#000000", "#cccccc",
];

static HEX_COLOR_REGEX: OnceLock<Regex> = OnceLock::new();

fn hex_color_regex() -> &'static Regex {
    HEX_COLOR_REGEX.get_or_init(|| Regex::new(r"^#[0-9a-f]{6}$").expect("Invalid hex color regex"))
}

/// A tag record from the export manifest.
///
/// `key` is the export-local numeric identifier other records reference;
/// it is meaningless outside the export. Identity for reconciliation is
/// `name` (case-sensitive exact match).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportTag {
    pub key: i64,
    pub name: String,
    pub color: String,
}

/// A document record from the export manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportDocument {
    pub key: i64,
    pub title: String,
    pub original_filename: Option<String>,
    pub mime_type: Option<String>,
    /// References into [`ExportTag::key`], in manifest order. May be empty,
    /// and may contain keys no tag record declares.
    pub tag_keys: Vec<i64>,
    /// Path of the payload inside the archive. Absent in malformed exports;
    /// surfaces as a per-document failure, never a run abort.
    pub payload_path: Option<String>,
    pub created: Option<DateTime<Utc>>,
}

impl ExportDocument {
    /// Filename shown to the target system and recorded in error reports.
    ///
    /// Falls back from the original filename through the archive path and
    /// the title to a fixed default.
    pub fn display_file_name(&self) -> String {
        for candidate in [
            self.original_filename.as_deref(),
            self.payload_path.as_deref(),
            Some(self.title.as_str()),
        ]
        .into_iter()
        .flatten()
        {
            if !candidate.is_empty() {
                return candidate.to_string();
            }
        }
        "untitled".to_string()
    }
}

/// Parsed export manifest: tag and document records in manifest order.
#[derive(Debug, Clone, Default)]
pub struct ExportManifest {
    pub tags: Vec<ExportTag>,
    pub documents: Vec<ExportDocument>,
}

impl ExportManifest {
    /// Summary shown to the operator before any write operation happens.
    pub fn preview(&self) -> ExportPreview {
        let mut earliest: Option<DateTime<Utc>> = None;
        let mut latest: Option<DateTime<Utc>> = None;
        for document in &self.documents {
            if let Some(created) = document.created {
                earliest = Some(earliest.map_or(created, |when| when.min(created)));
                latest = Some(latest.map_or(created, |when| when.max(created)));
            }
        }

        ExportPreview {
            document_count: self.documents.len(),
            tag_count: self.tags.len(),
            earliest_created: earliest,
            latest_created: latest,
        }
    }
}

/// Read-only projection of a parsed export for operator review.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportPreview {
    pub document_count: usize,
    pub tag_count: usize,
    pub earliest_created: Option<DateTime<Utc>>,
    pub latest_created: Option<DateTime<Utc>>,
}

/// Errors that can be returned while parsing the export manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("manifest is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("malformed tag record {pk}: {error}")]
    MalformedTag { pk: i64, error: String },
    #[error("malformed document record {pk}: {error}")]
    MalformedDocument { pk: i64, error: String },
}

#[derive(Debug, Deserialize)]
struct ManifestRecord {
    model: String,
    pk: i64,
    fields: serde_json::Value,
    #[serde(rename = "__exported_file_name__", default)]
    exported_file_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TagFields {
    name: String,
    #[serde(default)]
    color: Option<String>,
    #[serde(default)]
    colour: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct DocumentFields {
    #[serde(default)]
    title: String,
    #[serde(default)]
    original_filename: Option<String>,
    #[serde(default)]
    mime_type: Option<String>,
    #[serde(default)]
    tags: Vec<i64>,
    #[serde(default)]
    created: Option<String>,
}

/// Sanitize text by removing NUL bytes and surrounding whitespace
fn sanitize_text(text: &str) -> String {
    text.replace('\0', "").trim().to_string()
}

fn sanitize_optional(text: Option<String>) -> Option<String> {
    text.map(|value| sanitize_text(&value))
        .filter(|value| !value.is_empty())
}

/// Normalize a tag color to a lowercase `#rrggbb` string.
///
/// Accepts a hex string (newer exports) or a legacy palette index (older
/// exports); anything else falls back to [`DEFAULT_TAG_COLOR`].
fn normalize_color(color: Option<String>, colour: Option<i64>, tag_name: &str) -> String {
    if let Some(value) = color {
        let value = value.trim().to_ascii_lowercase();
        if hex_color_regex().is_match(&value) {
            return value;
        }
        if !value.is_empty() {
            log::warn!(
                "tag \"{}\" has unrecognized color `{}`, using default",
                tag_name,
                value
            );
        }
    }

    if let Some(index) = colour {
        if index >= 1 && index <= LEGACY_COLOR_PALETTE.len() as i64 {
            return LEGACY_COLOR_PALETTE[(index - 1) as usize].to_string();
        }
        log::warn!(
            "tag \"{}\" has out-of-range legacy colour {}, using default",
            tag_name,
            index
        );
    }

    DEFAULT_TAG_COLOR.to_string()
}

/// Parse a creation timestamp leniently. Unparseable values are dropped with
/// a warning; they only feed the preview's date range, never correctness.
fn parse_created(raw: Option<String>, pk: i64) -> Option<DateTime<Utc>> {
    let raw = raw?;
    if raw.trim().is_empty() {
        return None;
    }

    match dateparser::parse(&raw) {
        Ok(parsed) => Some(parsed.with_timezone(&Utc)),
        Err(error) => {
            log::warn!(
                "document {} has unparseable created date `{}`: {}",
                pk,
                raw,
                error
            );
            None
        }
    }
}

/// Parse the raw manifest bytes into tag and document records.
///
/// Records appear in the returned collections in the order the manifest
/// lists them; both the tag creation loop and the document import loop
/// depend on that order.
pub fn parse_manifest(raw: &[u8]) -> Result<ExportManifest, ManifestError> {
    let records: Vec<ManifestRecord> = serde_json::from_slice(raw)?;

    let mut manifest = ExportManifest::default();

    for record in records {
        match record.model.as_str() {
            TAG_MODEL => {
                let fields: TagFields =
                    serde_json::from_value(record.fields).map_err(|error| {
                        ManifestError::MalformedTag {
                            pk: record.pk,
                            error: error.to_string(),
                        }
                    })?;

                let name = sanitize_text(&fields.name);
                let color = normalize_color(fields.color, fields.colour, &name);
                manifest.tags.push(ExportTag {
                    key: record.pk,
                    name,
                    color,
                });
            }
            DOCUMENT_MODEL => {
                let fields: DocumentFields =
                    serde_json::from_value(record.fields).map_err(|error| {
                        ManifestError::MalformedDocument {
                            pk: record.pk,
                            error: error.to_string(),
                        }
                    })?;

                manifest.documents.push(ExportDocument {
                    key: record.pk,
                    title: sanitize_text(&fields.title),
                    original_filename: sanitize_optional(fields.original_filename),
                    mime_type: sanitize_optional(fields.mime_type),
                    tag_keys: fields.tags,
                    payload_path: record.exported_file_name,
                    created: parse_created(fields.created, record.pk),
                });
            }
            other => {
                log::trace!("ignoring manifest record {} of model {}", record.pk, other);
            }
        }
    }

    log::info!(
        "parsed manifest: {} document(s), {} tag(s)",
        manifest.documents.len(),
        manifest.tags.len()
    );

    Ok(manifest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(records: serde_json::Value) -> ExportManifest {
        parse_manifest(records.to_string().as_bytes()).expect("manifest parses")
    }

    #[test]
    fn test_parse_manifest_basic() {
        let manifest = parse(json!([
            { "model": "documents.tag", "pk": 1, "fields": { "name": "Invoices", "color": "#FF0000" } },
            { "model": "documents.tag", "pk": 2, "fields": { "name": "Receipts", "color": "#0000ff" } },
            { "model": "documents.correspondent", "pk": 9, "fields": { "name": "ignored" } },
            {
                "model": "documents.document",
                "pk": 10,
                "fields": {
                    "title": "January invoice",
                    "original_filename": "invoice.pdf",
                    "mime_type": "application/pdf",
                    "tags": [1, 2],
                    "created": "2024-01-15T10:00:00Z"
                },
                "__exported_file_name__": "originals/0000010.pdf"
            }
        ]));

        assert_eq!(manifest.tags.len(), 2);
        assert_eq!(manifest.tags[0].key, 1);
        assert_eq!(manifest.tags[0].name, "Invoices");
        assert_eq!(manifest.tags[0].color, "#ff0000");
        assert_eq!(manifest.tags[1].name, "Receipts");

        assert_eq!(manifest.documents.len(), 1);
        let document = &manifest.documents[0];
        assert_eq!(document.key, 10);
        assert_eq!(document.title, "January invoice");
        assert_eq!(document.original_filename.as_deref(), Some("invoice.pdf"));
        assert_eq!(document.mime_type.as_deref(), Some("application/pdf"));
        assert_eq!(document.tag_keys, vec![1, 2]);
        assert_eq!(
            document.payload_path.as_deref(),
            Some("originals/0000010.pdf")
        );
        assert!(document.created.is_some());
    }

    #[test]
    fn test_parse_manifest_legacy_colour_palette() {
        let manifest = parse(json!([
            { "model": "documents.tag", "pk": 1, "fields": { "name": "Old", "colour": 2 } },
            { "model": "documents.tag", "pk": 2, "fields": { "name": "OutOfRange", "colour": 99 } },
            { "model": "documents.tag", "pk": 3, "fields": { "name": "Bad", "color": "red" } },
            { "model": "documents.tag", "pk": 4, "fields": { "name": "None" } }
        ]));

        assert_eq!(manifest.tags[0].color, "#1f78b4");
        assert_eq!(manifest.tags[1].color, DEFAULT_TAG_COLOR);
        assert_eq!(manifest.tags[2].color, DEFAULT_TAG_COLOR);
        assert_eq!(manifest.tags[3].color, DEFAULT_TAG_COLOR);
    }

    #[test]
    fn test_parse_manifest_sanitizes_text() {
        let manifest = parse(json!([
            { "model": "documents.tag", "pk": 1, "fields": { "name": "  Tax\u{0000}es  ", "color": "#112233" } },
            {
                "model": "documents.document",
                "pk": 2,
                "fields": { "title": " Report\u{0000} ", "original_filename": "   ", "tags": [] },
                "__exported_file_name__": null
            }
        ]));

        assert_eq!(manifest.tags[0].name, "Taxes");
        assert_eq!(manifest.documents[0].title, "Report");
        // Whitespace-only filenames collapse to absent.
        assert_eq!(manifest.documents[0].original_filename, None);
        assert_eq!(manifest.documents[0].payload_path, None);
    }

    #[test]
    fn test_parse_manifest_rejects_malformed_tag() {
        let raw = json!([
            { "model": "documents.tag", "pk": 7, "fields": { "color": "#112233" } }
        ]);

        let error = parse_manifest(raw.to_string().as_bytes()).unwrap_err();
        assert!(matches!(error, ManifestError::MalformedTag { pk: 7, .. }));
    }

    #[test]
    fn test_parse_manifest_rejects_invalid_json() {
        let error = parse_manifest(b"{ not json").unwrap_err();
        assert!(matches!(error, ManifestError::Json(_)));
    }

    #[test]
    fn test_parse_manifest_drops_unparseable_created_date() {
        let manifest = parse(json!([
            {
                "model": "documents.document",
                "pk": 1,
                "fields": { "title": "A", "tags": [], "created": "not-a-date" },
                "__exported_file_name__": "originals/a.pdf"
            }
        ]));

        assert_eq!(manifest.documents[0].created, None);
    }

    #[test]
    fn test_preview_reports_created_date_range() {
        let manifest = parse(json!([
            {
                "model": "documents.document",
                "pk": 1,
                "fields": { "title": "A", "tags": [], "created": "2023-06-01T00:00:00Z" },
                "__exported_file_name__": "originals/a.pdf"
            },
            {
                "model": "documents.document",
                "pk": 2,
                "fields": { "title": "B", "tags": [], "created": "2021-02-01T00:00:00Z" },
                "__exported_file_name__": "originals/b.pdf"
            },
            {
                "model": "documents.document",
                "pk": 3,
                "fields": { "title": "C", "tags": [] },
                "__exported_file_name__": "originals/c.pdf"
            },
            { "model": "documents.tag", "pk": 4, "fields": { "name": "T", "color": "#112233" } }
        ]));

        let preview = manifest.preview();
        assert_eq!(preview.document_count, 3);
        assert_eq!(preview.tag_count, 1);
        assert_eq!(
            preview.earliest_created.map(|when| when.to_rfc3339()),
            Some("2021-02-01T00:00:00+00:00".to_string())
        );
        assert_eq!(
            preview.latest_created.map(|when| when.to_rfc3339()),
            Some("2023-06-01T00:00:00+00:00".to_string())
        );
    }

    #[test]
    fn test_display_file_name_fallback_chain() {
        let mut document = ExportDocument {
            key: 1,
            title: "Quarterly report".to_string(),
            original_filename: Some("report.pdf".to_string()),
            mime_type: None,
            tag_keys: Vec::new(),
            payload_path: Some("originals/0000001.pdf".to_string()),
            created: None,
        };

        assert_eq!(document.display_file_name(), "report.pdf");

        document.original_filename = None;
        assert_eq!(document.display_file_name(), "originals/0000001.pdf");

        document.payload_path = None;
        assert_eq!(document.display_file_name(), "Quarterly report");

        document.title = String::new();
        assert_eq!(document.display_file_name(), "untitled");
    }
}
