//! Target document service boundary.
//!
//! The import pipeline talks to the target system exclusively through the
//! [`DocumentApi`] trait; [`client::ApiClient`] is the production
//! implementation. Errors keep the HTTP status so callers can classify the
//! 409 duplicate signal that makes reruns idempotent.

pub mod client;

pub use client::ApiClient;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

/// Errors returned while talking to the target document service.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("API HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API returned status {status}: {body}")]
    Service { status: StatusCode, body: String },
    #[error("failed to decode API response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ApiError {
    /// The duplicate signal: the target already holds this document.
    pub fn is_conflict(&self) -> bool {
        matches!(self, ApiError::Service { status, .. } if *status == StatusCode::CONFLICT)
    }

    /// Message text recorded in per-document error reports.
    pub fn message(&self) -> String {
        match self {
            ApiError::Service { status, body } => {
                if body.is_empty() {
                    format!("status {status}")
                } else {
                    body.clone()
                }
            }
            ApiError::Http(error) => error.to_string(),
            ApiError::Decode(error) => error.to_string(),
        }
    }
}

/// A tag as the target organization knows it. The identifier is opaque.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteTag {
    pub id: String,
    pub name: String,
}

/// A document created by an upload.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteDocument {
    pub id: String,
}

/// Operations the import pipeline needs from the target document service,
/// all scoped to one organization.
///
/// `upload_document` answering 409 means the document already exists; the
/// importer counts it as skipped rather than failed.
#[async_trait]
pub trait DocumentApi {
    async fn list_tags(&self, organization_id: &str) -> Result<Vec<RemoteTag>, ApiError>;

    async fn create_tag(
        &self,
        organization_id: &str,
        name: &str,
        color: &str,
    ) -> Result<RemoteTag, ApiError>;

    async fn upload_document(
        &self,
        organization_id: &str,
        file_name: &str,
        mime_type: &str,
        bytes: Vec<u8>,
    ) -> Result<RemoteDocument, ApiError>;

    async fn add_tag_to_document(
        &self,
        organization_id: &str,
        document_id: &str,
        tag_id: &str,
    ) -> Result<(), ApiError>;
}
