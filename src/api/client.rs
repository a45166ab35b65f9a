//! HTTP client for the target document service.

use async_trait::async_trait;
use reqwest::multipart;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{ApiError, DocumentApi, RemoteDocument, RemoteTag};
use crate::config::ApiConfig;

/// Bearer-authenticated `reqwest` client for the target document service.
///
/// Tag calls use JSON bodies; document uploads use a multipart form. One
/// attempt per call; retry policy is the operator rerunning the import.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    config: ApiConfig,
}

impl ApiClient {
    pub fn new(config: ApiConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!("docport/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(ApiError::Http)?;

        Ok(Self {
            http: client,
            config,
        })
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// Turn a non-success response into `ApiError::Service` with its body.
    async fn check(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::Service { status, body })
        }
    }

    async fn decode<T: for<'de> Deserialize<'de>>(
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        let body = response.bytes().await.map_err(ApiError::Http)?;
        Ok(serde_json::from_slice(&body)?)
    }
}

#[async_trait]
impl DocumentApi for ApiClient {
    async fn list_tags(&self, organization_id: &str) -> Result<Vec<RemoteTag>, ApiError> {
        let url = self.url(&format!("/api/organizations/{organization_id}/tags"));
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.config.token)
            .send()
            .await
            .map_err(ApiError::Http)?;

        let response = Self::check(response).await?;
        let parsed: ListTagsResponse = Self::decode(response).await?;
        Ok(parsed.tags)
    }

    async fn create_tag(
        &self,
        organization_id: &str,
        name: &str,
        color: &str,
    ) -> Result<RemoteTag, ApiError> {
        let url = self.url(&format!("/api/organizations/{organization_id}/tags"));
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.config.token)
            .json(&CreateTagRequest { name, color })
            .send()
            .await
            .map_err(ApiError::Http)?;

        let response = Self::check(response).await?;
        let parsed: CreateTagResponse = Self::decode(response).await?;
        Ok(parsed.tag)
    }

    async fn upload_document(
        &self,
        organization_id: &str,
        file_name: &str,
        mime_type: &str,
        bytes: Vec<u8>,
    ) -> Result<RemoteDocument, ApiError> {
        let url = self.url(&format!("/api/organizations/{organization_id}/documents"));
        let part = multipart::Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(mime_type)
            .map_err(ApiError::Http)?;
        let form = multipart::Form::new().part("file", part);

        let response = self
            .http
            .post(url)
            .bearer_auth(&self.config.token)
            .multipart(form)
            .send()
            .await
            .map_err(ApiError::Http)?;

        let response = Self::check(response).await?;
        let parsed: UploadDocumentResponse = Self::decode(response).await?;
        Ok(parsed.document)
    }

    async fn add_tag_to_document(
        &self,
        organization_id: &str,
        document_id: &str,
        tag_id: &str,
    ) -> Result<(), ApiError> {
        let url = self.url(&format!(
            "/api/organizations/{organization_id}/documents/{document_id}/tags"
        ));
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.config.token)
            .json(&AddTagRequest { tag_id })
            .send()
            .await
            .map_err(ApiError::Http)?;

        Self::check(response).await?;
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct CreateTagRequest<'a> {
    name: &'a str,
    color: &'a str,
}

#[derive(Debug, Serialize)]
struct AddTagRequest<'a> {
    #[serde(rename = "tagId")]
    tag_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct ListTagsResponse {
    tags: Vec<RemoteTag>,
}

#[derive(Debug, Deserialize)]
struct CreateTagResponse {
    tag: RemoteTag,
}

#[derive(Debug, Deserialize)]
struct UploadDocumentResponse {
    document: RemoteDocument,
}
