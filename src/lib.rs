pub mod api;
pub mod config;
pub mod export;
pub mod import;

#[cfg_attr(not(test), allow(dead_code))]
pub mod test_support {
    use std::collections::{HashMap, HashSet};
    use std::io::{Cursor, Write};
    use std::sync::{Mutex, MutexGuard};

    use async_trait::async_trait;
    use reqwest::StatusCode;
    use serde_json::{Value, json};
    use zip::write::SimpleFileOptions;
    use zip::{CompressionMethod, ZipWriter};

    use crate::api::{ApiError, DocumentApi, RemoteDocument, RemoteTag};
    use crate::export::ExportArchive;

    /// A document the fake target accepted.
    #[derive(Debug, Clone)]
    pub struct UploadedDocument {
        pub id: String,
        pub file_name: String,
        pub mime_type: String,
        pub bytes: Vec<u8>,
    }

    #[derive(Default)]
    struct RecordingState {
        tags: Vec<RemoteTag>,
        created_tag_names: Vec<String>,
        uploads: Vec<UploadedDocument>,
        attachments: Vec<(String, String)>,
        failing_tag_names: HashSet<String>,
        upload_failures: HashMap<String, (StatusCode, String)>,
        failing_attachment_tags: HashSet<String>,
        list_tags_failure: Option<(StatusCode, String)>,
        next_tag_id: usize,
        next_document_id: usize,
    }

    /// In-memory stand-in for the target document service.
    ///
    /// Records every call and answers like the real service would: uploads
    /// of a file name it has already accepted come back as 409, and
    /// individual calls can be scripted to fail.
    #[derive(Default)]
    pub struct RecordingApi {
        inner: Mutex<RecordingState>,
    }

    impl RecordingApi {
        pub fn new() -> Self {
            Self::default()
        }

        fn state(&self) -> MutexGuard<'_, RecordingState> {
            self.inner.lock().expect("recording api state is available")
        }

        /// Add a tag that already exists in the target organization.
        pub fn seed_tag(&self, id: &str, name: &str) {
            self.state().tags.push(RemoteTag {
                id: id.to_string(),
                name: name.to_string(),
            });
        }

        /// Make `create_tag` calls for `name` fail with a 500.
        pub fn fail_tag_creation(&self, name: &str) {
            self.state().failing_tag_names.insert(name.to_string());
        }

        /// Make uploads of `file_name` fail with the given status and body.
        pub fn fail_upload(&self, file_name: &str, status: StatusCode, body: &str) {
            self.state()
                .upload_failures
                .insert(file_name.to_string(), (status, body.to_string()));
        }

        /// Make `list_tags` fail with a 500.
        pub fn fail_list_tags(&self) {
            self.state().list_tags_failure = Some((
                StatusCode::INTERNAL_SERVER_ERROR,
                "tag listing failed".to_string(),
            ));
        }

        /// Make attaching the given tag id fail with a 500.
        pub fn fail_attachment(&self, tag_id: &str) {
            self.state()
                .failing_attachment_tags
                .insert(tag_id.to_string());
        }

        /// Current tag listing, the way `list_tags` would answer.
        pub fn remote_tags(&self) -> Vec<RemoteTag> {
            self.state().tags.clone()
        }

        /// Names passed to successful `create_tag` calls, in call order.
        pub fn created_tag_names(&self) -> Vec<String> {
            self.state().created_tag_names.clone()
        }

        /// Id of the tag named `name`, seeded or created.
        pub fn tag_id(&self, name: &str) -> Option<String> {
            self.state()
                .tags
                .iter()
                .find(|tag| tag.name == name)
                .map(|tag| tag.id.clone())
        }

        pub fn upload_count(&self) -> usize {
            self.state().uploads.len()
        }

        pub fn uploaded_file_names(&self) -> Vec<String> {
            self.state()
                .uploads
                .iter()
                .map(|upload| upload.file_name.clone())
                .collect()
        }

        pub fn attachment_count(&self) -> usize {
            self.state().attachments.len()
        }

        /// Tag ids attached to the uploaded document named `file_name`.
        pub fn attachments_for(&self, file_name: &str) -> Vec<String> {
            let state = self.state();
            let Some(upload) = state
                .uploads
                .iter()
                .find(|upload| upload.file_name == file_name)
            else {
                return Vec::new();
            };
            state
                .attachments
                .iter()
                .filter(|(document_id, _)| *document_id == upload.id)
                .map(|(_, tag_id)| tag_id.clone())
                .collect()
        }
    }

    #[async_trait]
    impl DocumentApi for RecordingApi {
        async fn list_tags(&self, _organization_id: &str) -> Result<Vec<RemoteTag>, ApiError> {
            let state = self.state();
            if let Some((status, body)) = &state.list_tags_failure {
                return Err(ApiError::Service {
                    status: *status,
                    body: body.clone(),
                });
            }
            Ok(state.tags.clone())
        }

        async fn create_tag(
            &self,
            _organization_id: &str,
            name: &str,
            _color: &str,
        ) -> Result<RemoteTag, ApiError> {
            let mut state = self.state();
            if state.failing_tag_names.contains(name) {
                return Err(ApiError::Service {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    body: format!("cannot create tag \"{name}\""),
                });
            }
            state.next_tag_id += 1;
            let tag = RemoteTag {
                id: format!("tag-{}", state.next_tag_id),
                name: name.to_string(),
            };
            state.tags.push(tag.clone());
            state.created_tag_names.push(name.to_string());
            Ok(tag)
        }

        async fn upload_document(
            &self,
            _organization_id: &str,
            file_name: &str,
            mime_type: &str,
            bytes: Vec<u8>,
        ) -> Result<RemoteDocument, ApiError> {
            let mut state = self.state();
            if let Some((status, body)) = state.upload_failures.get(file_name) {
                return Err(ApiError::Service {
                    status: *status,
                    body: body.clone(),
                });
            }
            if state.uploads.iter().any(|upload| upload.file_name == file_name) {
                return Err(ApiError::Service {
                    status: StatusCode::CONFLICT,
                    body: "document already exists".to_string(),
                });
            }
            state.next_document_id += 1;
            let id = format!("doc-{}", state.next_document_id);
            state.uploads.push(UploadedDocument {
                id: id.clone(),
                file_name: file_name.to_string(),
                mime_type: mime_type.to_string(),
                bytes,
            });
            Ok(RemoteDocument { id })
        }

        async fn add_tag_to_document(
            &self,
            _organization_id: &str,
            document_id: &str,
            tag_id: &str,
        ) -> Result<(), ApiError> {
            let mut state = self.state();
            if state.failing_attachment_tags.contains(tag_id) {
                return Err(ApiError::Service {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    body: format!("cannot attach tag {tag_id}"),
                });
            }
            state
                .attachments
                .push((document_id.to_string(), tag_id.to_string()));
            Ok(())
        }
    }

    /// Builds in-memory export archives for tests.
    #[derive(Default)]
    pub struct ExportArchiveBuilder {
        records: Vec<Value>,
        payloads: Vec<(String, Vec<u8>)>,
    }

    impl ExportArchiveBuilder {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn tag(mut self, pk: i64, name: &str, color: &str) -> Self {
            self.records.push(json!({
                "model": "documents.tag",
                "pk": pk,
                "fields": {"name": name, "color": color},
            }));
            self
        }

        /// Add a document record plus its payload under `originals/`.
        pub fn document(
            mut self,
            pk: i64,
            title: &str,
            file_name: &str,
            tag_keys: &[i64],
            payload: &[u8],
        ) -> Self {
            let path = format!("originals/{file_name}");
            self.records.push(json!({
                "model": "documents.document",
                "pk": pk,
                "fields": {
                    "title": title,
                    "original_filename": file_name,
                    "mime_type": Value::Null,
                    "tags": tag_keys,
                    "created": "2024-01-15T10:00:00Z",
                    "modified": "2024-01-15T10:00:00Z",
                },
                "__exported_file_name__": path,
            }));
            self.payloads.push((path, payload.to_vec()));
            self
        }

        /// Add a document record that names no archive member.
        pub fn document_without_payload(mut self, pk: i64, title: &str, tag_keys: &[i64]) -> Self {
            self.records.push(json!({
                "model": "documents.document",
                "pk": pk,
                "fields": {
                    "title": title,
                    "original_filename": Value::Null,
                    "mime_type": Value::Null,
                    "tags": tag_keys,
                    "created": "2024-01-15T10:00:00Z",
                    "modified": "2024-01-15T10:00:00Z",
                },
                "__exported_file_name__": Value::Null,
            }));
            self
        }

        /// Add a raw manifest record verbatim.
        pub fn record(mut self, record: Value) -> Self {
            self.records.push(record);
            self
        }

        /// Add an archive member without a matching manifest record.
        pub fn payload(mut self, path: &str, bytes: &[u8]) -> Self {
            self.payloads.push((path.to_string(), bytes.to_vec()));
            self
        }

        pub fn build_bytes(&self) -> Vec<u8> {
            let mut cursor = Cursor::new(Vec::new());
            {
                let mut zip = ZipWriter::new(&mut cursor);
                let options =
                    SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

                zip.start_file("manifest.json", options)
                    .expect("manifest member starts");
                let manifest =
                    serde_json::to_vec(&self.records).expect("manifest records serialize");
                zip.write_all(&manifest).expect("manifest member is written");

                for (path, bytes) in &self.payloads {
                    zip.start_file(path.as_str(), options)
                        .expect("payload member starts");
                    zip.write_all(bytes).expect("payload member is written");
                }
                zip.finish().expect("archive finalizes");
            }
            cursor.into_inner()
        }

        pub fn build(&self) -> ExportArchive<Cursor<Vec<u8>>> {
            ExportArchive::from_reader(Cursor::new(self.build_bytes()))
                .expect("generated archive is readable")
        }
    }
}
