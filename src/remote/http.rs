use super::{RemoteError, RemoteService};
use crate::models::{
    DeleteOutcome, DocumentEntry, DocumentListing, QueryAnswer, QueryParams, ReloadSummary,
    ReplacedFile, ServiceStatus, Source, UploadFile, UploadOutcome,
};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct RemoteConfig {
    pub base_url: String,
    pub request_timeout: Duration,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            request_timeout: Duration::from_secs(120),
        }
    }
}

/// `RemoteService` over the backend's JSON REST API.
pub struct HttpRemote {
    client: Client,
    config: RemoteConfig,
}

#[derive(Serialize)]
struct QueryRequest<'a> {
    query: &'a str,
    max_results: usize,
    similarity_threshold: f32,
}

#[derive(Deserialize)]
struct QueryResponse {
    answer: String,
    #[serde(default)]
    sources: Vec<Source>,
}

#[derive(Deserialize)]
struct DocumentsResponse {
    #[serde(default)]
    documents: Vec<WireDocument>,
    total_chunks: Option<u64>,
}

#[derive(Deserialize)]
struct WireDocument {
    filename: String,
    file_path: Option<String>,
    #[serde(default)]
    chunks_count: u64,
    #[serde(default)]
    file_size: u64,
    file_modified: Option<Value>,
}

#[derive(Deserialize)]
struct UploadResponse {
    filename: String,
    #[serde(default)]
    replaced: bool,
    old_chunks: Option<u64>,
    #[serde(default)]
    new_chunks: u64,
}

#[derive(Deserialize)]
struct DeleteResponse {
    filename: String,
    #[serde(default)]
    deleted_chunks: u64,
    #[serde(default)]
    file_deleted_from_disk: bool,
}

#[derive(Deserialize)]
struct ReloadResponse {
    #[serde(default)]
    message: String,
    #[serde(default)]
    documents_processed: u64,
    #[serde(default)]
    replaced_files: Vec<ReplacedFile>,
    #[serde(default)]
    new_files: Vec<String>,
    #[serde(default)]
    processing_time: f64,
}

impl HttpRemote {
    pub fn new(config: RemoteConfig) -> Result<Self, RemoteError> {
        let client = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self { client, config })
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    fn url(&self, path: &str) -> Result<Url, RemoteError> {
        let base = self.config.base_url.trim_end_matches('/');
        Url::parse(&format!("{}{}", base, path))
            .map_err(|e| RemoteError::InvalidUrl(format!("{}: {}", base, e)))
    }

    fn document_url(&self, filename: &str) -> Result<Url, RemoteError> {
        let mut url = self.url("/api/documents")?;
        url.path_segments_mut()
            .map_err(|_| RemoteError::InvalidUrl(self.config.base_url.clone()))?
            .push(filename);
        Ok(url)
    }
}

#[async_trait]
impl RemoteService for HttpRemote {
    async fn query(&self, text: &str, params: QueryParams) -> Result<QueryAnswer, RemoteError> {
        let body = QueryRequest {
            query: text,
            max_results: params.result_cap,
            similarity_threshold: params.similarity_threshold,
        };
        debug!(chars = text.chars().count(), "POST /api/query");
        let resp = self.client.post(self.url("/api/query")?).json(&body).send().await?;
        decode_query(read_json(resp).await?)
    }

    async fn list_documents(&self) -> Result<DocumentListing, RemoteError> {
        debug!("GET /api/documents");
        let resp = self.client.get(self.url("/api/documents")?).send().await?;
        decode_listing(read_json(resp).await?)
    }

    async fn upload_document(&self, file: &UploadFile) -> Result<UploadOutcome, RemoteError> {
        let part = Part::bytes(file.bytes.clone())
            .file_name(file.filename.clone())
            .mime_str("text/plain")?;
        let form = Form::new().part("file", part);
        debug!(filename = %file.filename, bytes = file.bytes.len(), "POST /api/documents/upload");
        let resp = self
            .client
            .post(self.url("/api/documents/upload")?)
            .multipart(form)
            .send()
            .await?;
        decode_upload(read_json(resp).await?)
    }

    async fn delete_document(&self, filename: &str) -> Result<DeleteOutcome, RemoteError> {
        let url = self.document_url(filename)?;
        debug!(%url, "DELETE document");
        let resp = self.client.delete(url).send().await?;
        decode_delete(read_json(resp).await?)
    }

    async fn status(&self) -> Result<ServiceStatus, RemoteError> {
        let resp = self.client.get(self.url("/api/status")?).send().await?;
        decode_status(read_json(resp).await?)
    }

    async fn reload_documents(&self) -> Result<ReloadSummary, RemoteError> {
        debug!("POST /api/load-documents");
        let resp = self
            .client
            .post(self.url("/api/load-documents")?)
            .json(&serde_json::json!({}))
            .send()
            .await?;
        decode_reload(read_json(resp).await?)
    }
}

/// Read the body as JSON, turning non-2xx statuses into `RemoteError::Status`.
async fn read_json(resp: Response) -> Result<Value, RemoteError> {
    let status = resp.status();
    let text = resp.text().await?;
    if !status.is_success() {
        let reason = status.canonical_reason().unwrap_or("Unknown status");
        return Err(RemoteError::Status {
            status: status.as_u16(),
            message: error_detail(&text).unwrap_or_else(|| reason.to_string()),
        });
    }
    serde_json::from_str(&text).map_err(|e| RemoteError::Decode(e.to_string()))
}

/// Pull a human-readable message out of an error body (`detail` or `message`).
fn error_detail(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    let detail = value.get("detail").or_else(|| value.get("message"))?;
    match detail {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// `{"error": true}` or `{"success": false}` payloads carry a server-side failure.
fn server_failure(value: &Value, fallback: &str) -> Option<RemoteError> {
    let flagged = value.get("error").and_then(Value::as_bool) == Some(true)
        || value.get("success").and_then(Value::as_bool) == Some(false);
    if !flagged {
        return None;
    }
    let message = value
        .get("message")
        .and_then(Value::as_str)
        .filter(|m| !m.is_empty())
        .unwrap_or(fallback);
    Some(RemoteError::Server(message.to_string()))
}

fn parse<T: serde::de::DeserializeOwned>(value: Value) -> Result<T, RemoteError> {
    serde_json::from_value(value).map_err(|e| RemoteError::Decode(e.to_string()))
}

/// `file_modified` arrives as float seconds, sometimes stringified.
fn epoch_seconds(value: Option<&Value>) -> i64 {
    match value {
        Some(Value::Number(n)) => n.as_f64().map(|f| f as i64).unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse::<f64>().map(|f| f as i64).unwrap_or(0),
        _ => 0,
    }
}

pub(crate) fn decode_query(value: Value) -> Result<QueryAnswer, RemoteError> {
    if let Some(err) = server_failure(&value, "The server returned an error") {
        return Err(err);
    }
    let data: QueryResponse = parse(value)?;
    Ok(QueryAnswer {
        answer: data.answer,
        sources: data.sources,
    })
}

pub(crate) fn decode_listing(value: Value) -> Result<DocumentListing, RemoteError> {
    if let Some(err) = server_failure(&value, "Failed to list documents") {
        return Err(err);
    }
    let data: DocumentsResponse = parse(value)?;
    let documents: Vec<DocumentEntry> = data
        .documents
        .into_iter()
        .map(|d| DocumentEntry {
            modified_at: epoch_seconds(d.file_modified.as_ref()),
            filename: d.filename,
            chunk_count: d.chunks_count,
            size_bytes: d.file_size,
            file_path: d.file_path,
        })
        .collect();
    let total_chunks = data
        .total_chunks
        .unwrap_or_else(|| documents.iter().map(|d| d.chunk_count).sum());
    Ok(DocumentListing {
        documents,
        total_chunks,
    })
}

pub(crate) fn decode_upload(value: Value) -> Result<UploadOutcome, RemoteError> {
    if let Some(err) = server_failure(&value, "Upload failed") {
        return Err(err);
    }
    let data: UploadResponse = parse(value)?;
    Ok(if data.replaced {
        UploadOutcome::Replaced {
            filename: data.filename,
            old_chunks: data.old_chunks.unwrap_or(0),
            new_chunks: data.new_chunks,
        }
    } else {
        UploadOutcome::Created {
            filename: data.filename,
            new_chunks: data.new_chunks,
        }
    })
}

pub(crate) fn decode_delete(value: Value) -> Result<DeleteOutcome, RemoteError> {
    if let Some(err) = server_failure(&value, "Delete failed") {
        return Err(err);
    }
    let data: DeleteResponse = parse(value)?;
    Ok(DeleteOutcome {
        filename: data.filename,
        deleted_chunks: data.deleted_chunks,
        file_removed_from_disk: data.file_deleted_from_disk,
    })
}

pub(crate) fn decode_status(value: Value) -> Result<ServiceStatus, RemoteError> {
    if let Some(err) = server_failure(&value, "Failed to read status") {
        return Err(err);
    }
    if value.get("status").and_then(Value::as_str) == Some("error") {
        let message = value
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("Service reported an error");
        return Err(RemoteError::Server(message.to_string()));
    }
    parse(value)
}

pub(crate) fn decode_reload(value: Value) -> Result<ReloadSummary, RemoteError> {
    if let Some(err) = server_failure(&value, "Failed to load documents") {
        return Err(err);
    }
    let data: ReloadResponse = parse(value)?;
    Ok(ReloadSummary {
        message: data.message,
        documents_processed: data.documents_processed,
        replaced_files: data.replaced_files,
        new_files: data.new_files,
        processing_time: data.processing_time,
    })
}
