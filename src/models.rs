use chrono::Utc;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A retrieved passage the backend cited for an answer.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Source {
    pub filename: String,
    pub score: f32,
    #[serde(alias = "content")]
    pub excerpt: String,
}

/// One turn of the transcript. Immutable once appended.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub text: String,
    #[serde(default)]
    pub sources: Option<Vec<Source>>,
    #[serde(default)]
    pub is_error: bool,
    pub created_at: i64,
}

impl Message {
    fn new(role: Role, text: String, sources: Option<Vec<Source>>, is_error: bool) -> Self {
        Self {
            id: uuid::Uuid::now_v7().to_string(),
            role,
            text,
            sources,
            is_error,
            created_at: Utc::now().timestamp_millis(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text.into(), None, false)
    }

    pub fn assistant(text: impl Into<String>, sources: Vec<Source>) -> Self {
        Self::new(Role::Assistant, text.into(), Some(sources), false)
    }

    pub fn assistant_error(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, text.into(), None, true)
    }
}

/// Cached view of one indexed document on the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentEntry {
    pub filename: String,
    pub chunk_count: u64,
    pub size_bytes: u64,
    /// Epoch seconds, 0 when the backend did not report it.
    pub modified_at: i64,
    pub file_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentListing {
    pub documents: Vec<DocumentEntry>,
    pub total_chunks: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DocumentTotals {
    pub document_count: usize,
    pub chunk_count: u64,
}

impl DocumentTotals {
    pub fn of(documents: &[DocumentEntry]) -> Self {
        Self {
            document_count: documents.len(),
            chunk_count: documents.iter().map(|d| d.chunk_count).sum(),
        }
    }
}

/// Fixed retrieval parameters sent with every query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueryParams {
    pub result_cap: usize,
    pub similarity_threshold: f32,
}

impl Default for QueryParams {
    fn default() -> Self {
        Self {
            result_cap: 5,
            similarity_threshold: 0.7,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryAnswer {
    pub answer: String,
    pub sources: Vec<Source>,
}

/// A file queued for upload.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            bytes,
        }
    }

    pub fn read(path: &std::path::Path) -> std::io::Result<Self> {
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string();
        let bytes = std::fs::read(path)?;
        Ok(Self { filename, bytes })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Created {
        filename: String,
        new_chunks: u64,
    },
    Replaced {
        filename: String,
        old_chunks: u64,
        new_chunks: u64,
    },
}

impl UploadOutcome {
    pub fn filename(&self) -> &str {
        match self {
            UploadOutcome::Created { filename, .. } | UploadOutcome::Replaced { filename, .. } => {
                filename
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteOutcome {
    pub filename: String,
    pub deleted_chunks: u64,
    pub file_removed_from_disk: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServiceStatus {
    pub status: String,
    #[serde(default)]
    pub documents_count: u64,
    #[serde(default)]
    pub storage_size: String,
    #[serde(default)]
    pub collection_name: String,
    #[serde(default)]
    pub data_directory: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReplacedFile {
    pub filename: String,
    pub old_chunks: u64,
    pub new_chunks: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReloadSummary {
    pub message: String,
    pub documents_processed: u64,
    pub replaced_files: Vec<ReplacedFile>,
    pub new_files: Vec<String>,
    pub processing_time: f64,
}

/// Controller state used for affordance gating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Pending,
    Error,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_ids_are_ordered() {
        let first = Message::user("a");
        let second = Message::assistant("b", vec![]);
        assert!(first.id < second.id);
        assert!(first.created_at <= second.created_at);
    }

    #[test]
    fn test_message_serde_field_names() {
        let msg = Message::assistant_error("boom");
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["role"], "assistant");
        assert_eq!(value["is_error"], true);
        assert!(value["sources"].is_null());
    }

    #[test]
    fn test_source_accepts_backend_content_field() {
        let src: Source =
            serde_json::from_str(r#"{"filename":"a.txt","score":0.82,"content":"text"}"#).unwrap();
        assert_eq!(src.excerpt, "text");
    }

    #[test]
    fn test_totals_sum_chunks() {
        let docs = vec![
            DocumentEntry {
                filename: "a.txt".into(),
                chunk_count: 3,
                size_bytes: 10,
                modified_at: 0,
                file_path: None,
            },
            DocumentEntry {
                filename: "b.txt".into(),
                chunk_count: 4,
                size_bytes: 20,
                modified_at: 0,
                file_path: None,
            },
        ];
        let totals = DocumentTotals::of(&docs);
        assert_eq!(totals.document_count, 2);
        assert_eq!(totals.chunk_count, 7);
    }
}
