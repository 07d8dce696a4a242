pub mod http;

use async_trait::async_trait;

use crate::models::{
    DeleteOutcome, DocumentListing, QueryAnswer, QueryParams, ReloadSummary, ServiceStatus,
    UploadFile, UploadOutcome,
};

pub use http::{HttpRemote, RemoteConfig};

/// The REST backend, as seen by the session controllers.
#[async_trait]
pub trait RemoteService: Send + Sync {
    async fn query(&self, text: &str, params: QueryParams) -> Result<QueryAnswer, RemoteError>;

    async fn list_documents(&self) -> Result<DocumentListing, RemoteError>;

    async fn upload_document(&self, file: &UploadFile) -> Result<UploadOutcome, RemoteError>;

    async fn delete_document(&self, filename: &str) -> Result<DeleteOutcome, RemoteError>;

    async fn status(&self) -> Result<ServiceStatus, RemoteError>;

    /// Ask the backend to rescan its data directory and re-index every file.
    async fn reload_documents(&self) -> Result<ReloadSummary, RemoteError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// No structured answer from the server.
    Transport,
    /// The server answered with an explicit error flag.
    Server,
}

#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },
    #[error("Unexpected response: {0}")]
    Decode(String),
    #[error("Invalid server URL: {0}")]
    InvalidUrl(String),
    #[error("{0}")]
    Server(String),
}

impl RemoteError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RemoteError::Server(_) => ErrorKind::Server,
            RemoteError::Http(_)
            | RemoteError::Status { .. }
            | RemoteError::Decode(_)
            | RemoteError::InvalidUrl(_) => ErrorKind::Transport,
        }
    }
}
