use crate::remote::RemoteError;

/// Client-side precondition failures. Never sent to the network.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Query is empty")]
    EmptyQuery,
    #[error("Query is {len} characters long, the limit is {max}")]
    QueryTooLong { len: usize, max: usize },
    #[error("File {filename} is not a {expected} file, skipped")]
    UnsupportedFileType { filename: String, expected: String },
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error("Another operation is still in progress")]
    Busy,
}
