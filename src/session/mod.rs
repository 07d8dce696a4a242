pub mod chat;
pub mod documents;
pub mod status;

pub use chat::{ChatConfig, ChatSession, SubmitOutcome, HISTORY_KEY};
pub use documents::{BatchReport, DocumentSync, FailedUpload, SkippedFile, SyncConfig};
pub use status::{ConnectionStatus, StatusMonitor};
