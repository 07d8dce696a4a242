//! Scripted collaborators for controller tests.

use crate::error::StoreError;
use crate::models::{
    DeleteOutcome, DocumentEntry, DocumentListing, QueryAnswer, QueryParams, ReloadSummary,
    ServiceStatus, UploadFile, UploadOutcome,
};
use crate::remote::{RemoteError, RemoteService};
use crate::store::{MemoryStore, PersistentStore};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::oneshot;

pub(crate) type Reply<T> = Result<T, RemoteError>;

/// A response that is either ready now or released later by the test.
pub(crate) enum Scripted<T> {
    Ready(Reply<T>),
    Deferred(oneshot::Receiver<Reply<T>>),
}

impl<T> Scripted<T> {
    pub(crate) fn deferred() -> (oneshot::Sender<Reply<T>>, Self) {
        let (tx, rx) = oneshot::channel();
        (tx, Scripted::Deferred(rx))
    }
}

async fn resolve<T>(next: Option<Scripted<T>>, default: impl FnOnce() -> Reply<T>) -> Reply<T> {
    match next {
        Some(Scripted::Ready(reply)) => reply,
        Some(Scripted::Deferred(rx)) => rx
            .await
            .unwrap_or_else(|_| Err(RemoteError::Decode("scripted sender dropped".into()))),
        None => default(),
    }
}

pub(crate) fn transport_error() -> RemoteError {
    RemoteError::Status {
        status: 503,
        message: "Service Unavailable".into(),
    }
}

pub(crate) fn doc(filename: &str, chunks: u64) -> DocumentEntry {
    DocumentEntry {
        filename: filename.to_string(),
        chunk_count: chunks,
        size_bytes: chunks * 512,
        modified_at: 1_700_000_000,
        file_path: Some(format!("data/{}", filename)),
    }
}

#[derive(Default)]
pub(crate) struct Calls {
    pub queries: Vec<(String, QueryParams)>,
    pub lists: usize,
    pub uploads: Vec<String>,
    pub deletes: Vec<String>,
    pub statuses: usize,
    pub reloads: usize,
}

/// In-memory backend. Unscripted list calls return the current `listing`;
/// unscripted uploads succeed as new documents with one chunk.
#[derive(Default)]
pub(crate) struct FakeRemote {
    queries: Mutex<VecDeque<Scripted<QueryAnswer>>>,
    uploads: Mutex<VecDeque<Scripted<UploadOutcome>>>,
    list_failures: Mutex<VecDeque<RemoteError>>,
    deletes: Mutex<VecDeque<Reply<DeleteOutcome>>>,
    statuses: Mutex<VecDeque<Reply<ServiceStatus>>>,
    reloads: Mutex<VecDeque<Reply<ReloadSummary>>>,
    listing: Mutex<Vec<DocumentEntry>>,
    pub calls: Mutex<Calls>,
}

impl FakeRemote {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push_query(&self, reply: Scripted<QueryAnswer>) {
        self.queries.lock().unwrap().push_back(reply);
    }

    pub(crate) fn push_answer(&self, answer: &str) {
        self.push_query(Scripted::Ready(Ok(QueryAnswer {
            answer: answer.to_string(),
            sources: Vec::new(),
        })));
    }

    pub(crate) fn push_upload(&self, reply: Scripted<UploadOutcome>) {
        self.uploads.lock().unwrap().push_back(reply);
    }

    pub(crate) fn fail_next_list(&self, error: RemoteError) {
        self.list_failures.lock().unwrap().push_back(error);
    }

    pub(crate) fn push_delete(&self, reply: Reply<DeleteOutcome>) {
        self.deletes.lock().unwrap().push_back(reply);
    }

    pub(crate) fn push_status(&self, reply: Reply<ServiceStatus>) {
        self.statuses.lock().unwrap().push_back(reply);
    }

    pub(crate) fn push_reload(&self, reply: Reply<ReloadSummary>) {
        self.reloads.lock().unwrap().push_back(reply);
    }

    pub(crate) fn set_listing(&self, documents: Vec<DocumentEntry>) {
        *self.listing.lock().unwrap() = documents;
    }
}

#[async_trait]
impl RemoteService for FakeRemote {
    async fn query(&self, text: &str, params: QueryParams) -> Reply<QueryAnswer> {
        self.calls
            .lock()
            .unwrap()
            .queries
            .push((text.to_string(), params));
        let next = self.queries.lock().unwrap().pop_front();
        resolve(next, || Err(RemoteError::Decode("no scripted answer".into()))).await
    }

    async fn list_documents(&self) -> Reply<DocumentListing> {
        self.calls.lock().unwrap().lists += 1;
        let failure = self.list_failures.lock().unwrap().pop_front();
        if let Some(error) = failure {
            return Err(error);
        }
        let documents = self.listing.lock().unwrap().clone();
        let total_chunks = documents.iter().map(|d| d.chunk_count).sum();
        Ok(DocumentListing {
            documents,
            total_chunks,
        })
    }

    async fn upload_document(&self, file: &UploadFile) -> Reply<UploadOutcome> {
        self.calls
            .lock()
            .unwrap()
            .uploads
            .push(file.filename.clone());
        let next = self.uploads.lock().unwrap().pop_front();
        let filename = file.filename.clone();
        resolve(next, || {
            Ok(UploadOutcome::Created {
                filename,
                new_chunks: 1,
            })
        })
        .await
    }

    async fn delete_document(&self, filename: &str) -> Reply<DeleteOutcome> {
        self.calls
            .lock()
            .unwrap()
            .deletes
            .push(filename.to_string());
        let next = self.deletes.lock().unwrap().pop_front();
        next.unwrap_or_else(|| {
            Ok(DeleteOutcome {
                filename: filename.to_string(),
                deleted_chunks: 0,
                file_removed_from_disk: false,
            })
        })
    }

    async fn status(&self) -> Reply<ServiceStatus> {
        self.calls.lock().unwrap().statuses += 1;
        let next = self.statuses.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Err(transport_error()))
    }

    async fn reload_documents(&self) -> Reply<ReloadSummary> {
        self.calls.lock().unwrap().reloads += 1;
        let next = self.reloads.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Err(transport_error()))
    }
}

/// Wraps a `MemoryStore` and counts writes.
#[derive(Default)]
pub(crate) struct CountingStore {
    pub inner: MemoryStore,
    pub saves: AtomicUsize,
}

impl CountingStore {
    pub(crate) fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

impl PersistentStore for CountingStore {
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.inner.load(key)
    }

    fn save(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        self.inner.save(key, bytes)
    }
}

/// A store whose writes always fail.
pub(crate) struct BrokenStore;

impl PersistentStore for BrokenStore {
    fn load(&self, _key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(None)
    }

    fn save(&self, _key: &str, _bytes: &[u8]) -> Result<(), StoreError> {
        Err(StoreError::Sqlite(rusqlite::Error::InvalidQuery))
    }
}
