use crate::error::{ClientError, ValidationError};
use crate::events::{DocumentEvent, Subscribers};
use crate::models::{
    DeleteOutcome, DocumentEntry, DocumentTotals, ReloadSummary, SessionState, UploadFile,
    UploadOutcome,
};
use crate::remote::RemoteService;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Suffix an upload's filename must end with (case-sensitive).
    pub accepted_extension: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            accepted_extension: ".txt".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedFile {
    pub filename: String,
    pub reason: ValidationError,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FailedUpload {
    pub filename: String,
    pub error: String,
}

/// What happened to each file of an `upload_batch` call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    pub uploaded: Vec<UploadOutcome>,
    pub skipped: Vec<SkippedFile>,
    pub failed: Vec<FailedUpload>,
    /// Set when the closing list refresh failed; the cache is then stale.
    pub refresh_error: Option<String>,
}

struct SyncInner {
    documents: Vec<DocumentEntry>,
    totals: DocumentTotals,
    busy: bool,
}

/// Local cache of the backend's document list.
///
/// Only one operation runs at a time; a second call made while one is in
/// progress fails with [`ClientError::Busy`].
pub struct DocumentSync {
    remote: Arc<dyn RemoteService>,
    config: SyncConfig,
    inner: Mutex<SyncInner>,
    events: Subscribers<DocumentEvent>,
}

/// Marks the controller busy for its lifetime.
struct Operation<'a> {
    sync: &'a DocumentSync,
    failed: bool,
}

impl Drop for Operation<'_> {
    fn drop(&mut self) {
        let mut inner = self.sync.lock();
        inner.busy = false;
        if self.failed {
            self.sync
                .events
                .publish(DocumentEvent::StateChanged(SessionState::Error));
        }
        self.sync
            .events
            .publish(DocumentEvent::StateChanged(SessionState::Idle));
    }
}

impl DocumentSync {
    pub fn new(remote: Arc<dyn RemoteService>, config: SyncConfig) -> Self {
        Self {
            remote,
            config,
            inner: Mutex::new(SyncInner {
                documents: Vec::new(),
                totals: DocumentTotals::default(),
                busy: false,
            }),
            events: Subscribers::new(),
        }
    }

    pub fn subscribe(&self) -> UnboundedReceiver<DocumentEvent> {
        self.events.subscribe()
    }

    pub fn documents(&self) -> Vec<DocumentEntry> {
        self.lock().documents.clone()
    }

    pub fn totals(&self) -> DocumentTotals {
        self.lock().totals
    }

    pub fn state(&self) -> SessionState {
        if self.lock().busy {
            SessionState::Pending
        } else {
            SessionState::Idle
        }
    }

    fn lock(&self) -> MutexGuard<'_, SyncInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn begin(&self) -> Result<Operation<'_>, ClientError> {
        let mut inner = self.lock();
        if inner.busy {
            debug!("document operation rejected, another one is in progress");
            return Err(ClientError::Busy);
        }
        inner.busy = true;
        self.events
            .publish(DocumentEvent::StateChanged(SessionState::Pending));
        Ok(Operation {
            sync: self,
            failed: false,
        })
    }

    /// Replace the cache with the backend's current list.
    ///
    /// On failure the previous cache stays in place.
    pub async fn refresh(&self) -> Result<DocumentTotals, ClientError> {
        let mut op = self.begin()?;
        let result = self.fetch_list().await;
        op.failed = result.is_err();
        result
    }

    async fn fetch_list(&self) -> Result<DocumentTotals, ClientError> {
        match self.remote.list_documents().await {
            Ok(listing) => {
                let mut inner = self.lock();
                inner.documents = listing.documents;
                inner.totals = DocumentTotals::of(&inner.documents);
                if inner.totals.chunk_count != listing.total_chunks {
                    debug!(
                        listed = inner.totals.chunk_count,
                        reported = listing.total_chunks,
                        "chunk totals disagree"
                    );
                }
                self.events.publish(DocumentEvent::ListReplaced {
                    documents: inner.documents.clone(),
                    totals: inner.totals,
                });
                Ok(inner.totals)
            }
            Err(e) => {
                warn!(error = %e, "failed to list documents");
                self.events.publish(DocumentEvent::OperationFailed {
                    operation: "refresh",
                    error: e.to_string(),
                });
                Err(e.into())
            }
        }
    }

    /// Upload `files` one after another, then refresh the list once.
    ///
    /// Files without the accepted extension are skipped, and a failed upload
    /// does not stop the rest of the batch.
    pub async fn upload_batch(&self, files: Vec<UploadFile>) -> Result<BatchReport, ClientError> {
        let mut op = self.begin()?;
        let mut report = BatchReport::default();

        for file in files {
            if !file.filename.ends_with(&self.config.accepted_extension) {
                let reason = ValidationError::UnsupportedFileType {
                    filename: file.filename.clone(),
                    expected: self.config.accepted_extension.clone(),
                };
                warn!(filename = %file.filename, "skipping upload: {}", reason);
                self.events.publish(DocumentEvent::UploadSkipped {
                    filename: file.filename.clone(),
                    reason: reason.to_string(),
                });
                report.skipped.push(SkippedFile {
                    filename: file.filename,
                    reason,
                });
                continue;
            }

            match self.remote.upload_document(&file).await {
                Ok(outcome) => {
                    info!(filename = %outcome.filename(), "uploaded document");
                    self.events.publish(DocumentEvent::Uploaded(outcome.clone()));
                    report.uploaded.push(outcome);
                }
                Err(e) => {
                    warn!(filename = %file.filename, error = %e, "upload failed");
                    self.events.publish(DocumentEvent::UploadFailed {
                        filename: file.filename.clone(),
                        error: e.to_string(),
                    });
                    report.failed.push(FailedUpload {
                        filename: file.filename,
                        error: e.to_string(),
                    });
                }
            }
        }

        if let Err(e) = self.fetch_list().await {
            report.refresh_error = Some(e.to_string());
        }
        op.failed = !report.failed.is_empty() || report.refresh_error.is_some();
        Ok(report)
    }

    /// Delete `filename` on the backend, then drop it from the cache.
    pub async fn delete_document(&self, filename: &str) -> Result<DeleteOutcome, ClientError> {
        let mut op = self.begin()?;
        match self.remote.delete_document(filename).await {
            Ok(outcome) => {
                let mut inner = self.lock();
                inner.documents.retain(|d| d.filename != filename);
                inner.totals = DocumentTotals::of(&inner.documents);
                info!(
                    filename,
                    deleted_chunks = outcome.deleted_chunks,
                    file_removed = outcome.file_removed_from_disk,
                    "deleted document"
                );
                self.events.publish(DocumentEvent::Deleted(outcome.clone()));
                self.events.publish(DocumentEvent::ListReplaced {
                    documents: inner.documents.clone(),
                    totals: inner.totals,
                });
                Ok(outcome)
            }
            Err(e) => {
                op.failed = true;
                warn!(filename, error = %e, "delete failed");
                self.events.publish(DocumentEvent::OperationFailed {
                    operation: "delete",
                    error: e.to_string(),
                });
                Err(e.into())
            }
        }
    }

    /// Have the backend re-index its data directory, then refresh the list.
    pub async fn reload_corpus(&self) -> Result<ReloadSummary, ClientError> {
        let mut op = self.begin()?;
        let summary = match self.remote.reload_documents().await {
            Ok(summary) => summary,
            Err(e) => {
                op.failed = true;
                warn!(error = %e, "reload failed");
                self.events.publish(DocumentEvent::OperationFailed {
                    operation: "reload",
                    error: e.to_string(),
                });
                return Err(e.into());
            }
        };
        info!(
            processed = summary.documents_processed,
            new = summary.new_files.len(),
            replaced = summary.replaced_files.len(),
            "reloaded corpus"
        );
        self.events.publish(DocumentEvent::Reloaded(summary.clone()));
        op.failed = self.fetch_list().await.is_err();
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::RemoteError;
    use crate::testing::{doc, transport_error, FakeRemote, Scripted};

    fn sync_with(remote: &Arc<FakeRemote>) -> DocumentSync {
        DocumentSync::new(remote.clone(), SyncConfig::default())
    }

    fn file(name: &str) -> UploadFile {
        UploadFile::new(name, b"some text".to_vec())
    }

    #[tokio::test]
    async fn test_batch_skips_bad_extension_and_refreshes_once() {
        let remote = Arc::new(FakeRemote::new());
        remote.set_listing(vec![doc("a.txt", 1), doc("b.txt", 1)]);
        let sync = sync_with(&remote);
        let mut rx = sync.subscribe();

        let report = sync
            .upload_batch(vec![file("a.txt"), file("photo.png"), file("b.txt")])
            .await
            .unwrap();

        assert_eq!(report.uploaded.len(), 2);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].filename, "photo.png");
        assert!(report.failed.is_empty());
        assert_eq!(report.refresh_error, None);

        let calls = remote.calls.lock().unwrap();
        assert_eq!(calls.uploads, vec!["a.txt".to_string(), "b.txt".to_string()]);
        assert_eq!(calls.lists, 1);
        drop(calls);

        let mut skips = 0;
        while let Ok(event) = rx.try_recv() {
            if matches!(event, DocumentEvent::UploadSkipped { .. }) {
                skips += 1;
            }
        }
        assert_eq!(skips, 1);
        assert_eq!(sync.totals().document_count, 2);
        assert_eq!(sync.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn test_extension_check_is_case_sensitive() {
        let remote = Arc::new(FakeRemote::new());
        let sync = sync_with(&remote);
        let report = sync.upload_batch(vec![file("NOTES.TXT")]).await.unwrap();
        assert_eq!(report.skipped.len(), 1);
        assert!(remote.calls.lock().unwrap().uploads.is_empty());
        assert_eq!(remote.calls.lock().unwrap().lists, 1);
    }

    #[tokio::test]
    async fn test_failed_upload_does_not_abort_batch() {
        let remote = Arc::new(FakeRemote::new());
        remote.push_upload(Scripted::Ready(Err(transport_error())));
        remote.push_upload(Scripted::Ready(Ok(UploadOutcome::Replaced {
            filename: "b.txt".into(),
            old_chunks: 3,
            new_chunks: 5,
        })));
        let sync = sync_with(&remote);

        let report = sync
            .upload_batch(vec![file("a.txt"), file("b.txt")])
            .await
            .unwrap();
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].filename, "a.txt");
        assert_eq!(
            report.uploaded,
            vec![UploadOutcome::Replaced {
                filename: "b.txt".into(),
                old_chunks: 3,
                new_chunks: 5
            }]
        );
        assert_eq!(remote.calls.lock().unwrap().lists, 1);
    }

    #[tokio::test]
    async fn test_uploads_are_sequential() {
        let remote = Arc::new(FakeRemote::new());
        let (tx, first) = Scripted::deferred();
        remote.push_upload(first);
        let sync = sync_with(&remote);

        let (report, _) = tokio::join!(
            sync.upload_batch(vec![file("a.txt"), file("b.txt")]),
            async {
                while remote.calls.lock().unwrap().uploads.is_empty() {
                    tokio::task::yield_now().await;
                }
                for _ in 0..10 {
                    tokio::task::yield_now().await;
                }
                // The second file must wait for the first to finish.
                assert_eq!(remote.calls.lock().unwrap().uploads.len(), 1);
                tx.send(Ok(UploadOutcome::Created {
                    filename: "a.txt".into(),
                    new_chunks: 2,
                }))
                .unwrap();
            }
        );
        assert_eq!(report.unwrap().uploaded.len(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_batch_is_rejected() {
        let remote = Arc::new(FakeRemote::new());
        let (tx, first) = Scripted::deferred();
        remote.push_upload(first);
        let sync = sync_with(&remote);

        let (first, _) = tokio::join!(sync.upload_batch(vec![file("a.txt")]), async {
            while sync.state() != SessionState::Pending {
                tokio::task::yield_now().await;
            }
            let second = sync.upload_batch(vec![file("b.txt")]).await;
            assert!(matches!(second, Err(ClientError::Busy)));
            let refresh = sync.refresh().await;
            assert!(matches!(refresh, Err(ClientError::Busy)));
            tx.send(Ok(UploadOutcome::Created {
                filename: "a.txt".into(),
                new_chunks: 1,
            }))
            .unwrap();
        });

        assert_eq!(first.unwrap().uploaded.len(), 1);
        assert_eq!(remote.calls.lock().unwrap().uploads, vec!["a.txt".to_string()]);
        assert_eq!(sync.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn test_refresh_twice_is_identical() {
        let remote = Arc::new(FakeRemote::new());
        remote.set_listing(vec![doc("a.txt", 3), doc("b.txt", 4)]);
        let sync = sync_with(&remote);

        sync.refresh().await.unwrap();
        let first = sync.documents();
        let totals = sync.refresh().await.unwrap();
        assert_eq!(sync.documents(), first);
        assert_eq!(totals.chunk_count, 7);
        assert_eq!(totals.document_count, 2);
    }

    #[tokio::test]
    async fn test_refresh_failure_keeps_stale_cache() {
        let remote = Arc::new(FakeRemote::new());
        remote.set_listing(vec![doc("a.txt", 3)]);
        let sync = sync_with(&remote);
        sync.refresh().await.unwrap();

        remote.fail_next_list(RemoteError::Server("db locked".into()));
        let mut rx = sync.subscribe();
        let err = sync.refresh().await.unwrap_err();
        assert!(matches!(err, ClientError::Remote(RemoteError::Server(_))));
        assert_eq!(sync.documents(), vec![doc("a.txt", 3)]);
        assert_eq!(sync.state(), SessionState::Idle);

        let events: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
        assert!(events.contains(&DocumentEvent::OperationFailed {
            operation: "refresh",
            error: "db locked".into()
        }));
        assert_eq!(
            events.last(),
            Some(&DocumentEvent::StateChanged(SessionState::Idle))
        );
    }

    #[tokio::test]
    async fn test_delete_removes_only_that_entry() {
        let remote = Arc::new(FakeRemote::new());
        remote.set_listing(vec![doc("a.txt", 1), doc("doc.txt", 2), doc("z.txt", 3)]);
        remote.push_delete(Ok(DeleteOutcome {
            filename: "doc.txt".into(),
            deleted_chunks: 2,
            file_removed_from_disk: true,
        }));
        let sync = sync_with(&remote);
        sync.refresh().await.unwrap();

        let outcome = sync.delete_document("doc.txt").await.unwrap();
        assert!(outcome.file_removed_from_disk);
        assert_eq!(sync.documents(), vec![doc("a.txt", 1), doc("z.txt", 3)]);
        assert_eq!(sync.totals().chunk_count, 4);
        // Deletion is reconciled locally, not by re-listing.
        assert_eq!(remote.calls.lock().unwrap().lists, 1);
    }

    #[tokio::test]
    async fn test_delete_failure_leaves_cache() {
        let remote = Arc::new(FakeRemote::new());
        remote.set_listing(vec![doc("doc.txt", 2)]);
        remote.push_delete(Err(transport_error()));
        let sync = sync_with(&remote);
        sync.refresh().await.unwrap();

        assert!(sync.delete_document("doc.txt").await.is_err());
        assert_eq!(sync.documents(), vec![doc("doc.txt", 2)]);
        assert_eq!(sync.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn test_delete_unknown_filename_is_forwarded() {
        let remote = Arc::new(FakeRemote::new());
        remote.set_listing(vec![doc("a.txt", 1)]);
        let sync = sync_with(&remote);
        sync.refresh().await.unwrap();

        sync.delete_document("ghost.txt").await.unwrap();
        assert_eq!(
            remote.calls.lock().unwrap().deletes,
            vec!["ghost.txt".to_string()]
        );
        assert_eq!(sync.documents(), vec![doc("a.txt", 1)]);
    }

    #[tokio::test]
    async fn test_reload_refreshes_list() {
        let remote = Arc::new(FakeRemote::new());
        remote.set_listing(vec![doc("a.txt", 5)]);
        remote.push_reload(Ok(ReloadSummary {
            message: "processed 1 file".into(),
            documents_processed: 1,
            replaced_files: vec![],
            new_files: vec!["a.txt".into()],
            processing_time: 0.2,
        }));
        let sync = sync_with(&remote);

        let summary = sync.reload_corpus().await.unwrap();
        assert_eq!(summary.documents_processed, 1);
        assert_eq!(sync.documents(), vec![doc("a.txt", 5)]);
        let calls = remote.calls.lock().unwrap();
        assert_eq!((calls.reloads, calls.lists), (1, 1));
    }

    #[tokio::test]
    async fn test_reload_failure_skips_refresh() {
        let remote = Arc::new(FakeRemote::new());
        let sync = sync_with(&remote);
        assert!(sync.reload_corpus().await.is_err());
        assert_eq!(remote.calls.lock().unwrap().lists, 0);
        assert_eq!(sync.state(), SessionState::Idle);
    }
}
