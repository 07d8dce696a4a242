use super::{confirm, AppContext};
use crate::display::{format_epoch_seconds, format_file_size};
use crate::events::DocumentEvent;
use crate::models::{DocumentEntry, DocumentTotals, UploadFile, UploadOutcome};
use crate::session::DocumentSync;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;

fn open_sync(ctx: &AppContext) -> (DocumentSync, JoinHandle<()>) {
    let sync = DocumentSync::new(ctx.remote.clone(), ctx.settings.sync_config());
    let mut events = sync.subscribe();
    let renderer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            render_document_event(&event);
        }
    });
    (sync, renderer)
}

async fn finish(sync: DocumentSync, renderer: JoinHandle<()>) {
    drop(sync);
    let _ = renderer.await;
}

pub async fn list_documents(ctx: &AppContext) -> anyhow::Result<()> {
    let (sync, renderer) = open_sync(ctx);
    let result = sync.refresh().await;
    let documents = sync.documents();
    finish(sync, renderer).await;
    let totals = result?;
    print_table(&documents, totals);
    Ok(())
}

pub async fn upload_documents(ctx: &AppContext, paths: Vec<PathBuf>) -> anyhow::Result<()> {
    let mut files = Vec::with_capacity(paths.len());
    for path in &paths {
        match UploadFile::read(path) {
            Ok(file) => files.push(file),
            Err(e) => eprintln!("Cannot read {}: {}", path.display(), e),
        }
    }

    let (sync, renderer) = open_sync(ctx);
    let result = sync.upload_batch(files).await;
    let documents = sync.documents();
    let totals = sync.totals();
    finish(sync, renderer).await;

    let report = result?;
    println!(
        "{} uploaded, {} skipped, {} failed.",
        report.uploaded.len(),
        report.skipped.len(),
        report.failed.len()
    );
    if report.refresh_error.is_none() {
        print_table(&documents, totals);
    }
    Ok(())
}

pub async fn delete_document(ctx: &AppContext, filename: &str, yes: bool) -> anyhow::Result<()> {
    if !yes {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let prompt = format!(
            "Delete \"{}\"? Its chunks, vectors and metadata are removed from the index, \
             and the file is removed from the server's data directory.",
            filename
        );
        if !confirm(&mut lines, &prompt).await? {
            println!("Cancelled.");
            return Ok(());
        }
    }

    let (sync, renderer) = open_sync(ctx);
    let result = sync.delete_document(filename).await;
    finish(sync, renderer).await;
    result?;
    Ok(())
}

pub async fn reload_documents(ctx: &AppContext) -> anyhow::Result<()> {
    let (sync, renderer) = open_sync(ctx);
    let result = sync.reload_corpus().await;
    let documents = sync.documents();
    let totals = sync.totals();
    finish(sync, renderer).await;
    result?;
    print_table(&documents, totals);
    Ok(())
}

pub fn render_document_event(event: &DocumentEvent) {
    match event {
        DocumentEvent::Uploaded(UploadOutcome::Created {
            filename,
            new_chunks,
        }) => println!("Uploaded {}: {} chunks", filename, new_chunks),
        DocumentEvent::Uploaded(UploadOutcome::Replaced {
            filename,
            old_chunks,
            new_chunks,
        }) => println!(
            "Uploaded {}: replaced existing file ({} -> {} chunks)",
            filename, old_chunks, new_chunks
        ),
        DocumentEvent::UploadSkipped { reason, .. } => eprintln!("{}", reason),
        DocumentEvent::UploadFailed { filename, error } => {
            eprintln!("Upload of {} failed: {}", filename, error)
        }
        DocumentEvent::Deleted(outcome) => {
            let scope = if outcome.file_removed_from_disk {
                "file removed from the data directory"
            } else {
                "index records only"
            };
            println!(
                "Deleted {}: {} chunks, {}",
                outcome.filename, outcome.deleted_chunks, scope
            );
        }
        DocumentEvent::Reloaded(summary) => {
            println!(
                "Loaded {} documents in {:.2}s",
                summary.documents_processed, summary.processing_time
            );
            for file in &summary.replaced_files {
                println!(
                    "  replaced {} ({} -> {} chunks)",
                    file.filename, file.old_chunks, file.new_chunks
                );
            }
            for file in &summary.new_files {
                println!("  new {}", file);
            }
        }
        DocumentEvent::OperationFailed { operation, error } => {
            eprintln!("{} failed: {}", operation, error)
        }
        DocumentEvent::ListReplaced { .. } | DocumentEvent::StateChanged(_) => {}
    }
}

fn print_table(documents: &[DocumentEntry], totals: DocumentTotals) {
    if documents.is_empty() {
        println!("No documents. Upload .txt files to get started.");
        return;
    }
    let width = documents
        .iter()
        .map(|d| d.filename.chars().count())
        .max()
        .unwrap_or(0)
        .max("FILE".len());
    println!("{:<width$}  {:>6}  {:>10}  MODIFIED", "FILE", "CHUNKS", "SIZE");
    for doc in documents {
        println!(
            "{:<width$}  {:>6}  {:>10}  {}",
            doc.filename,
            doc.chunk_count,
            format_file_size(doc.size_bytes),
            format_epoch_seconds(doc.modified_at)
        );
    }
    println!(
        "{} documents, {} chunks",
        totals.document_count, totals.chunk_count
    );
}
