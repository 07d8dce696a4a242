use super::{confirm, AppContext};
use crate::display::{format_epoch_millis, format_score, truncate_text};
use crate::events::{ChatEvent, StatusEvent};
use crate::models::{Message, Role, SessionState};
use crate::session::{ChatSession, ConnectionStatus, StatusMonitor, SubmitOutcome};
use crate::store::{MemoryStore, PersistentStore};
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

const EXCERPT_CHARS: usize = 150;

const HELP: &str = "Commands: /clear  /status  /help  /quit. Anything else is sent as a question.";

/// Interactive chat loop on stdin/stdout.
pub async fn run_chat(ctx: &AppContext, ephemeral: bool) -> anyhow::Result<()> {
    let store: Arc<dyn PersistentStore> = if ephemeral {
        Arc::new(MemoryStore::new())
    } else {
        ctx.db.clone() as Arc<dyn PersistentStore>
    };
    let session = ChatSession::new(ctx.remote.clone(), store, ctx.settings.chat_config());

    let mut chat_events = session.subscribe();
    let renderer = tokio::spawn(async move {
        while let Some(event) = chat_events.recv().await {
            render_chat_event(&event);
        }
    });

    let monitor = Arc::new(StatusMonitor::new(ctx.remote.clone()));
    let mut status_events = monitor.subscribe();
    let status_renderer = tokio::spawn(async move {
        let mut connected = None;
        while let Some(StatusEvent::Updated(status)) = status_events.recv().await {
            // Only announce transitions, the poller runs every few seconds.
            if connected != Some(status.is_connected()) {
                connected = Some(status.is_connected());
                print_connection(&status);
            }
        }
    });
    let poller = monitor.clone().spawn(ctx.settings.status_interval());

    println!("Connected to {}. {}", ctx.remote.base_url(), HELP);
    if let Some(restored) = session.restore().filter(|n| *n > 0) {
        println!("-- {} earlier messages restored --", restored);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        match line.trim() {
            "" => continue,
            "/quit" | "/exit" => break,
            "/help" => println!("{}", HELP),
            "/clear" => {
                if confirm(&mut lines, "Clear the whole conversation? This cannot be undone.").await? {
                    session.clear();
                    println!("-- conversation cleared --");
                }
            }
            "/status" => {
                let status = monitor.poll_once().await;
                print_status_details(&status);
            }
            text => match session.submit(text).await {
                Ok(SubmitOutcome::Rejected) => println!("Still waiting for the previous answer."),
                Ok(_) => {}
                Err(e) => eprintln!("{}", e),
            },
        }
    }

    poller.abort();
    let _ = poller.await;
    drop(session);
    drop(monitor);
    let _ = renderer.await;
    let _ = status_renderer.await;
    Ok(())
}

pub fn render_chat_event(event: &ChatEvent) {
    match event {
        ChatEvent::MessageAppended(message) => print_message(message),
        // Restore also starts with a clear; /clear prints its own notice.
        ChatEvent::TranscriptCleared => {}
        ChatEvent::StateChanged(SessionState::Pending) => println!("Thinking..."),
        ChatEvent::StateChanged(_) => {}
        ChatEvent::PersistFailed(e) => eprintln!("warning: chat history not saved: {}", e),
    }
}

fn print_message(message: &Message) {
    let who = match (message.role, message.is_error) {
        (Role::User, _) => "you",
        (Role::Assistant, false) => "assistant",
        (Role::Assistant, true) => "error",
    };
    println!("[{}] {}: {}", format_epoch_millis(message.created_at), who, message.text);
    if let Some(sources) = message.sources.as_ref().filter(|s| !s.is_empty()) {
        println!("  Sources:");
        for source in sources {
            println!(
                "  - {} ({})\n    {}",
                source.filename,
                format_score(source.score),
                truncate_text(&source.excerpt, EXCERPT_CHARS)
            );
        }
    }
}

fn print_connection(status: &ConnectionStatus) {
    match status {
        ConnectionStatus::Connected(s) => println!(
            "-- backend connected: {} documents, {} --",
            s.documents_count, s.storage_size
        ),
        ConnectionStatus::Disconnected { reason } => {
            println!("-- backend disconnected: {} --", reason)
        }
    }
}

pub(crate) fn print_status_details(status: &ConnectionStatus) {
    match status {
        ConnectionStatus::Connected(s) => {
            println!("Status:      {}", s.status);
            println!("Documents:   {}", s.documents_count);
            println!("Storage:     {}", s.storage_size);
            println!("Collection:  {}", s.collection_name);
            println!("Data dir:    {}", s.data_directory);
        }
        ConnectionStatus::Disconnected { reason } => println!("Disconnected: {}", reason),
    }
}
