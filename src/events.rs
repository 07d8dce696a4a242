//! Change notifications published by the controllers to whatever renders them.

use crate::models::{
    DeleteOutcome, DocumentEntry, DocumentTotals, Message, ReloadSummary, SessionState,
    UploadOutcome,
};
use crate::session::status::ConnectionStatus;
use std::sync::{Mutex, PoisonError};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    MessageAppended(Message),
    TranscriptCleared,
    StateChanged(SessionState),
    PersistFailed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum DocumentEvent {
    ListReplaced {
        documents: Vec<DocumentEntry>,
        totals: DocumentTotals,
    },
    Uploaded(UploadOutcome),
    UploadSkipped {
        filename: String,
        reason: String,
    },
    UploadFailed {
        filename: String,
        error: String,
    },
    Deleted(DeleteOutcome),
    Reloaded(ReloadSummary),
    OperationFailed {
        operation: &'static str,
        error: String,
    },
    StateChanged(SessionState),
}

#[derive(Debug, Clone, PartialEq)]
pub enum StatusEvent {
    Updated(ConnectionStatus),
}

/// Fan-out list of unbounded receivers. Dropped receivers are pruned on publish.
pub(crate) struct Subscribers<E> {
    senders: Mutex<Vec<UnboundedSender<E>>>,
}

impl<E: Clone> Subscribers<E> {
    pub(crate) fn new() -> Self {
        Self {
            senders: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn subscribe(&self) -> UnboundedReceiver<E> {
        let (tx, rx) = unbounded_channel();
        self.senders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    pub(crate) fn publish(&self, event: E) {
        let mut senders = self.senders.lock().unwrap_or_else(PoisonError::into_inner);
        senders.retain(|tx| tx.send(event.clone()).is_ok());
    }
}
