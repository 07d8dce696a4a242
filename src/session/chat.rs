use crate::error::{ClientError, StoreError, ValidationError};
use crate::events::{ChatEvent, Subscribers};
use crate::models::{Message, QueryParams, SessionState};
use crate::remote::RemoteService;
use crate::store::PersistentStore;
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info, warn};

/// Store key holding the serialized transcript.
pub const HISTORY_KEY: &str = "chat_history";

#[derive(Debug, Clone)]
pub struct ChatConfig {
    pub params: QueryParams,
    pub max_query_chars: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            params: QueryParams::default(),
            max_query_chars: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// The backend answered; the assistant turn was appended.
    Answered(Message),
    /// The query failed; an error turn was appended.
    Failed(Message),
    /// Another query was already pending. Nothing changed.
    Rejected,
    /// The transcript was cleared while the query was in flight.
    Discarded,
}

struct ChatInner {
    transcript: Vec<Message>,
    /// Ticket of the query currently awaiting its answer.
    inflight: Option<u64>,
    next_ticket: u64,
}

/// Owns the transcript and allows at most one query in flight.
pub struct ChatSession {
    remote: Arc<dyn RemoteService>,
    store: Arc<dyn PersistentStore>,
    config: ChatConfig,
    inner: Mutex<ChatInner>,
    events: Subscribers<ChatEvent>,
}

/// Returns the session to Idle if a submit future is dropped mid-flight.
struct InFlight<'a> {
    session: &'a ChatSession,
    ticket: u64,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut inner = self.session.lock();
        if inner.inflight == Some(self.ticket) {
            warn!(ticket = self.ticket, "query abandoned before it completed");
            inner.inflight = None;
            self.session
                .events
                .publish(ChatEvent::StateChanged(SessionState::Idle));
        }
    }
}

impl ChatSession {
    pub fn new(
        remote: Arc<dyn RemoteService>,
        store: Arc<dyn PersistentStore>,
        config: ChatConfig,
    ) -> Self {
        Self {
            remote,
            store,
            config,
            inner: Mutex::new(ChatInner {
                transcript: Vec::new(),
                inflight: None,
                next_ticket: 0,
            }),
            events: Subscribers::new(),
        }
    }

    pub fn subscribe(&self) -> UnboundedReceiver<ChatEvent> {
        self.events.subscribe()
    }

    pub fn state(&self) -> SessionState {
        if self.lock().inflight.is_some() {
            SessionState::Pending
        } else {
            SessionState::Idle
        }
    }

    pub fn transcript(&self) -> Vec<Message> {
        self.lock().transcript.clone()
    }

    fn lock(&self) -> MutexGuard<'_, ChatInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Load the persisted transcript and replay it to subscribers.
    ///
    /// Subscribers first get `TranscriptCleared`, so calling this again
    /// re-renders the same transcript once. Missing or unreadable history
    /// yields an empty transcript. Nothing is written back. Returns `None`
    /// without touching anything while a query is pending.
    pub fn restore(&self) -> Option<usize> {
        let messages = self.load_history();
        let mut inner = self.lock();
        if inner.inflight.is_some() {
            debug!("restore rejected, a query is pending");
            return None;
        }
        inner.transcript = messages;
        self.events.publish(ChatEvent::TranscriptCleared);
        for message in &inner.transcript {
            self.events.publish(ChatEvent::MessageAppended(message.clone()));
        }
        info!(messages = inner.transcript.len(), "restored chat history");
        Some(inner.transcript.len())
    }

    /// Send `text` to the backend and append both turns to the transcript.
    pub async fn submit(&self, text: &str) -> Result<SubmitOutcome, ClientError> {
        let query = text.trim();
        if query.is_empty() {
            return Err(ValidationError::EmptyQuery.into());
        }
        let len = query.chars().count();
        if len > self.config.max_query_chars {
            return Err(ValidationError::QueryTooLong {
                len,
                max: self.config.max_query_chars,
            }
            .into());
        }

        let ticket = {
            let mut inner = self.lock();
            if inner.inflight.is_some() {
                debug!("submit rejected, a query is already pending");
                return Ok(SubmitOutcome::Rejected);
            }
            let ticket = inner.next_ticket;
            inner.next_ticket += 1;
            inner.inflight = Some(ticket);

            let message = Message::user(query);
            inner.transcript.push(message.clone());
            self.persist(&inner.transcript);
            self.events.publish(ChatEvent::MessageAppended(message));
            self.events
                .publish(ChatEvent::StateChanged(SessionState::Pending));
            ticket
        };
        let _guard = InFlight {
            session: self,
            ticket,
        };

        let result = self.remote.query(query, self.config.params).await;

        let mut inner = self.lock();
        if inner.inflight != Some(ticket) {
            info!(ticket, "transcript was cleared, discarding late answer");
            return Ok(SubmitOutcome::Discarded);
        }
        inner.inflight = None;

        let (message, failed) = match result {
            Ok(answer) => {
                debug!(sources = answer.sources.len(), "query answered");
                (Message::assistant(answer.answer, answer.sources), false)
            }
            Err(e) => {
                warn!(error = %e, kind = ?e.kind(), "query failed");
                let text = format!("Sorry, something went wrong: {}", e);
                (Message::assistant_error(text), true)
            }
        };
        inner.transcript.push(message.clone());
        self.persist(&inner.transcript);
        self.events.publish(ChatEvent::MessageAppended(message.clone()));
        if failed {
            self.events
                .publish(ChatEvent::StateChanged(SessionState::Error));
        }
        self.events
            .publish(ChatEvent::StateChanged(SessionState::Idle));
        Ok(if failed {
            SubmitOutcome::Failed(message)
        } else {
            SubmitOutcome::Answered(message)
        })
    }

    /// Empty the transcript. A query still in flight will have its answer dropped.
    pub fn clear(&self) {
        let mut inner = self.lock();
        let was_pending = inner.inflight.take().is_some();
        inner.transcript.clear();
        self.persist(&inner.transcript);
        self.events.publish(ChatEvent::TranscriptCleared);
        if was_pending {
            self.events
                .publish(ChatEvent::StateChanged(SessionState::Idle));
        }
        info!(was_pending, "chat history cleared");
    }

    fn persist(&self, transcript: &[Message]) {
        let result = serde_json::to_vec(transcript)
            .map_err(StoreError::from)
            .and_then(|bytes| self.store.save(HISTORY_KEY, &bytes));
        if let Err(e) = result {
            warn!(error = %e, "failed to save chat history");
            self.events.publish(ChatEvent::PersistFailed(e.to_string()));
        }
    }

    fn load_history(&self) -> Vec<Message> {
        let bytes = match self.store.load(HISTORY_KEY) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return Vec::new(),
            Err(e) => {
                warn!(error = %e, "failed to read chat history");
                return Vec::new();
            }
        };
        let entries: Vec<Value> = match serde_json::from_slice(&bytes) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "stored chat history is corrupt, starting empty");
                return Vec::new();
            }
        };
        entries
            .into_iter()
            .filter_map(|entry| match serde_json::from_value::<Message>(entry) {
                Ok(message) => Some(message),
                Err(e) => {
                    debug!(error = %e, "skipping unreadable history entry");
                    None
                }
            })
            .collect()
    }
}
