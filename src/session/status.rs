use crate::events::{StatusEvent, Subscribers};
use crate::models::ServiceStatus;
use crate::remote::RemoteService;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionStatus {
    Connected(ServiceStatus),
    Disconnected { reason: String },
}

impl ConnectionStatus {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionStatus::Connected(_))
    }
}

/// Tracks whether the backend is reachable, via its status endpoint.
pub struct StatusMonitor {
    remote: Arc<dyn RemoteService>,
    latest: Mutex<Option<ConnectionStatus>>,
    events: Subscribers<StatusEvent>,
}

impl StatusMonitor {
    pub fn new(remote: Arc<dyn RemoteService>) -> Self {
        Self {
            remote,
            latest: Mutex::new(None),
            events: Subscribers::new(),
        }
    }

    pub fn subscribe(&self) -> UnboundedReceiver<StatusEvent> {
        self.events.subscribe()
    }

    pub fn latest(&self) -> Option<ConnectionStatus> {
        self.latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub async fn poll_once(&self) -> ConnectionStatus {
        let status = match self.remote.status().await {
            Ok(status) => ConnectionStatus::Connected(status),
            Err(e) => ConnectionStatus::Disconnected {
                reason: e.to_string(),
            },
        };

        let mut latest = self.latest.lock().unwrap_or_else(PoisonError::into_inner);
        let was_connected = latest.as_ref().map(ConnectionStatus::is_connected);
        match (&status, was_connected) {
            (ConnectionStatus::Connected(s), Some(false) | None) => {
                info!(documents = s.documents_count, storage = %s.storage_size, "backend connected")
            }
            (ConnectionStatus::Disconnected { reason }, Some(true) | None) => {
                warn!(%reason, "backend unreachable")
            }
            _ => {}
        }
        *latest = Some(status.clone());
        self.events.publish(StatusEvent::Updated(status.clone()));
        status
    }

    /// Poll every `every` until the returned handle is aborted.
    pub fn spawn(self: Arc<Self>, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                self.poll_once().await;
            }
        })
    }
}
