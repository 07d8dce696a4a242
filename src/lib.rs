pub mod commands;
pub mod db;
pub mod display;
pub mod error;
pub mod events;
pub mod models;
pub mod remote;
pub mod session;
pub mod settings;
pub mod store;

#[cfg(test)]
mod testing;

pub use error::{ClientError, StoreError, ValidationError};
pub use remote::{HttpRemote, RemoteConfig, RemoteError, RemoteService};
pub use session::{ChatSession, DocumentSync, StatusMonitor};
pub use store::{MemoryStore, PersistentStore};
