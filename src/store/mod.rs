//! Event store boundary: snapshot reads of the two append-only logs

pub mod jsonl;
pub mod sqlite;

use crate::metrics_core::{ContactMessage, TrackingEvent};
use async_trait::async_trait;

pub use jsonl::JsonlEventStore;
pub use sqlite::SqliteEventStore;

#[derive(Debug)]
pub enum StoreError {
    Io(std::io::Error),
    Database(rusqlite::Error),
    Serialization(serde_json::Error),
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(err)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Database(err)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err)
    }
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Io(e) => write!(f, "IO error: {}", e),
            StoreError::Database(e) => write!(f, "Database error: {}", e),
            StoreError::Serialization(e) => write!(f, "Serialization error: {}", e),
        }
    }
}

impl std::error::Error for StoreError {}

/// Point-in-time snapshot access to the raw record collections.
///
/// Each fetch must return the full collection as of the call; the engine
/// never asks for incremental reads.
#[async_trait]
pub trait EventStore: Send + Sync {
    async fn fetch_contact_messages(&self) -> Result<Vec<ContactMessage>, StoreError>;

    async fn fetch_tracking_events(&self) -> Result<Vec<TrackingEvent>, StoreError>;

    /// Backend name for logging
    fn backend_type(&self) -> &'static str;
}
