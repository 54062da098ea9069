//! JSONL-file-backed event store, one serde record per line

use super::{EventStore, StoreError};
use crate::metrics_core::{ContactMessage, TrackingEvent};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Reads both collections from flat JSONL stream files. Unparsable lines
/// are logged and skipped so one bad record cannot take the whole snapshot
/// down; a missing file is still an error.
pub struct JsonlEventStore {
    messages_path: PathBuf,
    events_path: PathBuf,
}

impl JsonlEventStore {
    pub fn new(messages_path: impl AsRef<Path>, events_path: impl AsRef<Path>) -> Self {
        Self {
            messages_path: messages_path.as_ref().to_path_buf(),
            events_path: events_path.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl EventStore for JsonlEventStore {
    async fn fetch_contact_messages(&self) -> Result<Vec<ContactMessage>, StoreError> {
        let contents = std::fs::read_to_string(&self.messages_path)?;
        let mut messages = Vec::new();
        for (line_no, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match ContactMessage::from_jsonl(line) {
                Ok(message) => messages.push(message),
                Err(e) => log::warn!(
                    "⚠️ Skipping malformed contact message at {}:{}: {}",
                    self.messages_path.display(),
                    line_no + 1,
                    e
                ),
            }
        }
        Ok(messages)
    }

    async fn fetch_tracking_events(&self) -> Result<Vec<TrackingEvent>, StoreError> {
        let contents = std::fs::read_to_string(&self.events_path)?;
        let mut events = Vec::new();
        for (line_no, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match TrackingEvent::from_jsonl(line) {
                Ok(event) => events.push(event),
                Err(e) => log::warn!(
                    "⚠️ Skipping malformed tracking event at {}:{}: {}",
                    self.events_path.display(),
                    line_no + 1,
                    e
                ),
            }
        }
        Ok(events)
    }

    fn backend_type(&self) -> &'static str {
        "JSONL"
    }
}
