//! SQLite-backed event store
//!
//! Owns the schema for the two append-only tables and the idempotent write
//! path used by the webhook receivers: tracking events carry a natural-key
//! unique index so a redelivered webhook cannot fabricate a duplicate event
//! for the resolver to double-count.

use super::{EventStore, StoreError};
use crate::metrics_core::{ContactMessage, EventKind, TrackingEvent};
use async_trait::async_trait;
use chrono::DateTime;
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS contact_messages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    phone TEXT NOT NULL,
    contact_name TEXT NOT NULL,
    device TEXT NOT NULL,
    body TEXT NOT NULL,
    ad_name TEXT,
    adset_id TEXT,
    adset_name TEXT,
    campaign_id TEXT,
    campaign_name TEXT,
    created_at INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS tracking_events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    message_id INTEGER,
    lead_id TEXT NOT NULL,
    phone TEXT,
    kind TEXT NOT NULL,
    previous_pipeline_id TEXT,
    previous_pipeline_name TEXT,
    current_pipeline_id TEXT,
    current_pipeline_name TEXT,
    previous_status_id TEXT,
    previous_status_name TEXT,
    current_status_id TEXT,
    current_status_name TEXT,
    outcome_tag TEXT,
    value REAL,
    responsible_agent_id TEXT,
    responsible_agent_name TEXT,
    event_time INTEGER NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_tracking_events_natural_key
    ON tracking_events (
        lead_id,
        kind,
        COALESCE(current_status_id, ''),
        COALESCE(outcome_tag, ''),
        event_time
    );
";

/// Store backed by a single SQLite database file. Connections are opened
/// per operation so the store stays shareable across tasks.
pub struct SqliteEventStore {
    db_path: PathBuf,
}

impl SqliteEventStore {
    /// Open (or create) the database and ensure the schema exists.
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let store = Self {
            db_path: db_path.as_ref().to_path_buf(),
        };
        let conn = store.open()?;
        conn.execute_batch(SCHEMA)?;
        log::info!("📥 SQLite store ready at {}", store.db_path.display());
        Ok(store)
    }

    fn open(&self) -> Result<Connection, StoreError> {
        let conn = Connection::open(&self.db_path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Ok(conn)
    }

    /// Insert a contact message, returning the store-assigned id.
    pub fn insert_contact_message(&self, message: &ContactMessage) -> Result<i64, StoreError> {
        let conn = self.open()?;
        conn.execute(
            "INSERT INTO contact_messages
                (phone, contact_name, device, body, ad_name, adset_id, adset_name,
                 campaign_id, campaign_name, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                message.phone,
                message.contact_name,
                message.device,
                message.body,
                message.ad_name,
                message.adset_id,
                message.adset_name,
                message.campaign_id,
                message.campaign_name,
                message.created_at.timestamp_millis(),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Insert a tracking event. Returns false when the natural key already
    /// exists (a redelivered webhook), which leaves the log unchanged.
    pub fn insert_tracking_event(&self, event: &TrackingEvent) -> Result<bool, StoreError> {
        let conn = self.open()?;
        let changed = conn.execute(
            "INSERT OR IGNORE INTO tracking_events
                (message_id, lead_id, phone, kind,
                 previous_pipeline_id, previous_pipeline_name,
                 current_pipeline_id, current_pipeline_name,
                 previous_status_id, previous_status_name,
                 current_status_id, current_status_name,
                 outcome_tag, value, responsible_agent_id, responsible_agent_name,
                 event_time)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
            params![
                event.message_id,
                event.lead_id,
                event.phone,
                event.kind.as_str(),
                event.previous_pipeline_id,
                event.previous_pipeline_name,
                event.current_pipeline_id,
                event.current_pipeline_name,
                event.previous_status_id,
                event.previous_status_name,
                event.current_status_id,
                event.current_status_name,
                event.outcome_tag,
                event.value,
                event.responsible_agent_id,
                event.responsible_agent_name,
                event.event_time.timestamp_millis(),
            ],
        )?;
        if changed == 0 {
            log::debug!(
                "Duplicate tracking event ignored for lead {} at {}",
                event.lead_id,
                event.event_time
            );
        }
        Ok(changed == 1)
    }
}

#[async_trait]
impl EventStore for SqliteEventStore {
    async fn fetch_contact_messages(&self) -> Result<Vec<ContactMessage>, StoreError> {
        let conn = self.open()?;
        let mut stmt = conn.prepare(
            "SELECT id, phone, contact_name, device, body, ad_name, adset_id, adset_name,
                    campaign_id, campaign_name, created_at
             FROM contact_messages
             ORDER BY id ASC",
        )?;

        let rows = stmt.query_map([], |row| {
            let created_ms: i64 = row.get(10)?;
            let created_at = DateTime::from_timestamp_millis(created_ms)
                .ok_or(rusqlite::Error::IntegralValueOutOfRange(10, created_ms))?;
            Ok(ContactMessage {
                id: row.get(0)?,
                phone: row.get(1)?,
                contact_name: row.get(2)?,
                device: row.get(3)?,
                body: row.get(4)?,
                ad_name: row.get(5)?,
                adset_id: row.get(6)?,
                adset_name: row.get(7)?,
                campaign_id: row.get(8)?,
                campaign_name: row.get(9)?,
                created_at,
            })
        })?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }

    async fn fetch_tracking_events(&self) -> Result<Vec<TrackingEvent>, StoreError> {
        let conn = self.open()?;
        let mut stmt = conn.prepare(
            "SELECT id, message_id, lead_id, phone, kind,
                    previous_pipeline_id, previous_pipeline_name,
                    current_pipeline_id, current_pipeline_name,
                    previous_status_id, previous_status_name,
                    current_status_id, current_status_name,
                    outcome_tag, value, responsible_agent_id, responsible_agent_name,
                    event_time
             FROM tracking_events
             ORDER BY id ASC",
        )?;

        let rows = stmt.query_map([], |row| {
            let kind_str: String = row.get(4)?;
            let kind = match EventKind::from_str(&kind_str) {
                Some(kind) => kind,
                None => return Err(rusqlite::Error::InvalidQuery),
            };
            let event_ms: i64 = row.get(17)?;
            let event_time = DateTime::from_timestamp_millis(event_ms)
                .ok_or(rusqlite::Error::IntegralValueOutOfRange(17, event_ms))?;
            Ok(TrackingEvent {
                id: row.get(0)?,
                message_id: row.get(1)?,
                lead_id: row.get(2)?,
                phone: row.get(3)?,
                kind,
                previous_pipeline_id: row.get(5)?,
                previous_pipeline_name: row.get(6)?,
                current_pipeline_id: row.get(7)?,
                current_pipeline_name: row.get(8)?,
                previous_status_id: row.get(9)?,
                previous_status_name: row.get(10)?,
                current_status_id: row.get(11)?,
                current_status_name: row.get(12)?,
                outcome_tag: row.get(13)?,
                value: row.get(14)?,
                responsible_agent_id: row.get(15)?,
                responsible_agent_name: row.get(16)?,
                event_time,
            })
        })?;

        let mut events = Vec::new();
        for row in rows {
            events.push(row?);
        }
        Ok(events)
    }

    fn backend_type(&self) -> &'static str {
        "SQLite"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use tempfile::tempdir;

    fn create_test_message() -> ContactMessage {
        ContactMessage {
            id: 0,
            phone: "5511999990000".to_string(),
            contact_name: "Marcos".to_string(),
            device: "android".to_string(),
            body: "Quero saber mais".to_string(),
            ad_name: Some("Promo Inverno".to_string()),
            adset_id: Some("AS-1".to_string()),
            adset_name: Some("Publico Frio".to_string()),
            campaign_id: Some("C-1".to_string()),
            campaign_name: Some("Inverno 2024".to_string()),
            created_at: DateTime::from_timestamp_millis(1_000).unwrap(),
        }
    }

    fn create_test_event(lead_id: &str, time_ms: i64) -> TrackingEvent {
        TrackingEvent {
            id: 0,
            message_id: None,
            lead_id: lead_id.to_string(),
            phone: Some("5511999990000".to_string()),
            kind: EventKind::LeadStatusChanged,
            previous_pipeline_id: None,
            previous_pipeline_name: None,
            current_pipeline_id: Some("P-1".to_string()),
            current_pipeline_name: Some("Funil de vendas".to_string()),
            previous_status_id: None,
            previous_status_name: None,
            current_status_id: Some("S-6".to_string()),
            current_status_name: Some("AGENDADO".to_string()),
            outcome_tag: None,
            value: None,
            responsible_agent_id: Some("U-1".to_string()),
            responsible_agent_name: Some("Ana Souza".to_string()),
            event_time: DateTime::from_timestamp_millis(time_ms).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_round_trip() {
        let dir = tempdir().unwrap();
        let store = SqliteEventStore::new(dir.path().join("test.db")).unwrap();

        let message_id = store.insert_contact_message(&create_test_message()).unwrap();
        let mut event = create_test_event("L1", 2_000);
        event.message_id = Some(message_id);
        event.kind = EventKind::MessageReceived;
        assert!(store.insert_tracking_event(&event).unwrap());

        let messages = store.fetch_contact_messages().await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].id, message_id);
        assert_eq!(messages[0].campaign_id.as_deref(), Some("C-1"));
        assert_eq!(messages[0].created_at.timestamp_millis(), 1_000);

        let events = store.fetch_tracking_events().await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].lead_id, "L1");
        assert_eq!(events[0].message_id, Some(message_id));
        assert_eq!(events[0].kind, EventKind::MessageReceived);
        assert_eq!(events[0].event_time.timestamp_millis(), 2_000);
    }

    #[tokio::test]
    async fn test_redelivered_event_is_ignored() {
        let dir = tempdir().unwrap();
        let store = SqliteEventStore::new(dir.path().join("test.db")).unwrap();

        let event = create_test_event("L1", 2_000);
        assert!(store.insert_tracking_event(&event).unwrap());
        // Same natural key, different incidental field: still a redelivery
        let mut redelivered = event.clone();
        redelivered.responsible_agent_name = Some("Ana".to_string());
        assert!(!store.insert_tracking_event(&redelivered).unwrap());

        let events = store.fetch_tracking_events().await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].responsible_agent_name.as_deref(), Some("Ana Souza"));
    }

    #[tokio::test]
    async fn test_distinct_transitions_both_kept() {
        let dir = tempdir().unwrap();
        let store = SqliteEventStore::new(dir.path().join("test.db")).unwrap();

        let first = create_test_event("L1", 2_000);
        let mut second = create_test_event("L1", 3_000);
        second.current_status_id = Some("S-9".to_string());
        second.current_status_name = Some("LEAD CONVERTIDO".to_string());

        assert!(store.insert_tracking_event(&first).unwrap());
        assert!(store.insert_tracking_event(&second).unwrap());

        let events = store.fetch_tracking_events().await.unwrap();
        assert_eq!(events.len(), 2);
    }

    #[tokio::test]
    async fn test_empty_store_fetches_empty() {
        let dir = tempdir().unwrap();
        let store = SqliteEventStore::new(dir.path().join("test.db")).unwrap();

        assert!(store.fetch_contact_messages().await.unwrap().is_empty());
        assert!(store.fetch_tracking_events().await.unwrap().is_empty());
    }
}
