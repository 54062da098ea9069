//! Wire records for the two append-only logs consumed by the metrics engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::error::Error;

/// One inbound contact message tied to an advertisement.
///
/// Attribution fields (`ad_name`, `adset_*`, `campaign_*`) are nullable
/// because they are filled in by an asynchronous lookup after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactMessage {
    pub id: i64,
    pub phone: String,
    pub contact_name: String,
    pub device: String,
    pub body: String,
    #[serde(default)]
    pub ad_name: Option<String>,
    #[serde(default)]
    pub adset_id: Option<String>,
    #[serde(default)]
    pub adset_name: Option<String>,
    #[serde(default)]
    pub campaign_id: Option<String>,
    #[serde(default)]
    pub campaign_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ContactMessage {
    /// Parse a ContactMessage from a JSONL line
    pub fn from_jsonl(line: &str) -> Result<Self, Box<dyn Error>> {
        let message: ContactMessage = serde_json::from_str(line)?;
        Ok(message)
    }

    /// True when at least one ad-attribution field is populated
    pub fn has_attribution(&self) -> bool {
        self.campaign_id.is_some() || self.adset_id.is_some() || self.ad_name.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    #[serde(rename = "message_received")]
    MessageReceived,
    #[serde(rename = "lead_status_changed")]
    LeadStatusChanged,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::MessageReceived => "message_received",
            EventKind::LeadStatusChanged => "lead_status_changed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "message_received" => Some(EventKind::MessageReceived),
            "lead_status_changed" => Some(EventKind::LeadStatusChanged),
            _ => None,
        }
    }
}

/// One observed fact about a lead at a point in time. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingEvent {
    pub id: i64,
    #[serde(default)]
    pub message_id: Option<i64>,
    pub lead_id: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub kind: EventKind,
    #[serde(default)]
    pub previous_pipeline_id: Option<String>,
    #[serde(default)]
    pub previous_pipeline_name: Option<String>,
    #[serde(default)]
    pub current_pipeline_id: Option<String>,
    #[serde(default)]
    pub current_pipeline_name: Option<String>,
    #[serde(default)]
    pub previous_status_id: Option<String>,
    #[serde(default)]
    pub previous_status_name: Option<String>,
    #[serde(default)]
    pub current_status_id: Option<String>,
    #[serde(default)]
    pub current_status_name: Option<String>,
    /// Free-form disposition marker: the configured purchase tag means
    /// converted, any other value is a discard reason, null is undecided.
    #[serde(default)]
    pub outcome_tag: Option<String>,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub responsible_agent_id: Option<String>,
    #[serde(default)]
    pub responsible_agent_name: Option<String>,
    pub event_time: DateTime<Utc>,
}

impl TrackingEvent {
    /// Parse a TrackingEvent from a JSONL line
    pub fn from_jsonl(line: &str) -> Result<Self, Box<dyn Error>> {
        let event: TrackingEvent = serde_json::from_str(line)?;
        Ok(event)
    }

    pub fn is_status_change(&self) -> bool {
        matches!(self.kind, EventKind::LeadStatusChanged)
    }

    pub fn is_message(&self) -> bool {
        matches!(self.kind, EventKind::MessageReceived)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_message_received_jsonl() {
        let line = r#"{"id":7,"message_id":12,"lead_id":"884211","phone":"5511988887777","kind":"message_received","current_pipeline_name":"Funil de vendas","current_status_name":"1° ATENDIMENTO(MANHÃ)","event_time":"2024-03-20T14:05:00Z"}"#;

        let event = TrackingEvent::from_jsonl(line).unwrap();
        assert_eq!(event.id, 7);
        assert_eq!(event.message_id, Some(12));
        assert_eq!(event.lead_id, "884211");
        assert_eq!(event.kind, EventKind::MessageReceived);
        assert_eq!(event.current_status_name.as_deref(), Some("1° ATENDIMENTO(MANHÃ)"));
        assert!(event.outcome_tag.is_none());
        assert!(event.is_message());
    }

    #[test]
    fn test_parse_status_change_jsonl() {
        let line = r#"{"id":8,"lead_id":"884211","kind":"lead_status_changed","previous_status_name":"AGENDADO","current_status_name":"LEAD CONVERTIDO","outcome_tag":"COMPROU","value":1250.5,"responsible_agent_name":"Ana Souza","event_time":"2024-03-21T09:30:00Z"}"#;

        let event = TrackingEvent::from_jsonl(line).unwrap();
        assert_eq!(event.kind, EventKind::LeadStatusChanged);
        assert_eq!(event.outcome_tag.as_deref(), Some("COMPROU"));
        assert_eq!(event.value, Some(1250.5));
        assert_eq!(event.responsible_agent_name.as_deref(), Some("Ana Souza"));
        assert!(event.message_id.is_none());
        assert!(event.is_status_change());
    }

    #[test]
    fn test_parse_contact_message_jsonl() {
        let line = r#"{"id":12,"phone":"5511988887777","contact_name":"Marcos","device":"android","body":"Quero saber mais sobre o produto","ad_name":"Promo Inverno","adset_id":"AS-9","adset_name":"Publico Frio","campaign_id":"C-3","campaign_name":"Inverno 2024","created_at":"2024-03-20T14:04:30Z"}"#;

        let message = ContactMessage::from_jsonl(line).unwrap();
        assert_eq!(message.id, 12);
        assert_eq!(message.campaign_id.as_deref(), Some("C-3"));
        assert!(message.has_attribution());
    }

    #[test]
    fn test_message_without_attribution() {
        let line = r#"{"id":13,"phone":"5511977776666","contact_name":"Paula","device":"ios","body":"Oi","created_at":"2024-03-20T15:00:00Z"}"#;

        let message = ContactMessage::from_jsonl(line).unwrap();
        assert!(!message.has_attribution());
    }

    #[test]
    fn test_malformed_jsonl() {
        let line = r#"{"lead_id": "#;
        assert!(TrackingEvent::from_jsonl(line).is_err());
        assert!(ContactMessage::from_jsonl(line).is_err());
    }

    #[test]
    fn test_event_kind_round_trip() {
        assert_eq!(EventKind::from_str("message_received"), Some(EventKind::MessageReceived));
        assert_eq!(EventKind::from_str("lead_status_changed"), Some(EventKind::LeadStatusChanged));
        assert_eq!(EventKind::from_str("lead_deleted"), None);
        assert_eq!(EventKind::LeadStatusChanged.as_str(), "lead_status_changed");
    }
}
