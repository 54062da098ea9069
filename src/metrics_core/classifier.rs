//! Outcome classification over a lead's full event history

use super::records::TrackingEvent;
use super::resolver::sanitize_agent_name;
use chrono::{DateTime, Utc};
use std::cmp::Ordering;

/// Resolved disposition of one lead.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Converted {
        at: DateTime<Utc>,
        value: f64,
        /// Sanitized agent of the qualifying conversion record, for the
        /// attribution ledger.
        agent: Option<String>,
    },
    Discarded {
        at: DateTime<Utc>,
        reason: String,
    },
    InProgress,
}

impl Outcome {
    pub fn is_converted(&self) -> bool {
        matches!(self, Outcome::Converted { .. })
    }

    pub fn is_discarded(&self) -> bool {
        matches!(self, Outcome::Discarded { .. })
    }

    pub fn is_in_progress(&self) -> bool {
        matches!(self, Outcome::InProgress)
    }

    pub fn outcome_time(&self) -> Option<DateTime<Utc>> {
        match self {
            Outcome::Converted { at, .. } | Outcome::Discarded { at, .. } => Some(*at),
            Outcome::InProgress => None,
        }
    }
}

/// Classify a lead from the existence of outcome tags on its events.
///
/// The qualifying conversion record is the purchase-tagged event with the
/// highest value (null value counts as 0), ties broken by latest timestamp.
/// The qualifying discard record is the latest event carrying any other
/// non-null tag. When both exist, conversion wins only if its record is not
/// strictly earlier than the discard's; otherwise the later record wins.
/// This temporal precedence mirrors re-opened/re-closed leads in the CRM
/// and is intentional.
pub fn classify(events: &[TrackingEvent], purchase_tag: &str) -> Outcome {
    let conversion = events
        .iter()
        .filter(|e| e.outcome_tag.as_deref() == Some(purchase_tag))
        .max_by(|a, b| {
            a.value
                .unwrap_or(0.0)
                .partial_cmp(&b.value.unwrap_or(0.0))
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.event_time.cmp(&b.event_time))
        });

    let discard = events
        .iter()
        .filter(|e| matches!(e.outcome_tag.as_deref(), Some(tag) if tag != purchase_tag))
        .max_by_key(|e| (e.event_time, e.id));

    match (conversion, discard) {
        (Some(conv), Some(disc)) if conv.event_time < disc.event_time => discarded_from(disc),
        (Some(conv), _) => converted_from(conv),
        (None, Some(disc)) => discarded_from(disc),
        (None, None) => Outcome::InProgress,
    }
}

fn converted_from(event: &TrackingEvent) -> Outcome {
    Outcome::Converted {
        at: event.event_time,
        value: event.value.unwrap_or(0.0),
        agent: event
            .responsible_agent_name
            .as_deref()
            .and_then(sanitize_agent_name),
    }
}

fn discarded_from(event: &TrackingEvent) -> Outcome {
    Outcome::Discarded {
        at: event.event_time,
        reason: event
            .outcome_tag
            .clone()
            .unwrap_or_default(),
    }
}
