//! Identity correlation across tracking events and contact messages

use super::records::{ContactMessage, TrackingEvent};
use std::collections::{BTreeMap, HashMap};

/// All events for one lead identifier plus the contact messages they
/// reference. Events are sorted by `(event_time, id)`.
#[derive(Debug, Clone)]
pub struct CorrelatedGroup {
    pub lead_id: String,
    pub events: Vec<TrackingEvent>,
    /// Message ids referenced by the group's `message_received` events,
    /// deduplicated. Ids with no stored message are kept so the resolver
    /// can still report them.
    pub message_ids: Vec<i64>,
    /// Messages resolved from `message_ids`, in id order.
    pub messages: Vec<ContactMessage>,
}

#[derive(Debug, Clone, Default)]
pub struct Correlated {
    pub groups: Vec<CorrelatedGroup>,
    /// Events excluded because their lead identifier was missing.
    pub malformed_events: u64,
}

/// Partition tracking events into per-lead groups and join each group to
/// the contact messages it references.
///
/// The lead identifier is the only reliable correlation key: every event
/// with a non-empty lead id lands in exactly one group, and the result is
/// independent of the input collections' iteration order.
pub fn correlate(events: &[TrackingEvent], messages: &[ContactMessage]) -> Correlated {
    let message_index: HashMap<i64, &ContactMessage> =
        messages.iter().map(|m| (m.id, m)).collect();

    let mut by_lead: BTreeMap<String, Vec<TrackingEvent>> = BTreeMap::new();
    let mut malformed_events = 0u64;

    for event in events {
        if event.lead_id.trim().is_empty() {
            malformed_events += 1;
            log::debug!("Skipping event id={} with empty lead identifier", event.id);
            continue;
        }
        by_lead
            .entry(event.lead_id.clone())
            .or_default()
            .push(event.clone());
    }

    let groups = by_lead
        .into_iter()
        .map(|(lead_id, mut group_events)| {
            group_events.sort_by_key(|e| (e.event_time, e.id));

            let mut message_ids: Vec<i64> = group_events
                .iter()
                .filter(|e| e.is_message())
                .filter_map(|e| e.message_id)
                .collect();
            message_ids.sort_unstable();
            message_ids.dedup();

            let linked: Vec<ContactMessage> = message_ids
                .iter()
                .filter_map(|id| message_index.get(id).map(|m| (*m).clone()))
                .collect();

            CorrelatedGroup {
                lead_id,
                events: group_events,
                message_ids,
                messages: linked,
            }
        })
        .collect();

    Correlated {
        groups,
        malformed_events,
    }
}
