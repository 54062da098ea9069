//! Canonical lead state resolution from one correlated group

use super::classifier::{classify, Outcome};
use super::correlator::CorrelatedGroup;
use super::stage_order::StageOrdering;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

/// Placeholder suffix left on agent names by an upstream string
/// concatenation bug ("Carlos undefined").
const AGENT_NAME_ARTIFACT: &str = "undefined";

/// The resolved view of one lead across all its events. Derived on every
/// aggregation request, never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalLead {
    pub lead_id: String,
    pub message_ids: Vec<i64>,
    pub phone: Option<String>,
    pub current_stage: Option<String>,
    /// Most advanced stage observed, monotonic under the stage policy.
    pub farthest_stage: Option<String>,
    pub outcome: Outcome,
    /// Every distinct sanitized agent name that touched the lead.
    pub attended_by: BTreeSet<String>,
    /// Last-assigned responsible agent, sanitized.
    pub responsible_agent: Option<String>,
    pub first_event_time: DateTime<Utc>,
    pub last_event_time: DateTime<Utc>,
}

/// Strip the placeholder suffix and surrounding whitespace from a raw
/// agent name. Names that collapse to nothing are treated as absent.
pub fn sanitize_agent_name(raw: &str) -> Option<String> {
    let mut name = raw.trim();
    if let Some(stripped) = name.strip_suffix(AGENT_NAME_ARTIFACT) {
        name = stripped.trim_end();
    }
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

pub struct LeadResolver<'a> {
    stages: &'a StageOrdering,
    purchase_tag: &'a str,
}

impl<'a> LeadResolver<'a> {
    pub fn new(stages: &'a StageOrdering, purchase_tag: &'a str) -> Self {
        Self {
            stages,
            purchase_tag,
        }
    }

    /// Fold one correlated group into its canonical lead state.
    ///
    /// Pure function of the input group: resolving the same events twice
    /// yields identical output, which is what lets the engine recompute
    /// canonical state wholesale on every request. Returns `None` for an
    /// empty group (the correlator never produces one).
    pub fn resolve(&self, group: &CorrelatedGroup) -> Option<CanonicalLead> {
        let first_event_time = group.events.iter().map(|e| e.event_time).min()?;
        let last_event_time = group.events.iter().map(|e| e.event_time).max()?;

        let current_stage = group
            .events
            .iter()
            .filter(|e| e.is_status_change() && e.current_status_name.is_some())
            .max_by_key(|e| (e.event_time, e.id))
            .and_then(|e| e.current_status_name.clone());

        let mut farthest_stage = current_stage.clone();
        for stage in group
            .events
            .iter()
            .filter_map(|e| e.current_status_name.as_deref())
        {
            farthest_stage = match farthest_stage {
                None => Some(stage.to_string()),
                Some(incumbent) => {
                    if self.stages.is_more_advanced(stage, &incumbent) {
                        Some(stage.to_string())
                    } else {
                        Some(incumbent)
                    }
                }
            };
        }

        let responsible_agent = group
            .events
            .iter()
            .filter(|e| e.is_status_change() && e.responsible_agent_name.is_some())
            .max_by_key(|e| (e.event_time, e.id))
            .and_then(|e| sanitize_agent_name(e.responsible_agent_name.as_deref()?));

        let attended_by: BTreeSet<String> = group
            .events
            .iter()
            .filter_map(|e| sanitize_agent_name(e.responsible_agent_name.as_deref()?))
            .collect();

        let phone = group
            .events
            .iter()
            .find_map(|e| e.phone.clone())
            .or_else(|| group.messages.first().map(|m| m.phone.clone()));

        let outcome = classify(&group.events, self.purchase_tag);

        Some(CanonicalLead {
            lead_id: group.lead_id.clone(),
            message_ids: group.message_ids.clone(),
            phone,
            current_stage,
            farthest_stage,
            outcome,
            attended_by,
            responsible_agent,
            first_event_time,
            last_event_time,
        })
    }
}
