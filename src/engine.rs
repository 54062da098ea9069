//! Aggregation request orchestration
//!
//! One synchronous computation per request: fetch a point-in-time snapshot
//! from the event store (the only I/O boundary, guarded by a timeout), then
//! run the pure fold from raw records to the final report. Concurrent
//! requests never share mutable state; each works on its own snapshot.

use crate::config::EngineConfig;
use crate::metrics_core::{
    correlate, rollup, AdMetricsReport, AgentLedger, CanonicalLead, ContactMessage, Diagnostics,
    Dimension, LeadResolver, StageOrdering, TrackingEvent, UnattributedLead,
};
use crate::store::{EventStore, StoreError};
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug)]
pub enum EngineError {
    Store(StoreError),
    FetchTimeout(u64),
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        EngineError::Store(err)
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::Store(e) => write!(f, "Store fetch failed: {}", e),
            EngineError::FetchTimeout(ms) => write!(f, "Store fetch timed out after {}ms", ms),
        }
    }
}

impl std::error::Error for EngineError {}

/// Immutable point-in-time view of both record collections.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub messages: Vec<ContactMessage>,
    pub events: Vec<TrackingEvent>,
}

pub struct MetricsEngine {
    store: Box<dyn EventStore>,
    stages: StageOrdering,
    config: EngineConfig,
}

impl MetricsEngine {
    pub fn new(store: Box<dyn EventStore>, stages: StageOrdering, config: EngineConfig) -> Self {
        Self {
            store,
            stages,
            config,
        }
    }

    /// Run one full aggregation: snapshot fetch under timeout, then the
    /// pure rollup. Fails fast on any store problem; never returns a
    /// partial report.
    pub async fn compute(&self) -> Result<AdMetricsReport, EngineError> {
        let timeout = Duration::from_millis(self.config.fetch_timeout_ms);
        let fetched = tokio::time::timeout(timeout, async {
            let messages = self.store.fetch_contact_messages().await?;
            let events = self.store.fetch_tracking_events().await?;
            Ok::<_, StoreError>((messages, events))
        })
        .await
        .map_err(|_| EngineError::FetchTimeout(self.config.fetch_timeout_ms))?;
        let (messages, events) = fetched?;

        log::info!(
            "📥 Snapshot fetched from {}: {} messages, {} events",
            self.store.backend_type(),
            messages.len(),
            events.len()
        );

        let snapshot = Snapshot { messages, events };
        let report = build_report(&snapshot, &self.stages, &self.config);

        log::info!(
            "✅ Aggregated {} campaigns, {} ad sets, {} ads ({} unattributed leads, {} malformed events)",
            report.campaigns.len(),
            report.ad_sets.len(),
            report.ads.len(),
            report.diagnostics.unattributed_leads.len(),
            report.diagnostics.malformed_events
        );

        Ok(report)
    }
}

/// Pure function from a snapshot to the aggregation response.
pub fn build_report(
    snapshot: &Snapshot,
    stages: &StageOrdering,
    config: &EngineConfig,
) -> AdMetricsReport {
    let correlated = correlate(&snapshot.events, &snapshot.messages);
    let resolver = LeadResolver::new(stages, &config.purchase_tag);
    let leads: Vec<CanonicalLead> = correlated
        .groups
        .iter()
        .filter_map(|group| resolver.resolve(group))
        .collect();

    let message_index: HashMap<i64, &ContactMessage> =
        snapshot.messages.iter().map(|m| (m.id, m)).collect();
    let lead_refs: Vec<&CanonicalLead> = leads.iter().collect();

    let unattributed_leads: Vec<UnattributedLead> = leads
        .iter()
        .filter(|lead| !is_attributed(lead, &message_index))
        .map(|lead| UnattributedLead {
            lead_id: lead.lead_id.clone(),
            phone: lead.phone.clone(),
            last_stage: lead
                .current_stage
                .clone()
                .or_else(|| lead.farthest_stage.clone()),
            agent: lead.responsible_agent.clone(),
        })
        .collect();

    AdMetricsReport {
        campaigns: rollup(
            Dimension::Campaign,
            &lead_refs,
            &snapshot.messages,
            stages,
            config.top_agents_per_dimension,
        ),
        ad_sets: rollup(
            Dimension::AdSet,
            &lead_refs,
            &snapshot.messages,
            stages,
            config.top_agents_per_dimension,
        ),
        ads: rollup(
            Dimension::Ad,
            &lead_refs,
            &snapshot.messages,
            stages,
            config.top_agents_per_dimension,
        ),
        top_agents: AgentLedger::from_leads(leads.iter()).top(config.top_agents_global),
        diagnostics: Diagnostics {
            unattributed_leads,
            malformed_events: correlated.malformed_events,
        },
    }
}

fn is_attributed(lead: &CanonicalLead, message_index: &HashMap<i64, &ContactMessage>) -> bool {
    lead.message_ids
        .iter()
        .any(|id| message_index.get(id).is_some_and(|m| m.has_attribution()))
}
