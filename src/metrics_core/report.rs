//! Aggregation response structures consumed by the presentation layer

use super::ledger::AgentStats;
use super::rollup::DimensionStats;
use serde::Serialize;

/// A canonical lead that could not be joined to any attributed contact
/// message. Surfaced so operators can audit data-quality gaps instead of
/// having leads silently vanish from the metrics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnattributedLead {
    pub lead_id: String,
    pub phone: Option<String>,
    pub last_stage: Option<String>,
    pub agent: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Diagnostics {
    pub unattributed_leads: Vec<UnattributedLead>,
    /// Events excluded from correlation for lacking a lead identifier.
    pub malformed_events: u64,
}

/// The full aggregation response: one rollup array per attribution
/// dimension, the global agent leaderboard, and the diagnostics bucket.
#[derive(Debug, Clone, Serialize)]
pub struct AdMetricsReport {
    pub campaigns: Vec<DimensionStats>,
    pub ad_sets: Vec<DimensionStats>,
    pub ads: Vec<DimensionStats>,
    pub top_agents: Vec<AgentStats>,
    pub diagnostics: Diagnostics,
}
