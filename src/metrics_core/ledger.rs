//! Per-agent attribution credit with explicit deduplication

use super::classifier::Outcome;
use super::resolver::CanonicalLead;
use super::rollup::round2;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

/// Sentinel bucket for leads no agent ever touched, so attendance is
/// conserved across the scope.
pub const UNASSIGNED_AGENT: &str = "unassigned";

/// One ranked leaderboard row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentStats {
    pub name: String,
    /// Distinct leads the agent touched, not event count.
    pub attended: u64,
    pub converted: u64,
    pub total_value: f64,
    pub conversion_rate: f64,
    pub average_ticket: f64,
}

/// Composite dedup key for agent credit. Defined once and reused for both
/// attendance and conversion accounting.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CreditKey {
    agent: String,
    lead: String,
}

impl CreditKey {
    fn new(agent: &str, lead: &str) -> Self {
        Self {
            agent: agent.to_string(),
            lead: lead.to_string(),
        }
    }
}

#[derive(Debug, Default)]
struct AgentAccumulator {
    attended: u64,
    converted: u64,
    total_value: f64,
}

/// Accumulates agent credit over a scope of canonical leads.
#[derive(Debug, Default)]
pub struct AgentLedger {
    agents: BTreeMap<String, AgentAccumulator>,
    attended_keys: HashSet<CreditKey>,
    conversion_keys: HashSet<CreditKey>,
}

impl AgentLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_leads<'a, I>(leads: I) -> Self
    where
        I: IntoIterator<Item = &'a CanonicalLead>,
    {
        let mut ledger = Self::new();
        for lead in leads {
            ledger.credit(lead);
        }
        ledger
    }

    /// Credit one canonical lead: attendance for every agent that touched
    /// it (or the unassigned bucket), conversion only for the qualifying
    /// record's agent. Both credits are at most once per agent+lead, so
    /// re-crediting the same lead changes nothing.
    pub fn credit(&mut self, lead: &CanonicalLead) {
        if lead.attended_by.is_empty() {
            if self
                .attended_keys
                .insert(CreditKey::new(UNASSIGNED_AGENT, &lead.lead_id))
            {
                self.agents
                    .entry(UNASSIGNED_AGENT.to_string())
                    .or_default()
                    .attended += 1;
            }
        } else {
            for agent in &lead.attended_by {
                if self
                    .attended_keys
                    .insert(CreditKey::new(agent, &lead.lead_id))
                {
                    self.agents.entry(agent.clone()).or_default().attended += 1;
                }
            }
        }

        if let Outcome::Converted {
            value,
            agent: Some(agent),
            ..
        } = &lead.outcome
        {
            if self
                .conversion_keys
                .insert(CreditKey::new(agent, &lead.lead_id))
            {
                let accumulator = self.agents.entry(agent.clone()).or_default();
                accumulator.converted += 1;
                accumulator.total_value += value;
            }
        }
    }

    /// Total attendance credit across all agents including the sentinel.
    pub fn total_attended(&self) -> u64 {
        self.agents.values().map(|a| a.attended).sum()
    }

    /// Ranked leaderboard: converted desc, attended desc, name asc,
    /// truncated to `n` rows.
    pub fn top(&self, n: usize) -> Vec<AgentStats> {
        let mut rows: Vec<AgentStats> = self
            .agents
            .iter()
            .map(|(name, acc)| {
                let conversion_rate = if acc.attended > 0 {
                    round2(acc.converted as f64 / acc.attended as f64 * 100.0)
                } else {
                    0.0
                };
                let average_ticket = if acc.converted > 0 {
                    round2(acc.total_value / acc.converted as f64)
                } else {
                    0.0
                };
                AgentStats {
                    name: name.clone(),
                    attended: acc.attended,
                    converted: acc.converted,
                    total_value: acc.total_value,
                    conversion_rate,
                    average_ticket,
                }
            })
            .collect();
        rows.sort_by(|a, b| {
            b.converted
                .cmp(&a.converted)
                .then_with(|| b.attended.cmp(&a.attended))
                .then_with(|| a.name.cmp(&b.name))
        });
        rows.truncate(n);
        rows
    }
}
