//! Per-dimension aggregation of canonical leads

use super::classifier::Outcome;
use super::ledger::{AgentLedger, AgentStats};
use super::records::ContactMessage;
use super::resolver::CanonicalLead;
use super::stage_order::StageOrdering;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};

/// The three nested advertising-attribution dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dimension {
    Campaign,
    AdSet,
    Ad,
}

impl Dimension {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dimension::Campaign => "campaign",
            Dimension::AdSet => "ad_set",
            Dimension::Ad => "ad",
        }
    }

    pub fn all() -> [Dimension; 3] {
        [Dimension::Campaign, Dimension::AdSet, Dimension::Ad]
    }

    /// Bucket key (and display name) this message contributes to, if its
    /// attribution covers the dimension. Ads carry no stable id upstream,
    /// so the ad name doubles as the key.
    fn key_of(&self, message: &ContactMessage) -> Option<(String, Option<String>)> {
        match self {
            Dimension::Campaign => message
                .campaign_id
                .clone()
                .map(|id| (id, message.campaign_name.clone())),
            Dimension::AdSet => message
                .adset_id
                .clone()
                .map(|id| (id, message.adset_name.clone())),
            Dimension::Ad => message
                .ad_name
                .clone()
                .map(|name| (name.clone(), Some(name))),
        }
    }
}

/// One rollup row for a single dimension key.
#[derive(Debug, Clone, Serialize)]
pub struct DimensionStats {
    pub key: String,
    pub name: Option<String>,
    pub total_leads: u64,
    pub converted_leads: u64,
    pub total_value: f64,
    /// Converted / total as a percentage, rounded to two decimals.
    pub conversion_rate: f64,
    pub in_progress: u64,
    pub discarded: u64,
    /// Current-stage frequencies of in-progress leads.
    pub stage_distribution: BTreeMap<String, u64>,
    pub lost_reasons: BTreeMap<String, u64>,
    /// Farthest-stage frequencies across every lead in the bucket.
    pub stage_reached_distribution: BTreeMap<String, u64>,
    /// Most advanced observed stage under the ordering policy. Not the
    /// most frequent one; those are different statistics.
    pub farthest_stage_reached: Option<String>,
    pub most_common_last_stage: Option<String>,
    pub average_conversion_time: Option<String>,
    pub average_discard_time: Option<String>,
    pub top_agents: Vec<AgentStats>,
}

pub(crate) fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Render an average duration in milliseconds as HH:MM:SS.
fn format_duration_ms(ms: i64) -> String {
    let hours = ms / 3_600_000;
    let minutes = (ms % 3_600_000) / 60_000;
    let seconds = (ms % 60_000) / 1_000;
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}

fn average_duration(times_ms: &[i64]) -> Option<String> {
    if times_ms.is_empty() {
        return None;
    }
    let total: i64 = times_ms.iter().sum();
    Some(format_duration_ms(total / times_ms.len() as i64))
}

fn most_frequent(table: &BTreeMap<String, u64>) -> Option<String> {
    table
        .iter()
        .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
        .map(|(stage, _)| stage.clone())
}

/// Roll all canonical leads up into one dimension.
///
/// A lead joins a bucket once per distinct key among its linked attributed
/// messages; the per-(key, lead) seen-set keeps duplicated messages and
/// redelivered events from double counting. Rows sort by total leads
/// descending, then key.
pub fn rollup(
    dimension: Dimension,
    leads: &[&CanonicalLead],
    messages: &[ContactMessage],
    stages: &StageOrdering,
    top_agents: usize,
) -> Vec<DimensionStats> {
    let message_index: HashMap<i64, &ContactMessage> =
        messages.iter().map(|m| (m.id, m)).collect();

    let mut buckets: BTreeMap<String, (Option<String>, Vec<&CanonicalLead>)> = BTreeMap::new();
    let mut seen: HashSet<(String, String)> = HashSet::new();

    for lead in leads {
        for message_id in &lead.message_ids {
            let Some(message) = message_index.get(message_id) else {
                continue;
            };
            let Some((key, name)) = dimension.key_of(message) else {
                continue;
            };
            if !seen.insert((key.clone(), lead.lead_id.clone())) {
                continue;
            }
            let entry = buckets.entry(key).or_insert_with(|| (None, Vec::new()));
            if entry.0.is_none() {
                entry.0 = name;
            }
            entry.1.push(*lead);
        }
    }

    let mut rows: Vec<DimensionStats> = buckets
        .into_iter()
        .map(|(key, (name, bucket))| summarize(key, name, &bucket, stages, top_agents))
        .collect();
    rows.sort_by(|a, b| {
        b.total_leads
            .cmp(&a.total_leads)
            .then_with(|| a.key.cmp(&b.key))
    });

    log::debug!(
        "Rolled up {} {} buckets from {} leads",
        rows.len(),
        dimension.as_str(),
        leads.len()
    );

    rows
}

fn summarize(
    key: String,
    name: Option<String>,
    leads: &[&CanonicalLead],
    stages: &StageOrdering,
    top_agents: usize,
) -> DimensionStats {
    let mut converted_leads = 0u64;
    let mut total_value = 0.0f64;
    let mut in_progress = 0u64;
    let mut discarded = 0u64;
    let mut stage_distribution: BTreeMap<String, u64> = BTreeMap::new();
    let mut lost_reasons: BTreeMap<String, u64> = BTreeMap::new();
    let mut stage_reached_distribution: BTreeMap<String, u64> = BTreeMap::new();
    let mut conversion_times: Vec<i64> = Vec::new();
    let mut discard_times: Vec<i64> = Vec::new();

    for lead in leads {
        if let Some(stage) = &lead.farthest_stage {
            *stage_reached_distribution.entry(stage.clone()).or_insert(0) += 1;
        }

        match &lead.outcome {
            Outcome::Converted { at, value, .. } => {
                converted_leads += 1;
                total_value += value;
                conversion_times.push(
                    at.signed_duration_since(lead.first_event_time)
                        .num_milliseconds(),
                );
            }
            Outcome::Discarded { at, reason } => {
                discarded += 1;
                *lost_reasons.entry(reason.clone()).or_insert(0) += 1;
                discard_times.push(
                    at.signed_duration_since(lead.first_event_time)
                        .num_milliseconds(),
                );
            }
            Outcome::InProgress => {
                in_progress += 1;
                if let Some(stage) = &lead.current_stage {
                    *stage_distribution.entry(stage.clone()).or_insert(0) += 1;
                }
            }
        }
    }

    let total_leads = leads.len() as u64;
    let conversion_rate = if total_leads > 0 {
        round2(converted_leads as f64 / total_leads as f64 * 100.0)
    } else {
        0.0
    };
    let farthest_stage_reached = stages
        .most_advanced(stage_reached_distribution.keys().map(String::as_str))
        .map(str::to_string);

    DimensionStats {
        key,
        name,
        total_leads,
        converted_leads,
        total_value,
        conversion_rate,
        in_progress,
        discarded,
        most_common_last_stage: most_frequent(&stage_distribution),
        stage_distribution,
        lost_reasons,
        stage_reached_distribution,
        farthest_stage_reached,
        average_conversion_time: average_duration(&conversion_times),
        average_discard_time: average_duration(&discard_times),
        top_agents: AgentLedger::from_leads(leads.iter().copied()).top(top_agents),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use std::collections::BTreeSet;

    fn create_test_lead(lead_id: &str, message_ids: Vec<i64>, outcome: Outcome) -> CanonicalLead {
        CanonicalLead {
            lead_id: lead_id.to_string(),
            message_ids,
            phone: None,
            current_stage: None,
            farthest_stage: None,
            outcome,
            attended_by: BTreeSet::new(),
            responsible_agent: None,
            first_event_time: DateTime::from_timestamp_millis(0).unwrap(),
            last_event_time: DateTime::from_timestamp_millis(0).unwrap(),
        }
    }

    fn create_test_message(id: i64, campaign: Option<&str>) -> ContactMessage {
        ContactMessage {
            id,
            phone: "5511999990000".to_string(),
            contact_name: "Teste".to_string(),
            device: "android".to_string(),
            body: "oi".to_string(),
            ad_name: Some(format!("Ad {}", id)),
            adset_id: None,
            adset_name: None,
            campaign_id: campaign.map(str::to_string),
            campaign_name: campaign.map(|c| format!("Campanha {}", c)),
            created_at: DateTime::from_timestamp_millis(0).unwrap(),
        }
    }

    fn converted(at_ms: i64, value: f64) -> Outcome {
        Outcome::Converted {
            at: DateTime::from_timestamp_millis(at_ms).unwrap(),
            value,
            agent: None,
        }
    }

    fn discarded(at_ms: i64, reason: &str) -> Outcome {
        Outcome::Discarded {
            at: DateTime::from_timestamp_millis(at_ms).unwrap(),
            reason: reason.to_string(),
        }
    }

    #[test]
    fn test_basic_campaign_rollup() {
        let messages = vec![
            create_test_message(1, Some("C1")),
            create_test_message(2, Some("C1")),
            create_test_message(3, Some("C2")),
        ];
        let l1 = create_test_lead("L1", vec![1], converted(100_000, 500.0));
        let l2 = create_test_lead("L2", vec![2], Outcome::InProgress);
        let l3 = create_test_lead("L3", vec![3], discarded(50_000, "NO_ANSWER"));
        let leads: Vec<&CanonicalLead> = vec![&l1, &l2, &l3];

        let stages = StageOrdering::default();
        let rows = rollup(Dimension::Campaign, &leads, &messages, &stages, 5);

        assert_eq!(rows.len(), 2);
        let c1 = rows.iter().find(|r| r.key == "C1").unwrap();
        assert_eq!(c1.total_leads, 2);
        assert_eq!(c1.converted_leads, 1);
        assert_eq!(c1.total_value, 500.0);
        assert_eq!(c1.conversion_rate, 50.0);
        assert_eq!(c1.in_progress, 1);
        assert_eq!(c1.name.as_deref(), Some("Campanha C1"));

        let c2 = rows.iter().find(|r| r.key == "C2").unwrap();
        assert_eq!(c2.discarded, 1);
        assert_eq!(c2.lost_reasons.get("NO_ANSWER"), Some(&1));
    }

    #[test]
    fn test_lead_counted_once_per_bucket() {
        // Two messages with the same campaign for the same lead
        let messages = vec![
            create_test_message(1, Some("C1")),
            create_test_message(2, Some("C1")),
        ];
        let l1 = create_test_lead("L1", vec![1, 2], Outcome::InProgress);
        let leads: Vec<&CanonicalLead> = vec![&l1];

        let stages = StageOrdering::default();
        let rows = rollup(Dimension::Campaign, &leads, &messages, &stages, 5);

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].total_leads, 1);
    }

    #[test]
    fn test_outcome_categories_mutually_exclusive() {
        let messages = vec![create_test_message(1, Some("C1"))];
        let l1 = create_test_lead("L1", vec![1], converted(100, 10.0));
        let leads: Vec<&CanonicalLead> = vec![&l1];

        let stages = StageOrdering::default();
        let rows = rollup(Dimension::Campaign, &leads, &messages, &stages, 5);

        let c1 = &rows[0];
        assert_eq!(c1.converted_leads, 1);
        assert_eq!(c1.in_progress, 0);
        assert_eq!(c1.discarded, 0);
        assert_eq!(
            c1.converted_leads + c1.in_progress + c1.discarded,
            c1.total_leads
        );
    }

    #[test]
    fn test_farthest_stage_is_most_advanced_not_most_frequent() {
        let messages = vec![create_test_message(1, Some("C1"))];
        let mut l1 = create_test_lead("L1", vec![1], Outcome::InProgress);
        l1.farthest_stage = Some("2° ATENDIMENTO".to_string());
        let mut l2 = create_test_lead("L2", vec![], Outcome::InProgress);
        l2.farthest_stage = Some("2° ATENDIMENTO".to_string());
        l2.message_ids = vec![1];
        let mut l3 = create_test_lead("L3", vec![], Outcome::InProgress);
        l3.farthest_stage = Some("AGENDADO".to_string());
        l3.message_ids = vec![1];
        let leads: Vec<&CanonicalLead> = vec![&l1, &l2, &l3];

        let stages = StageOrdering::default();
        let rows = rollup(Dimension::Campaign, &leads, &messages, &stages, 5);

        let c1 = &rows[0];
        assert_eq!(c1.stage_reached_distribution.get("2° ATENDIMENTO"), Some(&2));
        assert_eq!(c1.stage_reached_distribution.get("AGENDADO"), Some(&1));
        // AGENDADO appears once but is more advanced than the majority stage
        assert_eq!(c1.farthest_stage_reached.as_deref(), Some("AGENDADO"));
    }

    #[test]
    fn test_average_conversion_time_format() {
        let messages = vec![create_test_message(1, Some("C1"))];
        // first event at t=0, conversion at t=100s
        let l1 = create_test_lead("L1", vec![1], converted(100_000, 500.0));
        let leads: Vec<&CanonicalLead> = vec![&l1];

        let stages = StageOrdering::default();
        let rows = rollup(Dimension::Campaign, &leads, &messages, &stages, 5);

        assert_eq!(rows[0].average_conversion_time.as_deref(), Some("00:01:40"));
        assert!(rows[0].average_discard_time.is_none());
    }

    #[test]
    fn test_ad_dimension_keys_by_name() {
        let messages = vec![create_test_message(1, None)];
        let l1 = create_test_lead("L1", vec![1], Outcome::InProgress);
        let leads: Vec<&CanonicalLead> = vec![&l1];

        let stages = StageOrdering::default();
        let rows = rollup(Dimension::Ad, &leads, &messages, &stages, 5);

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].key, "Ad 1");
        assert_eq!(rows[0].name.as_deref(), Some("Ad 1"));
        // Message has no campaign attribution, so no campaign bucket exists
        assert!(rollup(Dimension::Campaign, &leads, &messages, &stages, 5).is_empty());
    }

    #[test]
    fn test_rows_sorted_by_total_leads() {
        let messages = vec![
            create_test_message(1, Some("C1")),
            create_test_message(2, Some("C2")),
            create_test_message(3, Some("C2")),
        ];
        let l1 = create_test_lead("L1", vec![1], Outcome::InProgress);
        let l2 = create_test_lead("L2", vec![2], Outcome::InProgress);
        let l3 = create_test_lead("L3", vec![3], Outcome::InProgress);
        let leads: Vec<&CanonicalLead> = vec![&l1, &l2, &l3];

        let stages = StageOrdering::default();
        let rows = rollup(Dimension::Campaign, &leads, &messages, &stages, 5);

        assert_eq!(rows[0].key, "C2");
        assert_eq!(rows[1].key, "C1");
    }

    #[test]
    fn test_most_common_last_stage() {
        let messages = vec![create_test_message(1, Some("C1"))];
        let mut l1 = create_test_lead("L1", vec![1], Outcome::InProgress);
        l1.current_stage = Some("AGENDADO".to_string());
        let mut l2 = create_test_lead("L2", vec![1], Outcome::InProgress);
        l2.current_stage = Some("AGENDADO".to_string());
        let mut l3 = create_test_lead("L3", vec![1], Outcome::InProgress);
        l3.current_stage = Some("LEAD QUENTE".to_string());
        let leads: Vec<&CanonicalLead> = vec![&l1, &l2, &l3];

        let stages = StageOrdering::default();
        let rows = rollup(Dimension::Campaign, &leads, &messages, &stages, 5);

        assert_eq!(rows[0].most_common_last_stage.as_deref(), Some("AGENDADO"));
    }

    #[test]
    fn test_format_duration_ms() {
        assert_eq!(format_duration_ms(0), "00:00:00");
        assert_eq!(format_duration_ms(100_000), "00:01:40");
        assert_eq!(format_duration_ms(3_600_000 + 61_000), "01:01:01");
    }
}
