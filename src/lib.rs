//! LeadFlow - ad attribution metrics over CRM lead tracking logs
//!
//! Correlates inbound contact messages with CRM pipeline-transition events,
//! resolves one canonical state per lead, and rolls the results up per
//! campaign, ad set, ad, and agent.

pub mod config;
pub mod engine;
pub mod metrics_core;
pub mod store;
