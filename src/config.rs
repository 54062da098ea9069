//! Engine configuration from environment variables

use std::env;

/// Tuning knobs for the aggregation engine.
///
/// Loaded from environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Outcome tag value that marks a lead as purchased
    pub purchase_tag: String,

    /// Row cap for the global agent leaderboard
    pub top_agents_global: usize,

    /// Row cap for per-dimension agent leaderboards
    pub top_agents_per_dimension: usize,

    /// Timeout around the store snapshot fetch in milliseconds
    pub fetch_timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            purchase_tag: "COMPROU".to_string(),
            top_agents_global: 10,
            top_agents_per_dimension: 5,
            fetch_timeout_ms: 10_000,
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `PURCHASE_TAG` (default: COMPROU)
    /// - `TOP_AGENTS_GLOBAL` (default: 10)
    /// - `TOP_AGENTS_PER_DIMENSION` (default: 5)
    /// - `STORE_FETCH_TIMEOUT_MS` (default: 10000)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            purchase_tag: env::var("PURCHASE_TAG").unwrap_or(defaults.purchase_tag),

            top_agents_global: env::var("TOP_AGENTS_GLOBAL")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.top_agents_global),

            top_agents_per_dimension: env::var("TOP_AGENTS_PER_DIMENSION")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.top_agents_per_dimension),

            fetch_timeout_ms: env::var("STORE_FETCH_TIMEOUT_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.fetch_timeout_ms),
        }
    }
}
