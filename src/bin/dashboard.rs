//! Dashboard Binary - Ad Metrics Aggregation
//!
//! Runs one full aggregation over the event store and prints the JSON
//! report to stdout.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --release --bin dashboard -- --backend sqlite
//! ```
//!
//! ## Environment Variables
//!
//! - LEADFLOW_DB_PATH - SQLite database path (default: data/leadflow.db) - used when --backend sqlite
//! - MESSAGES_STREAM_PATH - Contact message JSONL path (default: streams/messages.jsonl)
//! - EVENTS_STREAM_PATH - Tracking event JSONL path (default: streams/events.jsonl)
//! - PURCHASE_TAG - Outcome tag that marks a purchase (default: COMPROU)
//! - TOP_AGENTS_GLOBAL - Global leaderboard size (default: 10)
//! - TOP_AGENTS_PER_DIMENSION - Per-dimension leaderboard size (default: 5)
//! - STORE_FETCH_TIMEOUT_MS - Snapshot fetch timeout (default: 10000)
//! - RUST_LOG - Logging level (optional, default: info)

use leadflow::config::EngineConfig;
use leadflow::engine::MetricsEngine;
use leadflow::metrics_core::StageOrdering;
use leadflow::store::{EventStore, JsonlEventStore, SqliteEventStore};
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BackendType {
    Sqlite,
    Jsonl,
}

fn parse_backend_from_args() -> BackendType {
    let args: Vec<String> = env::args().collect();
    if let Some(idx) = args.iter().position(|x| x == "--backend") {
        match args.get(idx + 1).map(|s| s.as_str()) {
            Some("sqlite") => return BackendType::Sqlite,
            Some("jsonl") => return BackendType::Jsonl,
            _ => {}
        }
    }
    BackendType::Sqlite
}

#[derive(Debug)]
struct DashboardConfig {
    backend: BackendType,
    db_path: PathBuf,
    messages_path: PathBuf,
    events_path: PathBuf,
}

impl DashboardConfig {
    fn from_env() -> Self {
        Self {
            backend: parse_backend_from_args(),
            db_path: env::var("LEADFLOW_DB_PATH")
                .unwrap_or_else(|_| "data/leadflow.db".to_string())
                .into(),
            messages_path: env::var("MESSAGES_STREAM_PATH")
                .unwrap_or_else(|_| "streams/messages.jsonl".to_string())
                .into(),
            events_path: env::var("EVENTS_STREAM_PATH")
                .unwrap_or_else(|_| "streams/events.jsonl".to_string())
                .into(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    dotenv::dotenv().ok();

    let config = DashboardConfig::from_env();
    let engine_config = EngineConfig::from_env();

    log::info!("🚀 Starting LeadFlow Dashboard Aggregation");
    log::info!("   Purchase tag: {}", engine_config.purchase_tag);
    log::info!("   Fetch timeout: {}ms", engine_config.fetch_timeout_ms);

    let store: Box<dyn EventStore> = match config.backend {
        BackendType::Sqlite => {
            log::info!("   Database: {}", config.db_path.display());
            Box::new(SqliteEventStore::new(&config.db_path)?)
        }
        BackendType::Jsonl => {
            log::info!("   Messages stream: {}", config.messages_path.display());
            log::info!("   Events stream: {}", config.events_path.display());
            Box::new(JsonlEventStore::new(
                &config.messages_path,
                &config.events_path,
            ))
        }
    };
    log::info!("📊 Backend: {}", store.backend_type());

    let engine = MetricsEngine::new(store, StageOrdering::default(), engine_config);
    let report = engine.compute().await?;

    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
