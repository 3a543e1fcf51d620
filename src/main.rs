//! Geoenrich - footfall and socio-economic enrichment for media locations
//!
//! Reads a batch of raw advertising-location coordinates, resolves each one
//! through the tiered pipeline (exact, radius, fuzzy, remote, estimated),
//! and writes enriched records plus a batch report.
//!
//! Module structure:
//! - `domain/` - Core types (Coordinate, RawPoint, ResolutionResult)
//! - `io/` - External interfaces (flow provider, spatial store, output)
//! - `services/` - Business logic (dedup, session, resolver, orchestrator)
//! - `infra/` - Infrastructure (config)

use anyhow::Context;
use clap::Parser;
use geoenrich::domain::types::RawPoint;
use geoenrich::infra::Config;
use geoenrich::io::{HttpFlowProvider, InMemoryStore};
use geoenrich::services::{BatchOrchestrator, FootfallEstimator, SessionManager, TieredResolver};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

/// Geoenrich - coordinate resolution and footfall enrichment
#[derive(Parser, Debug)]
#[command(name = "geoenrich", version, about)]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "config/dev.toml")]
    config: String,

    /// Input file: JSON array of raw points
    #[arg(short, long)]
    input: String,

    /// Output file for enriched records (JSONL)
    #[arg(short, long, default_value = "enriched.jsonl")]
    output: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured logging with configurable level via RUST_LOG env var
    // Default: INFO, use RUST_LOG=debug for per-tier visibility
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .init();

    info!(git = env!("GIT_HASH"), "geoenrich starting");

    let args = Args::parse();

    let config = Config::load_from_path(&args.config);
    info!(
        config_file = %config.config_file(),
        provider_base_url = %config.provider_base_url(),
        dataset = %config.dataset(),
        precision = %config.precision(),
        concurrency = %config.concurrency(),
        "config_loaded"
    );

    // Input batch: a JSON array of {id, latitude, longitude, ...passthrough}
    let input = std::fs::read_to_string(&args.input)
        .with_context(|| format!("Failed to read input file {}", args.input))?;
    let points: Vec<RawPoint> = serde_json::from_str(&input)
        .with_context(|| format!("Input file {} is not a list of points", args.input))?;

    let store = Arc::new(InMemoryStore::from_file(config.dataset())?);
    let provider = Arc::new(HttpFlowProvider::new(
        config.provider_base_url(),
        config.provider_client_id(),
        config.provider_client_secret(),
        config.provider_timeout(),
    )?);
    let session = Arc::new(SessionManager::new(provider.clone()));
    let estimator = FootfallEstimator::new();

    let resolver = Arc::new(TieredResolver::new(
        store,
        provider,
        session,
        estimator.clone(),
        config.resolver_settings(),
    ));
    let orchestrator = BatchOrchestrator::new(resolver, estimator, config.batch_settings());

    let (records, report) = orchestrator.resolve_batch(points).await;

    geoenrich::io::output::write_jsonl(&args.output, &records)?;

    // Report goes to stdout so callers can capture it
    println!("{}", serde_json::to_string_pretty(&report)?);

    info!(
        batch_id = %report.batch_id,
        total = report.total,
        estimated = report.estimated,
        output = %args.output,
        "geoenrich finished"
    );
    Ok(())
}
