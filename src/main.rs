//! Trend scanner binary entrypoint.
//! Loads configuration, wires stores, adapters and the oracle, then runs the
//! cycle scheduler until Ctrl-C.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use trend_scanner::analyze::{build_oracle, ScoringConfig, ScoringOrchestrator};
use trend_scanner::config::load_config_default;
use trend_scanner::history::CycleHistory;
use trend_scanner::ingest::gate::AdmissionGate;
use trend_scanner::ingest::providers::build_adapters;
use trend_scanner::scheduler::{CycleScheduler, Pipeline};
use trend_scanner::store::SqliteStore;

/// Compact logs by default, JSON lines with LOG_FORMAT=json.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("trend_scanner=info,warn"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = load_config_default().context("loading scanner config")?;

    if let Some(addr) = cfg.metrics.listen {
        trend_scanner::metrics::install_exporter(addr)?;
    }

    let store = Arc::new(
        SqliteStore::open(&cfg.store.database_path)
            .await
            .context("opening trend database")?,
    );

    let oracle = build_oracle(&cfg.oracle)?;
    tracing::info!(provider = oracle.provider_name(), model = %cfg.oracle.model, "judgment oracle ready");

    let adapters = build_adapters(&cfg.sources, cfg.timeouts.adapter())?;
    let gate = AdmissionGate::new(
        store.clone(),
        store.clone(),
        Duration::from_secs(cfg.admission.window_hours.saturating_mul(3600)),
        cfg.timeouts.store(),
    );
    let orchestrator = ScoringOrchestrator::new(
        store.clone(),
        store.clone(),
        oracle,
        ScoringConfig::from_scanner(&cfg)?,
    );

    let pipeline = Pipeline::new(adapters, gate, orchestrator, cfg.timeouts.adapter());
    let history = Arc::new(CycleHistory::with_capacity(cfg.scheduler.history_capacity));
    let scheduler = Arc::new(CycleScheduler::new(
        pipeline,
        cfg.scheduler.interval(),
        history,
    ));

    tracing::info!(
        interval_minutes = cfg.scheduler.interval_minutes,
        database = %cfg.store.database_path.display(),
        "trend scanner starting"
    );
    tokio::time::sleep(Duration::from_secs(cfg.scheduler.startup_delay_secs)).await;

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };
    scheduler.run_until(shutdown).await;

    tracing::info!("trend scanner stopped");
    Ok(())
}
