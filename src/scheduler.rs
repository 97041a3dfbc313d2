// src/scheduler.rs
//! Cycle scheduler: ingestion over every adapter, then one scoring pass,
//! once eagerly and then on a fixed interval.
//!
//! Overlap policy is skip-if-running. Each cycle runs in its own task so a
//! panic inside it is caught at the join boundary and the loop carries on.
//! On shutdown the loop stops ticking and waits, up to a grace period, for
//! an in-flight cycle to finish.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use metrics::{counter, gauge};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::analyze::orchestrator::{ScoringOrchestrator, ScoringReport};
use crate::history::CycleHistory;
use crate::ingest::gate::AdmissionGate;
use crate::ingest::types::SourceAdapter;
use crate::ingest::{ensure_metrics_described, run_ingest, IngestReport};

pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// Everything one cycle touches.
pub struct Pipeline {
    adapters: Vec<Box<dyn SourceAdapter>>,
    gate: AdmissionGate,
    orchestrator: ScoringOrchestrator,
    adapter_timeout: Duration,
}

impl Pipeline {
    pub fn new(
        adapters: Vec<Box<dyn SourceAdapter>>,
        gate: AdmissionGate,
        orchestrator: ScoringOrchestrator,
        adapter_timeout: Duration,
    ) -> Self {
        Self {
            adapters,
            gate,
            orchestrator,
            adapter_timeout,
        }
    }

    /// One ingestion-then-scoring pass. Never fails as a whole; stage
    /// errors end up in the report.
    pub async fn run(&self, cycle: u64) -> CycleReport {
        let started_at = Utc::now();
        let ingest = run_ingest(&self.adapters, &self.gate, self.adapter_timeout).await;

        let (scoring, scoring_error) = match self.orchestrator.run_pass().await {
            Ok(r) => (Some(r), None),
            Err(e) => {
                tracing::error!(target: "scheduler", cycle, error = %e, "scoring phase failed");
                (None, Some(e.to_string()))
            }
        };

        CycleReport {
            cycle,
            started_at,
            finished_at: Utc::now(),
            ingest,
            scoring,
            scoring_error,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub cycle: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub ingest: IngestReport,
    pub scoring: Option<ScoringReport>,
    pub scoring_error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    RunningCycle,
}

#[derive(Debug)]
pub enum CycleOutcome {
    Completed(Box<CycleReport>),
    /// A cycle was already running.
    Skipped,
    /// The cycle task panicked or was cancelled.
    Aborted(String),
}

/// Clears the running flag however the cycle ends.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct CycleScheduler {
    pipeline: Arc<Pipeline>,
    interval: Duration,
    shutdown_grace: Duration,
    running: AtomicBool,
    cycles: AtomicU64,
    history: Arc<CycleHistory>,
}

impl CycleScheduler {
    pub fn new(pipeline: Pipeline, interval: Duration, history: Arc<CycleHistory>) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            interval,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            running: AtomicBool::new(false),
            cycles: AtomicU64::new(0),
            history,
        }
    }

    /// How long `run_until` waits for in-flight cycles after shutdown.
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    pub fn state(&self) -> CycleState {
        if self.running.load(Ordering::Acquire) {
            CycleState::RunningCycle
        } else {
            CycleState::Idle
        }
    }

    pub fn history(&self) -> &Arc<CycleHistory> {
        &self.history
    }

    /// Trigger one cycle unless one is already running.
    pub async fn run_cycle(&self) -> CycleOutcome {
        ensure_metrics_described();

        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::warn!(target: "scheduler", "previous cycle still running, trigger skipped");
            counter!("scanner_cycles_skipped_total").increment(1);
            return CycleOutcome::Skipped;
        }
        let _guard = RunningGuard(&self.running);

        let cycle = self.cycles.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::info!(target: "scheduler", cycle, "scan cycle started");

        let pipeline = Arc::clone(&self.pipeline);
        let joined = tokio::spawn(async move { pipeline.run(cycle).await }).await;

        match joined {
            Ok(report) => {
                counter!("scanner_cycles_total").increment(1);
                gauge!("scanner_last_cycle_ts").set(report.finished_at.timestamp() as f64);
                tracing::info!(
                    target: "scheduler",
                    cycle,
                    admitted = report.ingest.admitted(),
                    duplicates = report.ingest.duplicates(),
                    adapter_failures = report.ingest.adapter_failures(),
                    scored = report.scoring.as_ref().map_or(0, |s| s.accepted),
                    stored = report.scoring.as_ref().map_or(0, |s| s.stored),
                    "scan cycle finished"
                );
                self.history.push(report.clone());
                CycleOutcome::Completed(Box::new(report))
            }
            Err(e) => {
                let reason = if e.is_panic() {
                    "cycle task panicked".to_string()
                } else {
                    format!("cycle task cancelled: {e}")
                };
                tracing::error!(target: "scheduler", cycle, error = %e, "{reason}");
                CycleOutcome::Aborted(reason)
            }
        }
    }

    /// Run eagerly, then every `interval`, until `shutdown` resolves.
    /// Missed ticks are skipped rather than bunched.
    pub async fn run_until<F>(self: Arc<Self>, shutdown: F)
    where
        F: Future<Output = ()> + Send,
    {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        tracing::info!(target: "scheduler", interval = ?self.interval, "scheduler started");
        let mut in_flight: Vec<JoinHandle<()>> = Vec::new();
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!(target: "scheduler", "shutdown requested, scheduler stopping");
                    break;
                }
                _ = ticker.tick() => {
                    let this = Arc::clone(&self);
                    // Spawned so a long cycle does not block later ticks from being skipped.
                    in_flight.retain(|h| !h.is_finished());
                    in_flight.push(tokio::spawn(async move {
                        let _ = this.run_cycle().await;
                    }));
                }
            }
        }

        in_flight.retain(|h| !h.is_finished());
        if in_flight.is_empty() {
            return;
        }
        tracing::info!(target: "scheduler", grace = ?self.shutdown_grace, "waiting for in-flight cycle");
        let drain = async {
            for h in in_flight {
                let _ = h.await;
            }
        };
        if tokio::time::timeout(self.shutdown_grace, drain).await.is_err() {
            tracing::warn!(target: "scheduler", grace = ?self.shutdown_grace, "in-flight cycle did not finish within grace period");
        }
    }

    pub fn spawn<F>(self: Arc<Self>, shutdown: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        tokio::spawn(self.run_until(shutdown))
    }
}
