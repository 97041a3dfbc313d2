//! Scoring orchestrator: unscored raw trends → oracle → accepted judgments.
//!
//! A batch never aborts because of one item. Oracle faults and malformed
//! responses are logged, counted and reported; the rest of the batch goes on.

use std::sync::Arc;
use std::time::{Duration, Instant};

use metrics::{counter, histogram};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::extract::{ExtractionStrategy, DEFAULT_STRATEGIES};
use super::judgment::{default_required_fields, parse_judgment, Judgment};
use super::oracle::{DynOracle, OracleRequest};
use super::prompts::{build_user_prompt, DEFAULT_PERSONA};
use super::scoring::{overall_score, rank_top, DEFAULT_TOP_N};
use super::weights::ScoreWeights;
use crate::config::ScannerConfig;
use crate::error::{ItemFailure, OracleError, StoreError};
use crate::store::{with_timeout, NewScoredTrend, RawTrend, RawTrendStore, ScoredTrendStore};

/// Immutable scoring configuration injected into the orchestrator.
#[derive(Debug, Clone)]
pub struct ScoringConfig {
    pub persona: String,
    pub required_fields: Vec<String>,
    pub strategies: Vec<ExtractionStrategy>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub batch_limit: usize,
    pub overall_weights: ScoreWeights,
    pub report_weights: ScoreWeights,
    pub top_n: usize,
    pub oracle_timeout: Duration,
    pub store_timeout: Duration,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            persona: DEFAULT_PERSONA.to_string(),
            required_fields: default_required_fields(),
            strategies: DEFAULT_STRATEGIES.to_vec(),
            temperature: 0.3,
            max_tokens: 1000,
            batch_limit: 20,
            overall_weights: ScoreWeights::REFERENCE,
            report_weights: ScoreWeights::REFERENCE,
            top_n: DEFAULT_TOP_N,
            oracle_timeout: Duration::from_secs(120),
            store_timeout: Duration::from_secs(10),
        }
    }
}

impl ScoringConfig {
    pub fn from_scanner(cfg: &ScannerConfig) -> anyhow::Result<Self> {
        Ok(Self {
            persona: cfg.persona()?,
            required_fields: cfg.scoring.required_fields.clone(),
            strategies: DEFAULT_STRATEGIES.to_vec(),
            temperature: cfg.scoring.temperature,
            max_tokens: cfg.scoring.max_tokens,
            batch_limit: cfg.scoring.batch_limit,
            overall_weights: cfg.weights.overall,
            report_weights: cfg.weights.report,
            top_n: cfg.scoring.top_n,
            oracle_timeout: cfg.timeouts.oracle(),
            store_timeout: cfg.timeouts.store(),
        })
    }
}

/// Result of one `score_batch` call.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// The `limit` the caller asked for.
    pub requested: usize,
    /// Unscored raw trends actually fetched (<= requested).
    pub fetched: usize,
    pub accepted: Vec<Judgment>,
    pub failures: Vec<(i64, ItemFailure)>,
}

impl BatchOutcome {
    pub fn failed(&self) -> usize {
        self.failures.len()
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StoreSummary {
    pub stored: usize,
    pub failed: usize,
}

/// What one scoring pass did; kept in the cycle history.
#[derive(Debug, Default, Clone, Serialize)]
pub struct ScoringReport {
    pub requested: usize,
    pub fetched: usize,
    pub accepted: usize,
    pub failed: usize,
    pub stored: usize,
    pub store_failures: usize,
    pub top: Vec<Judgment>,
}

pub struct ScoringOrchestrator {
    raw: Arc<dyn RawTrendStore>,
    scored: Arc<dyn ScoredTrendStore>,
    oracle: DynOracle,
    config: ScoringConfig,
}

impl ScoringOrchestrator {
    pub fn new(
        raw: Arc<dyn RawTrendStore>,
        scored: Arc<dyn ScoredTrendStore>,
        oracle: DynOracle,
        config: ScoringConfig,
    ) -> Self {
        Self {
            raw,
            scored,
            oracle,
            config,
        }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Score up to `limit` unscored raw trends, newest first.
    /// Only the unscored query itself can fail the call.
    pub async fn score_batch(&self, limit: usize) -> Result<BatchOutcome, StoreError> {
        let unscored =
            with_timeout(self.config.store_timeout, self.raw.query_unscored(limit)).await?;

        let mut outcome = BatchOutcome {
            requested: limit,
            fetched: unscored.len(),
            ..BatchOutcome::default()
        };
        if unscored.is_empty() {
            info!(target: "scoring", "no new trends to analyze");
            return Ok(outcome);
        }

        let total = unscored.len();
        for (i, trend) in unscored.iter().enumerate() {
            debug!(
                target: "scoring",
                item = i + 1,
                total,
                raw_trend_id = trend.id,
                keyword = %crate::ingest::types::truncate_chars(&trend.keyword, 60),
                "analyzing"
            );
            match self.score_one(trend).await {
                Ok(j) => {
                    counter!("scanner_scored_total").increment(1);
                    outcome.accepted.push(j);
                }
                Err(e) => {
                    counter!("scanner_scoring_failures_total").increment(1);
                    warn!(target: "scoring", raw_trend_id = trend.id, error = %e, "skipped (analysis failed)");
                    outcome.failures.push((trend.id, e));
                }
            }
        }

        info!(
            target: "scoring",
            accepted = outcome.accepted.len(),
            failed = outcome.failed(),
            fetched = outcome.fetched,
            requested = outcome.requested,
            "batch analyzed"
        );
        Ok(outcome)
    }

    /// One oracle round-trip plus validation for a single raw trend.
    pub async fn score_one(&self, trend: &RawTrend) -> Result<Judgment, ItemFailure> {
        let request = OracleRequest {
            system: self.config.persona.clone(),
            user: build_user_prompt(trend),
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let t0 = Instant::now();
        let text = tokio::time::timeout(self.config.oracle_timeout, self.oracle.complete(&request))
            .await
            .map_err(|_| OracleError::Timeout(self.config.oracle_timeout))??;
        histogram!("scanner_oracle_call_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);

        parse_judgment(
            trend.id,
            &text,
            &self.config.required_fields,
            &self.config.strategies,
        )
        .map_err(|e| {
            debug!(
                target: "scoring",
                raw_trend_id = trend.id,
                response = %crate::ingest::types::truncate_chars(&text, 500),
                "rejected oracle response"
            );
            ItemFailure::from(e)
        })
    }

    /// Aggregate and persist every accepted judgment. One failed insert
    /// does not affect the others.
    pub async fn store_batch(&self, outcome: &BatchOutcome) -> StoreSummary {
        let mut summary = StoreSummary::default();
        for j in &outcome.accepted {
            let row = NewScoredTrend {
                raw_trend_id: j.raw_trend_id,
                topic: j.topic.clone(),
                summary: j.summary.clone(),
                scores: j.scores,
                overall_score: overall_score(&j.scores, &self.config.overall_weights),
                suggested_format: j.suggested_format,
                suggested_angle: j.suggested_angle.clone(),
                affiliate_opportunities: j.affiliate_opportunities.clone(),
                content_language: j.content_language.clone(),
            };
            match with_timeout(self.config.store_timeout, self.scored.insert(row)).await {
                Ok(_) => summary.stored += 1,
                Err(e) => {
                    summary.failed += 1;
                    warn!(target: "store", raw_trend_id = j.raw_trend_id, error = %e, "scored trend insert failed");
                }
            }
        }
        counter!("scanner_stored_total").increment(summary.stored as u64);
        summary
    }

    /// Top-N of a batch by the report weights (not persisted).
    pub fn top_opportunities<'a>(&self, outcome: &'a BatchOutcome) -> Vec<&'a Judgment> {
        rank_top(
            &outcome.accepted,
            &self.config.report_weights,
            self.config.top_n,
        )
    }

    /// Score, store and rank one batch of `batch_limit` items.
    pub async fn run_pass(&self) -> Result<ScoringReport, StoreError> {
        let outcome = self.score_batch(self.config.batch_limit).await?;
        let stored = self.store_batch(&outcome).await;
        let top: Vec<Judgment> = self
            .top_opportunities(&outcome)
            .into_iter()
            .cloned()
            .collect();

        for (rank, t) in top.iter().enumerate() {
            info!(
                target: "scoring",
                rank = rank + 1,
                topic = %t.topic,
                format = t.suggested_format.as_str(),
                relevance = t.scores.relevance,
                monetization = t.scores.monetization,
                urgency = t.scores.urgency,
                competition = t.scores.competition,
                content_gap = t.scores.content_gap,
                "top opportunity"
            );
        }

        Ok(ScoringReport {
            requested: outcome.requested,
            fetched: outcome.fetched,
            accepted: outcome.accepted.len(),
            failed: outcome.failed(),
            stored: stored.stored,
            store_failures: stored.failed,
            top,
        })
    }
}
