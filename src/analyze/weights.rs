//! Weight vectors over the five sub-scores.
//!
//! TOML shape (both `[weights.overall]` and `[weights.report]`):
//! ```toml
//! relevance = 0.15
//! monetization = 0.30
//! urgency = 0.15
//! competition = 0.15
//! content_gap = 0.25
//! ```
//!
//! The persisted overall score and the report ranking each get their own
//! vector. They start out equal, but are configured and applied separately.

use anyhow::{bail, Result};
use serde::Deserialize;

use super::judgment::SubScores;

const SUM_TOLERANCE: f64 = 1e-6;

#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScoreWeights {
    pub relevance: f64,
    pub monetization: f64,
    pub urgency: f64,
    pub competition: f64,
    pub content_gap: f64,
}

impl ScoreWeights {
    /// Reference vector: monetization and content gap matter most.
    pub const REFERENCE: Self = Self {
        relevance: 0.15,
        monetization: 0.30,
        urgency: 0.15,
        competition: 0.15,
        content_gap: 0.25,
    };

    pub fn sum(&self) -> f64 {
        self.relevance + self.monetization + self.urgency + self.competition + self.content_gap
    }

    /// Weighted sum of `s` (no rounding).
    pub fn apply(&self, s: &SubScores) -> f64 {
        s.relevance as f64 * self.relevance
            + s.monetization as f64 * self.monetization
            + s.urgency as f64 * self.urgency
            + s.competition as f64 * self.competition
            + s.content_gap as f64 * self.content_gap
    }

    /// Reject negative or non-finite weights and vectors not summing to 1.0.
    pub fn validate(&self, label: &str) -> Result<()> {
        let all = [
            self.relevance,
            self.monetization,
            self.urgency,
            self.competition,
            self.content_gap,
        ];
        if all.iter().any(|w| !w.is_finite() || *w < 0.0) {
            bail!("{label} weights must be finite and non-negative: {self:?}");
        }
        let sum = self.sum();
        if (sum - 1.0).abs() > SUM_TOLERANCE {
            bail!("{label} weights must sum to 1.0, got {sum}");
        }
        Ok(())
    }
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self::REFERENCE
    }
}
