// src/analyze/mod.rs
//! Analysis pipeline: oracle call, tolerant extraction, validation,
//! weighted aggregation and ranking.

pub mod extract;
pub mod judgment;
pub mod oracle;
pub mod orchestrator;
pub mod prompts;
pub mod scoring;
pub mod weights;

// Re-export convenient types.
pub use crate::analyze::judgment::{ContentFormat, Judgment, SubScores};
pub use crate::analyze::oracle::{build_oracle, DynOracle, JudgmentOracle, OracleRequest};
pub use crate::analyze::orchestrator::{ScoringConfig, ScoringOrchestrator, ScoringReport};
pub use crate::analyze::scoring::{overall_score, rank_top};
pub use crate::analyze::weights::ScoreWeights;
