//! Error taxonomy for the pipeline.
//!
//! Every error here is recoverable at the level it is raised: a store or
//! oracle fault loses one item, never the cycle.

use std::time::Duration;

use thiserror::Error;

/// Failure talking to one of the stores (ledger, raw trends, scored trends).
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("payload serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("store operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("store backend error: {0}")]
    Backend(String),
}

/// Failure obtaining text from the judgment oracle.
#[derive(Error, Debug)]
pub enum OracleError {
    #[error("oracle is disabled")]
    Disabled,

    #[error("oracle transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("oracle returned HTTP {0}")]
    Status(u16),

    #[error("oracle returned an empty response")]
    EmptyResponse,

    #[error("oracle call timed out after {0:?}")]
    Timeout(Duration),

    #[error("daily oracle budget of {0} calls exhausted")]
    BudgetExhausted(u32),
}

/// The oracle answered, but the answer is not an acceptable judgment.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JudgmentError {
    #[error("no JSON object could be extracted from the response")]
    NoStructuredData,

    #[error("response JSON is not an object")]
    NotAnObject,

    #[error("missing required field `{0}`")]
    MissingField(String),

    #[error("score field `{field}` is not numeric: {value}")]
    NonNumericScore { field: String, value: String },
}

/// Why a single raw trend dropped out of a scoring batch.
#[derive(Error, Debug)]
pub enum ItemFailure {
    #[error(transparent)]
    Oracle(#[from] OracleError),

    #[error(transparent)]
    Judgment(#[from] JudgmentError),
}

/// Why a candidate could not be admitted. Duplicates are not errors.
#[derive(Error, Debug)]
pub enum AdmissionError {
    #[error("candidate from `{0}` has an empty keyword")]
    EmptyKeyword(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}
