// src/store/mod.rs
//! Persistence contracts: the dedup ledger, raw trends, and scored trends.
//!
//! The pipeline only talks to these traits. `memory` backs tests and dry runs,
//! `sqlite` is the durable backend used by the binary.

pub mod memory;
pub mod sqlite;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::analyze::judgment::{ContentFormat, SubScores};
use crate::error::StoreError;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

pub type StoreResult<T> = Result<T, StoreError>;

/// Default status of a freshly scored trend.
pub const DEFAULT_STATUS: &str = "new";

/// Dedup ledger entry keyed by the (source, keyword) digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedKeywordRecord {
    pub keyword_hash: String,
    pub keyword: String,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub times_seen: i64,
}

/// Fields of a raw trend before the store assigns an id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRawTrend {
    pub source: String,
    pub keyword: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub region: String,
    pub language: String,
    pub popularity_score: i64,
    pub raw_data: Value,
    pub scraped_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTrend {
    pub id: i64,
    pub source: String,
    pub keyword: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub region: String,
    pub language: String,
    pub popularity_score: i64,
    pub raw_data: Value,
    pub scraped_at: DateTime<Utc>,
}

impl RawTrend {
    pub fn from_new(id: i64, n: NewRawTrend) -> Self {
        Self {
            id,
            source: n.source,
            keyword: n.keyword,
            title: n.title,
            description: n.description,
            url: n.url,
            region: n.region,
            language: n.language,
            popularity_score: n.popularity_score,
            raw_data: n.raw_data,
            scraped_at: n.scraped_at,
        }
    }
}

/// Accepted judgment plus the aggregated overall score, ready to persist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewScoredTrend {
    pub raw_trend_id: i64,
    pub topic: String,
    pub summary: String,
    pub scores: SubScores,
    pub overall_score: i64,
    pub suggested_format: ContentFormat,
    pub suggested_angle: String,
    pub affiliate_opportunities: String,
    pub content_language: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredTrend {
    pub id: i64,
    pub raw_trend_id: i64,
    pub topic: String,
    pub summary: String,
    pub scores: SubScores,
    pub overall_score: i64,
    pub suggested_format: ContentFormat,
    pub suggested_angle: String,
    pub affiliate_opportunities: String,
    pub content_language: String,
    pub status: String,
    pub analyzed_at: DateTime<Utc>,
}

#[async_trait::async_trait]
pub trait KeywordLedger: Send + Sync {
    /// Record one sighting of `keyword_hash` at `now` in a single atomic step:
    /// insert with `times_seen = 1`, or refresh `last_seen` and increment.
    /// Returns the `last_seen` value from before this sighting, if any.
    async fn record_sighting(
        &self,
        keyword_hash: &str,
        keyword: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<DateTime<Utc>>>;

    /// Undo one `record_sighting` whose admission did not complete. `previous`
    /// is what that call returned: `None` drops the entry, otherwise
    /// `last_seen` is restored and `times_seen` decremented.
    async fn revert_sighting(
        &self,
        keyword_hash: &str,
        previous: Option<DateTime<Utc>>,
    ) -> StoreResult<()>;

    async fn get(&self, keyword_hash: &str) -> StoreResult<Option<ProcessedKeywordRecord>>;
}

#[async_trait::async_trait]
pub trait RawTrendStore: Send + Sync {
    async fn insert(&self, trend: NewRawTrend) -> StoreResult<i64>;

    /// Raw trends with no scored trend yet, newest first.
    async fn query_unscored(&self, limit: usize) -> StoreResult<Vec<RawTrend>>;
}

#[async_trait::async_trait]
pub trait ScoredTrendStore: Send + Sync {
    async fn insert(&self, trend: NewScoredTrend) -> StoreResult<i64>;
}

/// Bound a store call by `limit`; elapsing is a recoverable [`StoreError::Timeout`].
pub async fn with_timeout<T, F>(limit: std::time::Duration, fut: F) -> StoreResult<T>
where
    F: std::future::Future<Output = StoreResult<T>>,
{
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| StoreError::Timeout(limit))?
}
