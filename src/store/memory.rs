// src/store/memory.rs
//! In-memory backend for all three store traits.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use super::{
    KeywordLedger, NewRawTrend, NewScoredTrend, ProcessedKeywordRecord, RawTrend, RawTrendStore,
    ScoredTrend, ScoredTrendStore, StoreResult, DEFAULT_STATUS,
};
use crate::error::StoreError;

#[derive(Debug, Default)]
struct Tables {
    ledger: HashMap<String, ProcessedKeywordRecord>,
    raw: Vec<RawTrend>,
    scored: Vec<ScoredTrend>,
    next_raw_id: i64,
    next_scored_id: i64,
}

/// Ledger, raw trends and scored trends behind one mutex, so every
/// operation is atomic with respect to the others.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Tables>> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Backend("memory store mutex poisoned".into()))
    }

    pub fn raw_trends(&self) -> StoreResult<Vec<RawTrend>> {
        Ok(self.lock()?.raw.clone())
    }

    pub fn scored_trends(&self) -> StoreResult<Vec<ScoredTrend>> {
        Ok(self.lock()?.scored.clone())
    }
}

#[async_trait::async_trait]
impl KeywordLedger for MemoryStore {
    async fn record_sighting(
        &self,
        keyword_hash: &str,
        keyword: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<DateTime<Utc>>> {
        let mut t = self.lock()?;
        match t.ledger.get_mut(keyword_hash) {
            Some(rec) => {
                let prev = rec.last_seen;
                rec.last_seen = now;
                rec.times_seen += 1;
                Ok(Some(prev))
            }
            None => {
                t.ledger.insert(
                    keyword_hash.to_string(),
                    ProcessedKeywordRecord {
                        keyword_hash: keyword_hash.to_string(),
                        keyword: keyword.to_string(),
                        first_seen: now,
                        last_seen: now,
                        times_seen: 1,
                    },
                );
                Ok(None)
            }
        }
    }

    async fn revert_sighting(
        &self,
        keyword_hash: &str,
        previous: Option<DateTime<Utc>>,
    ) -> StoreResult<()> {
        let mut t = self.lock()?;
        match previous {
            None => {
                t.ledger.remove(keyword_hash);
            }
            Some(prev) => {
                if let Some(rec) = t.ledger.get_mut(keyword_hash) {
                    rec.last_seen = prev;
                    rec.times_seen = (rec.times_seen - 1).max(1);
                }
            }
        }
        Ok(())
    }

    async fn get(&self, keyword_hash: &str) -> StoreResult<Option<ProcessedKeywordRecord>> {
        Ok(self.lock()?.ledger.get(keyword_hash).cloned())
    }
}

#[async_trait::async_trait]
impl RawTrendStore for MemoryStore {
    async fn insert(&self, trend: NewRawTrend) -> StoreResult<i64> {
        let mut t = self.lock()?;
        t.next_raw_id += 1;
        let id = t.next_raw_id;
        t.raw.push(RawTrend::from_new(id, trend));
        Ok(id)
    }

    async fn query_unscored(&self, limit: usize) -> StoreResult<Vec<RawTrend>> {
        let t = self.lock()?;
        let mut out: Vec<RawTrend> = t
            .raw
            .iter()
            .filter(|r| !t.scored.iter().any(|s| s.raw_trend_id == r.id))
            .cloned()
            .collect();
        out.sort_by(|a, b| b.scraped_at.cmp(&a.scraped_at).then(b.id.cmp(&a.id)));
        out.truncate(limit);
        Ok(out)
    }
}

#[async_trait::async_trait]
impl ScoredTrendStore for MemoryStore {
    async fn insert(&self, trend: NewScoredTrend) -> StoreResult<i64> {
        let mut t = self.lock()?;
        t.next_scored_id += 1;
        let id = t.next_scored_id;
        t.scored.push(ScoredTrend {
            id,
            raw_trend_id: trend.raw_trend_id,
            topic: trend.topic,
            summary: trend.summary,
            scores: trend.scores,
            overall_score: trend.overall_score,
            suggested_format: trend.suggested_format,
            suggested_angle: trend.suggested_angle,
            affiliate_opportunities: trend.affiliate_opportunities,
            content_language: trend.content_language,
            status: DEFAULT_STATUS.to_string(),
            analyzed_at: Utc::now(),
        });
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::Value;

    fn raw(keyword: &str, at: DateTime<Utc>) -> NewRawTrend {
        NewRawTrend {
            source: "test".into(),
            keyword: keyword.into(),
            title: None,
            description: None,
            url: None,
            region: "IL".into(),
            language: "he".into(),
            popularity_score: 0,
            raw_data: Value::Null,
            scraped_at: at,
        }
    }

    #[tokio::test]
    async fn ids_increase_and_unscored_is_newest_first() {
        let store = MemoryStore::new();
        let t0 = Utc::now();
        let a = RawTrendStore::insert(&store, raw("a", t0)).await.unwrap();
        let b = RawTrendStore::insert(&store, raw("b", t0 + Duration::seconds(5)))
            .await
            .unwrap();
        assert!(b > a);

        let unscored = store.query_unscored(10).await.unwrap();
        let ids: Vec<i64> = unscored.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![b, a]);

        let limited = store.query_unscored(1).await.unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].id, b);
    }

    #[tokio::test]
    async fn sighting_returns_previous_last_seen() {
        let store = MemoryStore::new();
        let t0 = Utc::now();
        assert_eq!(store.record_sighting("h", "kw", t0).await.unwrap(), None);
        let t1 = t0 + Duration::minutes(1);
        assert_eq!(store.record_sighting("h", "kw", t1).await.unwrap(), Some(t0));

        let rec = store.get("h").await.unwrap().unwrap();
        assert_eq!(rec.times_seen, 2);
        assert_eq!(rec.first_seen, t0);
        assert_eq!(rec.last_seen, t1);
    }

    #[tokio::test]
    async fn revert_restores_or_drops_the_entry() {
        let store = MemoryStore::new();
        let t0 = Utc::now();
        let t1 = t0 + Duration::minutes(1);

        let prev = store.record_sighting("h", "kw", t0).await.unwrap();
        store.revert_sighting("h", prev).await.unwrap();
        assert!(store.get("h").await.unwrap().is_none());

        store.record_sighting("h", "kw", t0).await.unwrap();
        let prev = store.record_sighting("h", "kw", t1).await.unwrap();
        store.revert_sighting("h", prev).await.unwrap();
        let rec = store.get("h").await.unwrap().unwrap();
        assert_eq!(rec.times_seen, 1);
        assert_eq!(rec.last_seen, t0);
    }
}
