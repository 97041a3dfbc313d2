// src/ingest/gate.rs
//! Admission gate: dedup of candidates against the time-windowed keyword ledger.
//!
//! Every sighting refreshes the ledger (last_seen + times_seen), including
//! sightings rejected as duplicates. Only the admission decision looks at the
//! window: a key is a duplicate while its previous sighting is strictly newer
//! than `now - window`.
//!
//! A sighting whose raw-trend insert fails is reverted, so a store fault
//! never leaves a ledger entry without its raw trend.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use super::types::CandidateItem;
use crate::error::AdmissionError;
use crate::store::{with_timeout, KeywordLedger, NewRawTrend, RawTrendStore};

pub const DEFAULT_WINDOW: Duration = Duration::from_secs(6 * 3600);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionOutcome {
    Admitted(i64),
    Duplicate,
}

/// Hex SHA-256 of `source:keyword`.
pub fn keyword_digest(source: &str, keyword: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    hasher.update(b":");
    hasher.update(keyword.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(64);
    for b in digest.iter() {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

pub struct AdmissionGate {
    ledger: Arc<dyn KeywordLedger>,
    raw: Arc<dyn RawTrendStore>,
    window: chrono::Duration,
    store_timeout: Duration,
}

impl AdmissionGate {
    pub fn new(
        ledger: Arc<dyn KeywordLedger>,
        raw: Arc<dyn RawTrendStore>,
        window: Duration,
        store_timeout: Duration,
    ) -> Self {
        Self {
            ledger,
            raw,
            window: chrono::Duration::from_std(window).unwrap_or(chrono::Duration::MAX),
            store_timeout,
        }
    }

    pub async fn admit(&self, candidate: &CandidateItem) -> Result<AdmissionOutcome, AdmissionError> {
        self.admit_at(Utc::now(), candidate).await
    }

    /// Admission with an explicit clock.
    pub async fn admit_at(
        &self,
        now: DateTime<Utc>,
        candidate: &CandidateItem,
    ) -> Result<AdmissionOutcome, AdmissionError> {
        if candidate.keyword.trim().is_empty() {
            return Err(AdmissionError::EmptyKeyword(candidate.source.clone()));
        }

        let digest = keyword_digest(&candidate.source, &candidate.keyword);
        let previous = with_timeout(
            self.store_timeout,
            self.ledger.record_sighting(&digest, &candidate.keyword, now),
        )
        .await?;

        if let Some(prev) = previous {
            let cutoff = now.checked_sub_signed(self.window);
            if cutoff.map_or(true, |c| prev > c) {
                tracing::trace!(target: "admission", source = %candidate.source, %digest, "duplicate within window");
                return Ok(AdmissionOutcome::Duplicate);
            }
        }

        let row = NewRawTrend {
            source: candidate.source.clone(),
            keyword: candidate.keyword.clone(),
            title: candidate.title.clone(),
            description: candidate.description.clone(),
            url: candidate.url.clone(),
            region: candidate.region.clone(),
            language: candidate.language.clone(),
            popularity_score: candidate.popularity,
            raw_data: candidate.payload.clone(),
            scraped_at: now,
        };
        match with_timeout(self.store_timeout, self.raw.insert(row)).await {
            Ok(id) => Ok(AdmissionOutcome::Admitted(id)),
            Err(e) => {
                let undo = with_timeout(
                    self.store_timeout,
                    self.ledger.revert_sighting(&digest, previous),
                )
                .await;
                if let Err(undo_err) = undo {
                    tracing::warn!(target: "admission", source = %candidate.source, %digest, error = %undo_err, "failed to revert sighting");
                }
                Err(e.into())
            }
        }
    }
}
