// src/ingest/mod.rs
pub mod gate;
pub mod providers;
pub mod types;

use crate::ingest::gate::{AdmissionGate, AdmissionOutcome};
use crate::ingest::types::SourceAdapter;
use crate::error::AdmissionError;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge};
use once_cell::sync::OnceCell;
use serde::Serialize;
use std::time::Duration;

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "scanner_candidates_total",
            "Candidate items returned by source adapters."
        );
        describe_counter!("scanner_admitted_total", "Candidates admitted as raw trends.");
        describe_counter!(
            "scanner_duplicates_total",
            "Candidates rejected by the dedup window."
        );
        describe_counter!(
            "scanner_dropped_total",
            "Candidates dropped for an empty keyword."
        );
        describe_counter!(
            "scanner_admission_errors_total",
            "Store faults while admitting a candidate."
        );
        describe_counter!(
            "scanner_adapter_errors_total",
            "Source adapter fetch/parse errors and timeouts."
        );
        describe_counter!("scanner_scored_total", "Oracle judgments accepted.");
        describe_counter!(
            "scanner_scoring_failures_total",
            "Raw trends skipped because the oracle call or its response failed."
        );
        describe_counter!("scanner_stored_total", "Scored trends persisted.");
        describe_counter!("scanner_cycles_total", "Completed scan cycles.");
        describe_counter!(
            "scanner_cycles_skipped_total",
            "Triggers skipped because a cycle was already running."
        );
        describe_histogram!("scanner_oracle_call_ms", "Oracle call latency in milliseconds.");
        describe_histogram!("scanner_parse_ms", "Adapter parse time in milliseconds.");
        describe_gauge!(
            "scanner_last_ingest_ts",
            "Unix ts when the last ingestion pass finished."
        );
        describe_gauge!(
            "scanner_last_cycle_ts",
            "Unix ts when the last scan cycle finished."
        );
    });
}

/// Normalize text: decode entities, strip tags, collapse whitespace.
pub fn normalize_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_tags =
        RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").expect("valid tag regex"));
    out = re_tags.replace_all(&out, " ").to_string();

    // 3) Normalize “ ” ‘ ’ « » to ASCII quotes
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace
    static RE_WS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").expect("valid ws regex"));
    out = re_ws.replace_all(&out, " ").to_string();
    out.trim().to_string()
}

/// Per-adapter tally for one ingestion pass.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct SourceReport {
    pub adapter: String,
    pub fetched: usize,
    pub admitted: usize,
    pub duplicates: usize,
    pub dropped: usize,
    pub errors: usize,
    /// The adapter itself failed or timed out; it contributed zero items.
    pub adapter_failed: bool,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub sources: Vec<SourceReport>,
}

impl IngestReport {
    pub fn fetched(&self) -> usize {
        self.sources.iter().map(|s| s.fetched).sum()
    }
    pub fn admitted(&self) -> usize {
        self.sources.iter().map(|s| s.admitted).sum()
    }
    pub fn duplicates(&self) -> usize {
        self.sources.iter().map(|s| s.duplicates).sum()
    }
    pub fn adapter_failures(&self) -> usize {
        self.sources.iter().filter(|s| s.adapter_failed).count()
    }
}

/// Run every adapter once, in order, and admit what they return.
/// An adapter error or timeout only zeroes that adapter's contribution.
pub async fn run_ingest(
    adapters: &[Box<dyn SourceAdapter>],
    gate: &AdmissionGate,
    adapter_timeout: Duration,
) -> IngestReport {
    ensure_metrics_described();

    let mut report = IngestReport::default();
    for adapter in adapters {
        let mut sr = SourceReport {
            adapter: adapter.name().to_string(),
            ..SourceReport::default()
        };
        tracing::info!(target: "ingest", adapter = adapter.name(), "running adapter");

        let items = match tokio::time::timeout(adapter_timeout, adapter.fetch_latest()).await {
            Ok(Ok(v)) => v,
            Ok(Err(e)) => {
                tracing::warn!(target: "ingest", error = ?e, adapter = adapter.name(), "adapter error");
                counter!("scanner_adapter_errors_total").increment(1);
                sr.adapter_failed = true;
                report.sources.push(sr);
                continue;
            }
            Err(_) => {
                tracing::warn!(target: "ingest", adapter = adapter.name(), timeout = ?adapter_timeout, "adapter timed out");
                counter!("scanner_adapter_errors_total").increment(1);
                sr.adapter_failed = true;
                report.sources.push(sr);
                continue;
            }
        };

        sr.fetched = items.len();
        for item in &items {
            match gate.admit(item).await {
                Ok(AdmissionOutcome::Admitted(_)) => sr.admitted += 1,
                Ok(AdmissionOutcome::Duplicate) => sr.duplicates += 1,
                Err(AdmissionError::EmptyKeyword(src)) => {
                    tracing::debug!(target: "ingest", source = %src, "dropped candidate with empty keyword");
                    sr.dropped += 1;
                }
                Err(AdmissionError::Store(e)) => {
                    tracing::warn!(target: "ingest", error = %e, source = %item.source, "admission failed");
                    sr.errors += 1;
                }
            }
        }

        counter!("scanner_candidates_total").increment(sr.fetched as u64);
        counter!("scanner_admitted_total").increment(sr.admitted as u64);
        counter!("scanner_duplicates_total").increment(sr.duplicates as u64);
        counter!("scanner_dropped_total").increment(sr.dropped as u64);
        counter!("scanner_admission_errors_total").increment(sr.errors as u64);

        tracing::info!(
            target: "ingest",
            adapter = adapter.name(),
            fetched = sr.fetched,
            admitted = sr.admitted,
            duplicates = sr.duplicates,
            "adapter done"
        );
        report.sources.push(sr);
    }

    gauge!("scanner_last_ingest_ts").set(chrono::Utc::now().timestamp() as f64);
    tracing::info!(
        target: "ingest",
        admitted = report.admitted(),
        skipped = report.fetched().saturating_sub(report.admitted()),
        "ingest finished"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_text_decodes_and_collapses() {
        let s = "  Hello,&nbsp;&nbsp; <b>world</b>!  ";
        let out = normalize_text(s);
        assert_eq!(out, "Hello, world !");
    }

    #[test]
    fn normalize_text_keeps_hebrew_and_quotes() {
        assert_eq!(normalize_text("“שלום”   עולם"), "\"שלום\" עולם");
    }
}
