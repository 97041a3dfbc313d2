// tests/scoring_pipeline.rs
use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use serde_json::json;
use trend_scanner::analyze::oracle::{JudgmentOracle, OracleFuture, OracleRequest};
use trend_scanner::analyze::{ScoringConfig, ScoringOrchestrator};
use trend_scanner::error::{ItemFailure, JudgmentError, OracleError};
use trend_scanner::store::{MemoryStore, NewRawTrend, RawTrendStore};

/// Answers by keyword, which the user prompt carries on its own line.
struct ScriptedOracle {
    answers: HashMap<String, Result<String, ()>>,
}

impl JudgmentOracle for ScriptedOracle {
    fn complete<'a>(&'a self, request: &'a OracleRequest) -> OracleFuture<'a> {
        let hit = self
            .answers
            .iter()
            .find(|(kw, _)| request.user.contains(&format!("Keyword: {kw}\n")))
            .map(|(_, a)| a.clone());
        Box::pin(async move {
            match hit {
                Some(Ok(text)) => Ok(text),
                Some(Err(())) => Err(OracleError::Status(500)),
                None => Err(OracleError::EmptyResponse),
            }
        })
    }
    fn provider_name(&self) -> &'static str {
        "scripted"
    }
}

fn response(topic: &str, s: [i64; 5]) -> String {
    format!(
        "```json\n{}\n```",
        json!({
            "topic": topic,
            "summary": format!("{topic} summary"),
            "niche_relevance": s[0],
            "monetization_score": s[1],
            "urgency_score": s[2],
            "competition_score": s[3],
            "hebrew_gap": s[4],
            "suggested_format": "reel",
            "suggested_angle": "explain it simply",
            "affiliate_opportunities": "courses",
            "content_language": "he"
        })
    )
}

async fn seed(store: &MemoryStore, keywords: &[&str]) {
    let t0 = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
    for (i, kw) in keywords.iter().enumerate() {
        RawTrendStore::insert(
            store,
            NewRawTrend {
                source: "reddit".into(),
                keyword: kw.to_string(),
                title: Some(kw.to_string()),
                description: None,
                url: None,
                region: "IL".into(),
                language: "he".into(),
                popularity_score: 50,
                raw_data: json!({}),
                scraped_at: t0 + Duration::minutes(i as i64),
            },
        )
        .await
        .unwrap();
    }
}

fn orchestrator(store: &Arc<MemoryStore>, oracle: ScriptedOracle) -> ScoringOrchestrator {
    ScoringOrchestrator::new(
        store.clone(),
        store.clone(),
        Arc::new(oracle),
        ScoringConfig::default(),
    )
}

#[tokio::test]
async fn one_malformed_response_does_not_sink_the_batch() {
    let store = Arc::new(MemoryStore::new());
    seed(&store, &["k1", "k2", "k3", "k4", "k5"]).await;

    let mut answers = HashMap::new();
    for kw in ["k1", "k2", "k4", "k5"] {
        answers.insert(kw.to_string(), Ok(response(kw, [5, 5, 5, 5, 5])));
    }
    answers.insert("k3".to_string(), Ok("Sorry, I cannot help with that.".to_string()));

    let orch = orchestrator(&store, ScriptedOracle { answers });
    let outcome = orch.score_batch(20).await.unwrap();

    assert_eq!(outcome.requested, 20);
    assert_eq!(outcome.fetched, 5);
    assert_eq!(outcome.accepted.len(), 4);
    assert_eq!(outcome.failed(), 1);
    let (failed_id, failure) = &outcome.failures[0];
    assert_eq!(*failed_id, 3);
    assert!(matches!(
        failure,
        ItemFailure::Judgment(JudgmentError::NoStructuredData)
    ));

    let summary = orch.store_batch(&outcome).await;
    assert_eq!(summary.stored, 4);
    assert_eq!(summary.failed, 0);

    // the failed item stays unscored and is retried by the next batch
    let left = store.query_unscored(20).await.unwrap();
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].keyword, "k3");
}

#[tokio::test]
async fn oracle_faults_are_item_failures() {
    let store = Arc::new(MemoryStore::new());
    seed(&store, &["ok", "down"]).await;

    let mut answers = HashMap::new();
    answers.insert("ok".to_string(), Ok(response("ok", [8, 9, 3, 6, 10])));
    answers.insert("down".to_string(), Err(()));

    let orch = orchestrator(&store, ScriptedOracle { answers });
    let outcome = orch.score_batch(10).await.unwrap();
    assert_eq!(outcome.accepted.len(), 1);
    assert!(matches!(
        outcome.failures[0].1,
        ItemFailure::Oracle(OracleError::Status(500))
    ));
}

#[tokio::test]
async fn run_pass_persists_overall_score_and_reports_top() {
    let store = Arc::new(MemoryStore::new());
    seed(&store, &["low", "mid", "high"]).await;

    let mut answers = HashMap::new();
    answers.insert("low".to_string(), Ok(response("low", [1, 1, 1, 1, 1])));
    answers.insert("mid".to_string(), Ok(response("mid", [8, 9, 3, 6, 10])));
    answers.insert("high".to_string(), Ok(response("high", [10, 10, 10, 10, 10])));

    let orch = orchestrator(&store, ScriptedOracle { answers });
    let report = orch.run_pass().await.unwrap();

    assert_eq!(report.accepted, 3);
    assert_eq!(report.stored, 3);
    let top: Vec<&str> = report.top.iter().map(|j| j.topic.as_str()).collect();
    assert_eq!(top, vec!["high", "mid", "low"]);

    let mut scored = store.scored_trends().unwrap();
    scored.sort_by(|a, b| a.topic.cmp(&b.topic));
    let overall: Vec<(&str, i64)> = scored
        .iter()
        .map(|s| (s.topic.as_str(), s.overall_score))
        .collect();
    assert_eq!(overall, vec![("high", 10), ("low", 1), ("mid", 8)]);
    assert!(scored.iter().all(|s| s.status == "new"));
    assert!(store.query_unscored(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn newest_items_are_scored_first_up_to_the_limit() {
    let store = Arc::new(MemoryStore::new());
    seed(&store, &["old", "newer", "newest"]).await;

    let mut answers = HashMap::new();
    for kw in ["old", "newer", "newest"] {
        answers.insert(kw.to_string(), Ok(response(kw, [5, 5, 5, 5, 5])));
    }
    let orch = orchestrator(&store, ScriptedOracle { answers });
    let outcome = orch.score_batch(2).await.unwrap();
    let topics: Vec<&str> = outcome.accepted.iter().map(|j| j.topic.as_str()).collect();
    assert_eq!(topics, vec!["newest", "newer"]);
}

#[tokio::test]
async fn empty_store_is_a_quiet_no_op() {
    let store = Arc::new(MemoryStore::new());
    let orch = orchestrator(
        &store,
        ScriptedOracle {
            answers: HashMap::new(),
        },
    );
    let report = orch.run_pass().await.unwrap();
    assert_eq!(report.fetched, 0);
    assert!(report.top.is_empty());
}
