// src/ingest/providers/tiktok.rs
//! TikTok Creative Center hashtag ranking. The response shape drifts, so
//! both the list key and the name key are looked up leniently.
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use metrics::histogram;
use serde_json::{json, Value};

use crate::config::TikTokConfig;
use crate::ingest::types::{rank_popularity, CandidateItem, SourceAdapter};

pub const SOURCE: &str = "tiktok";
const ENDPOINT: &str = "https://ads.tiktok.com/creative_radar_api/v1/popular_trend/hashtag/list";

const LIST_KEYS: [&str; 2] = ["list", "hashtag_list"];
const NAME_KEYS: [&str; 3] = ["hashtag_name", "name", "tag_name"];

fn first_str<'a>(v: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|k| v.get(*k).and_then(Value::as_str))
}

/// Parse a ranking body into candidates, rank order preserved.
pub fn parse_hashtags(body: &str, region: &str) -> Result<Vec<CandidateItem>> {
    let t0 = std::time::Instant::now();
    let v: Value = serde_json::from_str(body).context("tiktok json")?;
    let data = v.get("data").ok_or_else(|| anyhow!("tiktok response has no data"))?;
    let list = LIST_KEYS
        .iter()
        .find_map(|k| data.get(*k).and_then(Value::as_array))
        .ok_or_else(|| anyhow!("tiktok response has no hashtag list"))?;

    let mut out = Vec::new();
    for (rank, entry) in list.iter().enumerate() {
        let Some(name) = first_str(entry, &NAME_KEYS) else {
            continue;
        };
        let tag = name.trim().trim_start_matches('#').trim();
        if tag.is_empty() {
            continue;
        }
        out.push(
            CandidateItem::new(SOURCE, tag)
                .with_title(format!("#{tag}"))
                .with_description(&format!(
                    "Trending TikTok hashtag (rank #{} this week)",
                    rank + 1
                ))
                .with_url(format!("https://www.tiktok.com/tag/{tag}"))
                .with_locale(region, "he")
                .with_popularity(rank_popularity(rank))
                .with_payload(json!({
                    "type": "tiktok_hashtag",
                    "rank": rank + 1,
                    "publish_cnt": entry.get("publish_cnt").cloned().unwrap_or(Value::Null),
                    "video_views": entry.get("video_views").cloned().unwrap_or(Value::Null),
                })),
        );
    }

    histogram!("scanner_parse_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
    Ok(out)
}

pub struct TikTokAdapter {
    cfg: TikTokConfig,
    mode: Mode,
}

enum Mode {
    Fixture(String),
    Http { client: reqwest::Client },
}

impl TikTokAdapter {
    pub fn from_fixture(cfg: TikTokConfig, body: impl Into<String>) -> Self {
        Self {
            cfg,
            mode: Mode::Fixture(body.into()),
        }
    }

    pub fn from_http(cfg: TikTokConfig, client: reqwest::Client) -> Self {
        Self {
            cfg,
            mode: Mode::Http { client },
        }
    }
}

#[async_trait]
impl SourceAdapter for TikTokAdapter {
    async fn fetch_latest(&self) -> Result<Vec<CandidateItem>> {
        let body = match &self.mode {
            Mode::Fixture(s) => s.clone(),
            Mode::Http { client } => {
                let period = self.cfg.period_days.to_string();
                let limit = self.cfg.limit.to_string();
                let resp = client
                    .get(ENDPOINT)
                    .query(&[
                        ("period", period.as_str()),
                        ("page", "1"),
                        ("limit", limit.as_str()),
                        ("country_code", self.cfg.country_code.as_str()),
                    ])
                    .header("Accept", "application/json")
                    .send()
                    .await
                    .context("tiktok http get()")?;
                if !resp.status().is_success() {
                    return Err(anyhow!("tiktok returned HTTP {}", resp.status()));
                }
                resp.text().await.context("tiktok http .text()")?
            }
        };
        let items = parse_hashtags(&body, &self.cfg.country_code)?;
        if items.is_empty() {
            tracing::info!(target: "ingest", "tiktok returned no hashtags");
        }
        Ok(items)
    }

    fn name(&self) -> &str {
        SOURCE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_alternate_keys_and_strips_hash() {
        let body = r##"{"data":{"hashtag_list":[
            {"tag_name":"#aitools","publish_cnt":1200},
            {"name":"  "},
            {"hashtag_name":"chatgpt","video_views":99}
        ]}}"##;
        let items = parse_hashtags(body, "IL").unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].keyword, "aitools");
        assert_eq!(items[0].title.as_deref(), Some("#aitools"));
        assert_eq!(items[0].popularity, 100);
        // rank is positional, blanks still consume a slot
        assert_eq!(items[1].popularity, 90);
        assert_eq!(items[1].payload["rank"], 3);
    }

    #[test]
    fn missing_list_is_an_error() {
        assert!(parse_hashtags(r#"{"data":{}}"#, "IL").is_err());
    }
}
