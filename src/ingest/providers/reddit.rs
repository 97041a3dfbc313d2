// src/ingest/providers/reddit.rs
//! Reddit listings: `rising` and `hot` per subreddit, public JSON endpoints.
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use metrics::{counter, histogram};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use crate::config::RedditConfig;
use crate::ingest::normalize_text;
use crate::ingest::types::{CandidateItem, SourceAdapter};

pub const SOURCE: &str = "reddit";
const BASE_URL: &str = "https://www.reddit.com";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Listing {
    Rising,
    Hot,
}

impl Listing {
    pub fn as_str(self) -> &'static str {
        match self {
            Listing::Rising => "rising",
            Listing::Hot => "hot",
        }
    }
}

#[derive(Debug, Deserialize)]
struct ListingResponse {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<Child>,
}

#[derive(Debug, Deserialize)]
struct Child {
    data: Post,
}

#[derive(Debug, Deserialize)]
struct Post {
    #[serde(default)]
    title: String,
    #[serde(default)]
    selftext: String,
    #[serde(default)]
    permalink: String,
    #[serde(default)]
    score: i64,
    #[serde(default)]
    num_comments: i64,
    #[serde(default)]
    upvote_ratio: Option<f64>,
    #[serde(default)]
    stickied: bool,
}

/// Parse one listing body into candidates. Stickied posts are dropped from `hot`.
pub fn parse_listing(subreddit: &str, listing: Listing, body: &str) -> Result<Vec<CandidateItem>> {
    let t0 = std::time::Instant::now();
    let resp: ListingResponse =
        serde_json::from_str(body).with_context(|| format!("r/{subreddit} {} json", listing.as_str()))?;

    let mut out = Vec::new();
    for child in resp.data.children {
        let post = child.data;
        if listing == Listing::Hot && post.stickied {
            continue;
        }
        let title = normalize_text(&post.title);
        if title.is_empty() {
            continue;
        }
        let url = if post.permalink.is_empty() {
            String::new()
        } else {
            format!("https://reddit.com{}", post.permalink)
        };
        out.push(
            CandidateItem::new(SOURCE, &title)
                .with_title(title.clone())
                .with_description(&normalize_text(&post.selftext))
                .with_url(url)
                .with_locale("global", "en")
                .with_popularity(post.score.clamp(0, 100))
                .with_payload(json!({
                    "type": format!("reddit_{}", listing.as_str()),
                    "subreddit": subreddit,
                    "score": post.score,
                    "num_comments": post.num_comments,
                    "upvote_ratio": post.upvote_ratio,
                })),
        );
    }

    histogram!("scanner_parse_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
    Ok(out)
}

pub struct RedditAdapter {
    cfg: RedditConfig,
    mode: Mode,
}

enum Mode {
    /// Stored bodies keyed by (subreddit, listing).
    Fixture(Vec<(String, Listing, String)>),
    Http {
        client: reqwest::Client,
        delay: Duration,
    },
}

impl RedditAdapter {
    pub fn from_fixtures(cfg: RedditConfig, bodies: Vec<(String, Listing, String)>) -> Self {
        Self {
            cfg,
            mode: Mode::Fixture(bodies),
        }
    }

    pub fn from_http(cfg: RedditConfig, client: reqwest::Client, delay: Duration) -> Self {
        Self {
            cfg,
            mode: Mode::Http { client, delay },
        }
    }

    fn requests(&self) -> Vec<(&str, Listing, u32)> {
        let mut v = Vec::new();
        for sub in &self.cfg.subreddits {
            v.push((sub.as_str(), Listing::Rising, self.cfg.rising_limit));
            v.push((sub.as_str(), Listing::Hot, self.cfg.hot_limit));
        }
        v
    }

    async fn body_for(&self, sub: &str, listing: Listing, limit: u32) -> Result<String> {
        match &self.mode {
            Mode::Fixture(bodies) => bodies
                .iter()
                .find(|(s, l, _)| s == sub && *l == listing)
                .map(|(_, _, b)| b.clone())
                .ok_or_else(|| anyhow!("no fixture for r/{sub} {}", listing.as_str())),
            Mode::Http { client, .. } => {
                let url = format!("{BASE_URL}/r/{sub}/{}.json?limit={limit}", listing.as_str());
                let resp = client.get(&url).send().await.context("reddit http get()")?;
                if !resp.status().is_success() {
                    return Err(anyhow!("r/{sub} {} returned HTTP {}", listing.as_str(), resp.status()));
                }
                resp.text().await.context("reddit http .text()")
            }
        }
    }
}

#[async_trait]
impl SourceAdapter for RedditAdapter {
    async fn fetch_latest(&self) -> Result<Vec<CandidateItem>> {
        let requests = self.requests();
        let mut out = Vec::new();
        let mut failures = 0usize;
        let mut last_err = None;

        for (i, (sub, listing, limit)) in requests.iter().enumerate() {
            if let Mode::Http { delay, .. } = &self.mode {
                if i > 0 {
                    tokio::time::sleep(*delay).await;
                }
            }
            let res = self
                .body_for(sub, *listing, *limit)
                .await
                .and_then(|b| parse_listing(sub, *listing, &b));
            match res {
                Ok(mut items) => out.append(&mut items),
                Err(e) => {
                    tracing::warn!(target: "ingest", error = ?e, subreddit = %sub, listing = listing.as_str(), "reddit listing failed");
                    counter!("scanner_adapter_errors_total").increment(1);
                    failures += 1;
                    last_err = Some(e);
                }
            }
        }

        match last_err {
            Some(e) if failures == requests.len() => Err(e.context("every reddit listing failed")),
            _ => Ok(out),
        }
    }

    fn name(&self) -> &str {
        SOURCE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = r#"{"data":{"children":[
        {"data":{"title":"Pinned rules","permalink":"/r/x/1","score":5000,"stickied":true}},
        {"data":{"title":"New local model beats GPT","selftext":"details","permalink":"/r/x/2","score":42,"num_comments":7}}
    ]}}"#;

    #[test]
    fn hot_skips_stickied_posts() {
        let items = parse_listing("x", Listing::Hot, BODY).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].keyword, "New local model beats GPT");
        assert_eq!(items[0].url.as_deref(), Some("https://reddit.com/r/x/2"));
        assert_eq!(items[0].popularity, 42);
    }

    #[test]
    fn rising_keeps_stickied_and_caps_popularity() {
        let items = parse_listing("x", Listing::Rising, BODY).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].popularity, 100);
        assert_eq!(items[0].payload["type"], "reddit_rising");
    }
}
