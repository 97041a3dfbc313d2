// src/ingest/providers/rss.rs
//! RSS / Atom feed groups (news portals, trending searches, product launches).
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use metrics::{counter, histogram};
use quick_xml::de::from_str;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use time::{format_description::well_known::Rfc2822, OffsetDateTime, UtcOffset};

use crate::config::{FeedConfig, FeedGroupConfig};
use crate::ingest::normalize_text;
use crate::ingest::types::{rank_popularity, CandidateItem, SourceAdapter};

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomFeed {
    #[serde(rename = "entry", default)]
    entry: Vec<AtomEntry>,
}

#[derive(Debug, Deserialize)]
struct AtomEntry {
    title: Option<AtomText>,
    #[serde(default)]
    link: Vec<AtomLink>,
    summary: Option<AtomText>,
    content: Option<AtomText>,
    published: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomText {
    #[serde(rename = "$text", default)]
    value: String,
}

#[derive(Debug, Deserialize)]
struct AtomLink {
    #[serde(rename = "@href")]
    href: Option<String>,
}

/// Feed item reduced to the fields we use, independent of RSS vs Atom.
struct FeedEntry {
    title: String,
    description: String,
    link: String,
    published: String,
}

fn parse_rfc2822_to_unix(ts: &str) -> u64 {
    OffsetDateTime::parse(ts, &Rfc2822)
        .ok()
        .map(|dt| dt.to_offset(UtcOffset::UTC).unix_timestamp())
        .and_then(|x| u64::try_from(x).ok())
        .unwrap_or(0)
}

fn parse_entries(xml: &str) -> Result<Vec<FeedEntry>> {
    let xml_clean = scrub_html_entities_for_xml(xml);
    if let Ok(rss) = from_str::<Rss>(&xml_clean) {
        return Ok(rss
            .channel
            .item
            .into_iter()
            .map(|it| FeedEntry {
                title: it.title.unwrap_or_default(),
                description: it.description.unwrap_or_default(),
                link: it.link.unwrap_or_default(),
                published: it.pub_date.unwrap_or_default(),
            })
            .collect());
    }
    let atom: AtomFeed = from_str(&xml_clean).context("parsing feed xml (neither RSS nor Atom)")?;
    Ok(atom
        .entry
        .into_iter()
        .map(|e| FeedEntry {
            title: e.title.map(|t| t.value).unwrap_or_default(),
            description: e
                .summary
                .or(e.content)
                .map(|t| t.value)
                .unwrap_or_default(),
            link: e.link.into_iter().find_map(|l| l.href).unwrap_or_default(),
            published: e.published.unwrap_or_default(),
        })
        .collect())
}

pub struct RssFeedAdapter {
    group: FeedGroupConfig,
    mode: Mode,
}

enum Mode {
    /// One stored body per configured feed, same order.
    Fixture(Vec<String>),
    Http {
        client: reqwest::Client,
        delay: Duration,
    },
}

impl RssFeedAdapter {
    pub fn from_fixtures(group: FeedGroupConfig, bodies: Vec<String>) -> Self {
        Self {
            group,
            mode: Mode::Fixture(bodies),
        }
    }

    pub fn from_http(group: FeedGroupConfig, client: reqwest::Client, delay: Duration) -> Self {
        Self {
            group,
            mode: Mode::Http { client, delay },
        }
    }

    fn parse_feed(&self, feed: &FeedConfig, xml: &str) -> Result<Vec<CandidateItem>> {
        let t0 = std::time::Instant::now();
        let entries = parse_entries(xml).with_context(|| format!("feed {}", feed.name))?;
        let language = feed.language.as_deref().unwrap_or(&self.group.language);
        let filter: Vec<String> = self
            .group
            .keyword_filter
            .iter()
            .map(|k| k.to_lowercase())
            .collect();

        let mut out = Vec::new();
        for (rank, e) in entries.into_iter().take(self.group.max_items).enumerate() {
            let title = normalize_text(&e.title);
            if title.is_empty() {
                continue;
            }
            let description = normalize_text(&e.description);
            if !filter.is_empty() {
                let haystack = format!("{title} {description}").to_lowercase();
                if !filter.iter().any(|k| haystack.contains(k.as_str())) {
                    continue;
                }
            }
            let popularity = self
                .group
                .fixed_popularity
                .unwrap_or_else(|| rank_popularity(rank));
            out.push(
                CandidateItem::new(self.group.source.as_str(), &title)
                    .with_title(title.clone())
                    .with_description(&description)
                    .with_url(e.link.trim())
                    .with_locale(&self.group.region, language)
                    .with_popularity(popularity)
                    .with_payload(json!({
                        "type": self.group.source,
                        "source_name": feed.name,
                        "rank": rank + 1,
                        "published": e.published,
                        "published_unix": parse_rfc2822_to_unix(e.published.trim()),
                    })),
            );
        }

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("scanner_parse_ms").record(ms);
        Ok(out)
    }

    async fn fetch_body(client: &reqwest::Client, url: &str) -> Result<String> {
        let resp = client.get(url).send().await.context("feed http get()")?;
        if !resp.status().is_success() {
            return Err(anyhow!("feed returned HTTP {}", resp.status()));
        }
        resp.text().await.context("feed http .text()")
    }
}

#[async_trait]
impl SourceAdapter for RssFeedAdapter {
    async fn fetch_latest(&self) -> Result<Vec<CandidateItem>> {
        let mut out = Vec::new();
        let mut failures = 0usize;
        let mut last_err = None;

        for (i, feed) in self.group.feeds.iter().enumerate() {
            let body = match &self.mode {
                Mode::Fixture(bodies) => bodies.get(i).cloned().ok_or_else(|| {
                    anyhow!("no fixture body for feed {}", feed.name)
                }),
                Mode::Http { client, delay } => {
                    if i > 0 {
                        tokio::time::sleep(*delay).await;
                    }
                    Self::fetch_body(client, &feed.url).await
                }
            };

            match body.and_then(|b| self.parse_feed(feed, &b)) {
                Ok(mut items) => {
                    if items.is_empty() {
                        tracing::info!(target: "ingest", feed = %feed.name, "no entries, feed may be unavailable");
                    }
                    out.append(&mut items);
                }
                Err(e) => {
                    tracing::warn!(target: "ingest", error = ?e, feed = %feed.name, source = %self.group.source, "feed error");
                    counter!("scanner_adapter_errors_total").increment(1);
                    failures += 1;
                    last_err = Some(e);
                }
            }
        }

        match last_err {
            Some(e) if failures == self.group.feeds.len() => Err(e.context("every feed failed")),
            _ => Ok(out),
        }
    }

    fn name(&self) -> &str {
        &self.group.source
    }
}

/// Entities that are valid HTML but undefined in XML.
fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
        .replace("&hellip;", "...")
}
