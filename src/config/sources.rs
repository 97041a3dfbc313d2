// src/config/sources.rs
//! Which source adapters run, and with what feeds/lists.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct FeedConfig {
    pub name: String,
    pub url: String,
    /// Overrides the group language for this feed.
    #[serde(default)]
    pub language: Option<String>,
}

/// A group of RSS feeds emitted under one source tag.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct FeedGroupConfig {
    /// Source tag recorded on every item, e.g. "israeli_news".
    pub source: String,
    #[serde(default = "enabled")]
    pub enabled: bool,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default = "default_language")]
    pub language: String,
    /// Latest N items taken from each feed.
    #[serde(default = "default_max_items")]
    pub max_items: usize,
    /// Fixed popularity for every item; `None` means rank-based.
    #[serde(default)]
    pub fixed_popularity: Option<i64>,
    /// Keep only items whose title/description mention one of these.
    #[serde(default)]
    pub keyword_filter: Vec<String>,
    pub feeds: Vec<FeedConfig>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct RedditConfig {
    pub enabled: bool,
    pub subreddits: Vec<String>,
    pub rising_limit: u32,
    pub hot_limit: u32,
}

impl Default for RedditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            subreddits: [
                "artificial",
                "ChatGPT",
                "LocalLLaMA",
                "MachineLearning",
                "singularity",
                "StableDiffusion",
                "Israel",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            rising_limit: 10,
            hot_limit: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct TikTokConfig {
    pub enabled: bool,
    pub country_code: String,
    pub period_days: u32,
    pub limit: u32,
}

impl Default for TikTokConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            country_code: "IL".into(),
            period_days: 7,
            limit: 20,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct SourcesConfig {
    pub user_agent: String,
    /// Pause between consecutive HTTP requests of one adapter.
    pub polite_delay_ms: u64,
    pub feed_groups: Vec<FeedGroupConfig>,
    pub reddit: RedditConfig,
    pub tiktok: TikTokConfig,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            user_agent: "TrendScanner/1.0 (content research)".into(),
            polite_delay_ms: 2_000,
            feed_groups: default_feed_groups(),
            reddit: RedditConfig::default(),
            tiktok: TikTokConfig::default(),
        }
    }
}

fn enabled() -> bool {
    true
}
fn default_region() -> String {
    "IL".into()
}
fn default_language() -> String {
    "he".into()
}
fn default_max_items() -> usize {
    15
}

fn feed(name: &str, url: &str) -> FeedConfig {
    FeedConfig {
        name: name.into(),
        url: url.into(),
        language: None,
    }
}

fn default_feed_groups() -> Vec<FeedGroupConfig> {
    vec![
        FeedGroupConfig {
            source: "google_trends".into(),
            enabled: true,
            region: "IL".into(),
            language: "he".into(),
            max_items: 20,
            fixed_popularity: None,
            keyword_filter: Vec::new(),
            feeds: vec![feed(
                "Google Trends IL",
                "https://trends.google.com/trending/rss?geo=IL",
            )],
        },
        FeedGroupConfig {
            source: "israeli_news".into(),
            enabled: true,
            region: "IL".into(),
            language: "he".into(),
            max_items: 15,
            fixed_popularity: Some(60),
            keyword_filter: Vec::new(),
            feeds: vec![
                feed("Ynet", "https://www.ynet.co.il/Integration/StoryRss2.xml"),
                feed("Walla News", "https://rss.walla.co.il/feed/1"),
                feed("Geektime", "https://www.geektime.co.il/feed/"),
                feed(
                    "Calcalist Tech",
                    "https://www.calcalist.co.il/GeneralRSS/0,16335,L-8,00.xml",
                ),
                feed(
                    "Globes Tech",
                    "https://www.globes.co.il/webservice/rss/rssfeeder.asmx/FeederC?iID=585",
                ),
            ],
        },
        FeedGroupConfig {
            source: "producthunt".into(),
            enabled: true,
            region: "global".into(),
            language: "en".into(),
            max_items: 20,
            fixed_popularity: Some(70),
            keyword_filter: [
                "ai",
                "gpt",
                "llm",
                "machine learning",
                "automation",
                "chatbot",
                "copilot",
                "generative",
                "neural",
                "model",
                "agent",
                "assistant",
                "artificial intelligence",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            feeds: vec![feed("Product Hunt", "https://www.producthunt.com/feed")],
        },
    ]
}
