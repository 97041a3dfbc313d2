// src/ingest/types.rs
use anyhow::Result;
use serde_json::Value;

pub const MAX_KEYWORD_CHARS: usize = 200;
pub const MAX_DESCRIPTION_CHARS: usize = 500;

pub const DEFAULT_REGION: &str = "IL";
pub const DEFAULT_LANGUAGE: &str = "he";

/// One unvalidated item produced by a source adapter.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq)]
pub struct CandidateItem {
    pub source: String,  // e.g., "reddit", "israeli_news"
    pub keyword: String, // <= 200 chars
    pub title: Option<String>,
    pub description: Option<String>, // <= 500 chars
    pub url: Option<String>,
    pub region: String,
    pub language: String,
    pub popularity: i64,
    pub payload: Value,
}

impl CandidateItem {
    /// Build a candidate with default region/language and an empty payload.
    /// The keyword is trimmed and capped at [`MAX_KEYWORD_CHARS`].
    pub fn new(source: impl Into<String>, keyword: &str) -> Self {
        Self {
            source: source.into(),
            keyword: truncate_chars(keyword.trim(), MAX_KEYWORD_CHARS),
            title: None,
            description: None,
            url: None,
            region: DEFAULT_REGION.to_string(),
            language: DEFAULT_LANGUAGE.to_string(),
            popularity: 0,
            payload: Value::Null,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        let d = truncate_chars(description.trim(), MAX_DESCRIPTION_CHARS);
        self.description = (!d.is_empty()).then_some(d);
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        let url = url.into();
        self.url = (!url.is_empty()).then_some(url);
        self
    }

    pub fn with_locale(mut self, region: &str, language: &str) -> Self {
        self.region = region.to_string();
        self.language = language.to_string();
        self
    }

    pub fn with_popularity(mut self, popularity: i64) -> Self {
        self.popularity = popularity;
        self
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }
}

/// Truncate to at most `max` characters (not bytes).
pub fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Rank-based popularity used by ranked lists: #1 = 100, #2 = 95, floor 10.
pub fn rank_popularity(rank_zero_based: usize) -> i64 {
    let r = i64::try_from(rank_zero_based).unwrap_or(i64::MAX / 5);
    (100 - r.saturating_mul(5)).max(10)
}

#[async_trait::async_trait]
pub trait SourceAdapter: Send + Sync {
    async fn fetch_latest(&self) -> Result<Vec<CandidateItem>>;
    fn name(&self) -> &str;
}
