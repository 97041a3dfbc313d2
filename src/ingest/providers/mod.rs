// src/ingest/providers/mod.rs
pub mod reddit;
pub mod rss;
pub mod tiktok;

use anyhow::{Context, Result};
use std::time::Duration;

use crate::config::SourcesConfig;
use crate::ingest::types::SourceAdapter;

pub use reddit::RedditAdapter;
pub use rss::RssFeedAdapter;
pub use tiktok::TikTokAdapter;

/// Build the enabled HTTP adapters in their fixed run order:
/// feed groups as configured, then Reddit, then TikTok.
pub fn build_adapters(
    cfg: &SourcesConfig,
    request_timeout: Duration,
) -> Result<Vec<Box<dyn SourceAdapter>>> {
    let client = reqwest::Client::builder()
        .user_agent(cfg.user_agent.clone())
        .timeout(request_timeout)
        .build()
        .context("building http client")?;
    let delay = Duration::from_millis(cfg.polite_delay_ms);

    let mut out: Vec<Box<dyn SourceAdapter>> = Vec::new();
    for group in cfg.feed_groups.iter().filter(|g| g.enabled) {
        out.push(Box::new(RssFeedAdapter::from_http(
            group.clone(),
            client.clone(),
            delay,
        )));
    }
    if cfg.reddit.enabled {
        out.push(Box::new(RedditAdapter::from_http(
            cfg.reddit.clone(),
            client.clone(),
            delay,
        )));
    }
    if cfg.tiktok.enabled {
        out.push(Box::new(TikTokAdapter::from_http(cfg.tiktok.clone(), client)));
    }

    tracing::info!(
        target: "ingest",
        adapters = ?out.iter().map(|a| a.name().to_string()).collect::<Vec<_>>(),
        "source adapters ready"
    );
    Ok(out)
}
