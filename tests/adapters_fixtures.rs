// tests/adapters_fixtures.rs
use trend_scanner::config::{FeedConfig, FeedGroupConfig, RedditConfig, TikTokConfig};
use trend_scanner::ingest::providers::reddit::Listing;
use trend_scanner::ingest::providers::{RedditAdapter, RssFeedAdapter, TikTokAdapter};
use trend_scanner::ingest::types::SourceAdapter;

fn group(source: &str, feeds: usize) -> FeedGroupConfig {
    FeedGroupConfig {
        source: source.into(),
        enabled: true,
        region: "IL".into(),
        language: "he".into(),
        max_items: 15,
        fixed_popularity: Some(60),
        keyword_filter: Vec::new(),
        feeds: (0..feeds)
            .map(|i| FeedConfig {
                name: format!("feed-{i}"),
                url: format!("https://feed{i}.example.test/rss"),
                language: None,
            })
            .collect(),
    }
}

#[tokio::test]
async fn rss_fixture_normalizes_and_skips_blank_titles() {
    let xml = include_str!("fixtures/news_rss.xml");
    let p = RssFeedAdapter::from_fixtures(group("israeli_news", 1), vec![xml.to_string()]);
    let items = p.fetch_latest().await.unwrap();

    assert_eq!(p.name(), "israeli_news");
    assert_eq!(items.len(), 3);
    assert_eq!(items[0].keyword, "OpenAI launches a Hebrew voice mode");
    assert_eq!(
        items[0].description.as_deref(),
        Some("The new mode & its pricing were announced today.")
    );
    assert_eq!(items[0].url.as_deref(), Some("https://news.example.test/a/1"));
    assert!(items.iter().all(|c| c.popularity == 60 && c.source == "israeli_news"));
    assert_eq!(items[1].payload["rank"], 2);
    assert_eq!(items[1].payload["source_name"], "feed-0");
}

#[tokio::test]
async fn rank_based_popularity_when_not_fixed() {
    let xml = include_str!("fixtures/news_rss.xml");
    let mut g = group("google_trends", 1);
    g.fixed_popularity = None;
    g.max_items = 2;
    let p = RssFeedAdapter::from_fixtures(g, vec![xml.to_string()]);
    let items = p.fetch_latest().await.unwrap();
    let pops: Vec<i64> = items.iter().map(|c| c.popularity).collect();
    assert_eq!(pops, vec![100, 95]);
}

#[tokio::test]
async fn atom_feed_with_keyword_filter() {
    let xml = include_str!("fixtures/launches_atom.xml");
    let mut g = group("producthunt", 1);
    g.region = "global".into();
    g.language = "en".into();
    g.fixed_popularity = Some(70);
    g.keyword_filter = vec!["AI".into(), "agent".into()];
    let p = RssFeedAdapter::from_fixtures(g, vec![xml.to_string()]);
    let items = p.fetch_latest().await.unwrap();

    assert_eq!(items.len(), 1);
    assert_eq!(items[0].keyword, "PromptPilot");
    assert_eq!(
        items[0].description.as_deref(),
        Some("An AI copilot for spreadsheets")
    );
    assert_eq!(items[0].region, "global");
    assert_eq!(items[0].language, "en");
    assert_eq!(items[0].popularity, 70);
}

#[tokio::test]
async fn one_broken_feed_does_not_sink_the_group() {
    let xml = include_str!("fixtures/news_rss.xml");
    let p = RssFeedAdapter::from_fixtures(
        group("israeli_news", 2),
        vec!["<rss><channel><item><title>broken".to_string(), xml.to_string()],
    );
    let items = p.fetch_latest().await.unwrap();
    assert_eq!(items.len(), 3);
}

#[tokio::test]
async fn every_feed_broken_is_an_adapter_error() {
    let p = RssFeedAdapter::from_fixtures(
        group("israeli_news", 1),
        vec!["<rss><channel><item><title>broken".into()],
    );
    assert!(p.fetch_latest().await.is_err());
}

#[tokio::test]
async fn reddit_fixture_merges_rising_and_hot() {
    let cfg = RedditConfig {
        enabled: true,
        subreddits: vec!["LocalLLaMA".into()],
        rising_limit: 10,
        hot_limit: 5,
    };
    let p = RedditAdapter::from_fixtures(
        cfg,
        vec![
            (
                "LocalLLaMA".into(),
                Listing::Rising,
                include_str!("fixtures/reddit_rising.json").into(),
            ),
            (
                "LocalLLaMA".into(),
                Listing::Hot,
                include_str!("fixtures/reddit_hot.json").into(),
            ),
        ],
    );
    let items = p.fetch_latest().await.unwrap();
    let keywords: Vec<&str> = items.iter().map(|c| c.keyword.as_str()).collect();
    assert_eq!(
        keywords,
        vec![
            "Agents that book your flights",
            "New 8B model tops the leaderboard",
            "Running Whisper on a Raspberry Pi",
        ]
    );
    assert_eq!(items[1].popularity, 100);
    assert_eq!(items[2].popularity, 37);
    assert_eq!(
        items[1].url.as_deref(),
        Some("https://reddit.com/r/LocalLLaMA/comments/bbb/new_8b/")
    );
    assert_eq!(items[1].payload["subreddit"], "LocalLLaMA");
    assert_eq!(items[1].payload["num_comments"], 120);
    assert_eq!(items[1].payload["type"], "reddit_hot");
}

#[tokio::test]
async fn tiktok_fixture_ranks_and_strips_hash() {
    let p = TikTokAdapter::from_fixture(
        TikTokConfig::default(),
        include_str!("fixtures/tiktok_hashtags.json"),
    );
    let items = p.fetch_latest().await.unwrap();
    let keywords: Vec<&str> = items.iter().map(|c| c.keyword.as_str()).collect();
    assert_eq!(keywords, vec!["aitools", "chatgpt", "israel"]);
    assert_eq!(items[1].title.as_deref(), Some("#chatgpt"));
    assert_eq!(
        items[2].description.as_deref(),
        Some("Trending TikTok hashtag (rank #3 this week)")
    );
    let pops: Vec<i64> = items.iter().map(|c| c.popularity).collect();
    assert_eq!(pops, vec![100, 95, 90]);
    assert_eq!(items[0].payload["publish_cnt"], 15400);
}
