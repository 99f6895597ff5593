// tests/ingest_prefilter.rs
use std::collections::{HashMap, HashSet};

use anyhow::Result;
use async_trait::async_trait;

use ai_digest_agent::config::{FeedsSection, FilterSection};
use ai_digest_agent::ingest;
use ai_digest_agent::ingest::types::{FeedItem, FeedProvider};

struct StaticFeed {
    url: String,
    items: Vec<FeedItem>,
}

#[async_trait]
impl FeedProvider for StaticFeed {
    async fn fetch(&self) -> Result<Vec<FeedItem>> {
        Ok(self.items.clone())
    }
    fn feed_url(&self) -> &str {
        &self.url
    }
}

struct BrokenFeed;

#[async_trait]
impl FeedProvider for BrokenFeed {
    async fn fetch(&self) -> Result<Vec<FeedItem>> {
        anyhow::bail!("connection refused")
    }
    fn feed_url(&self) -> &str {
        "https://broken.test/rss"
    }
}

fn item(feed: &str, link: &str, published_at: u64, title: &str) -> FeedItem {
    FeedItem {
        source_feed: feed.into(),
        title: title.into(),
        link: link.into(),
        published_at,
        summary: "summary text".into(),
    }
}

fn feeds(urls: &[&str], default_cap: usize) -> FeedsSection {
    FeedsSection {
        urls: urls.iter().map(|s| s.to_string()).collect(),
        default_cap,
        caps: HashMap::new(),
        skip: Vec::new(),
    }
}

#[tokio::test]
async fn recency_window_edge_is_inclusive() {
    let now = 1_000_000u64;
    let url = "https://a.test/rss";
    let window_h = 2u64;
    let providers: Vec<Box<dyn FeedProvider>> = vec![Box::new(StaticFeed {
        url: url.into(),
        items: vec![
            item(url, "https://a.test/edge", now - window_h * 3600, "Edge"),
            item(url, "https://a.test/stale", now - window_h * 3600 - 1, "Stale"),
            item(url, "https://a.test/fresh", now - 10, "Fresh"),
        ],
    })];
    let filter = FilterSection {
        recency_hours: window_h,
        required_keywords: vec![],
    };

    let out = ingest::run_once(&providers, &feeds(&[url], 10), &filter, &HashSet::new(), now).await;
    let links: Vec<&str> = out.items.iter().map(|i| i.link.as_str()).collect();
    assert_eq!(links, vec!["https://a.test/edge", "https://a.test/fresh"]);
    assert_eq!(out.stats.filtered_out, 1);
}

#[tokio::test]
async fn cap_yields_first_fifteen_in_feed_order() {
    let now = 1_000_000u64;
    let url = "https://a.test/rss";
    let items: Vec<FeedItem> = (0..30)
        .map(|i| item(url, &format!("https://a.test/{i}"), now - i, &format!("T{i}")))
        .collect();
    let providers: Vec<Box<dyn FeedProvider>> = vec![Box::new(StaticFeed {
        url: url.into(),
        items,
    })];
    let mut cfg = feeds(&[url], 10);
    cfg.caps.insert(url.to_string(), 15);

    let out = ingest::run_once(
        &providers,
        &cfg,
        &FilterSection::default(),
        &HashSet::new(),
        now,
    )
    .await;
    assert_eq!(out.items.len(), 15);
    assert_eq!(out.items[0].link, "https://a.test/0");
    assert_eq!(out.items[14].link, "https://a.test/14");
    assert_eq!(out.stats.capped_out, 15);
}

#[tokio::test]
async fn empty_keyword_list_excludes_nothing() {
    let now = 1_000u64;
    let url = "https://a.test/rss";
    let providers: Vec<Box<dyn FeedProvider>> = vec![Box::new(StaticFeed {
        url: url.into(),
        items: vec![
            item(url, "https://a.test/1", now - 1, "Completely unrelated gardening"),
            item(url, "https://a.test/2", now - 2, "LLM agents update"),
        ],
    })];
    let filter = FilterSection {
        recency_hours: 1,
        required_keywords: vec![],
    };
    let out = ingest::run_once(&providers, &feeds(&[url], 10), &filter, &HashSet::new(), now).await;
    assert_eq!(out.items.len(), 2);

    let filter_kw = FilterSection {
        recency_hours: 1,
        required_keywords: vec!["llm".into()],
    };
    let out2 =
        ingest::run_once(&providers, &feeds(&[url], 10), &filter_kw, &HashSet::new(), now).await;
    assert_eq!(out2.items.len(), 1);
    assert_eq!(out2.items[0].link, "https://a.test/2");
}

#[tokio::test]
async fn one_broken_feed_never_aborts_the_rest() {
    let now = 1_000u64;
    let ok_url = "https://a.test/rss";
    let providers: Vec<Box<dyn FeedProvider>> = vec![
        Box::new(BrokenFeed),
        Box::new(StaticFeed {
            url: ok_url.into(),
            items: vec![item(ok_url, "https://a.test/1", now - 1, "T")],
        }),
    ];
    let out = ingest::run_once(
        &providers,
        &feeds(&["https://broken.test/rss", ok_url], 10),
        &FilterSection {
            recency_hours: 1,
            required_keywords: vec![],
        },
        &HashSet::new(),
        now,
    )
    .await;
    assert_eq!(out.feed_errors, 1);
    assert_eq!(out.items.len(), 1);
}

#[tokio::test]
async fn skip_list_suppresses_a_feed() {
    let now = 1_000u64;
    let url = "https://a.test/rss";
    let providers: Vec<Box<dyn FeedProvider>> = vec![Box::new(StaticFeed {
        url: url.into(),
        items: vec![item(url, "https://a.test/1", now - 1, "T")],
    })];
    let mut cfg = feeds(&[url], 10);
    cfg.skip.push(url.to_string());

    let out = ingest::run_once(
        &providers,
        &cfg,
        &FilterSection {
            recency_hours: 1,
            required_keywords: vec![],
        },
        &HashSet::new(),
        now,
    )
    .await;
    assert!(out.items.is_empty());
    assert_eq!(out.feed_errors, 0);
}
