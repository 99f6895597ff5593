// tests/ingest_dedup.rs
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

fn item(feed: &str, link: &str, published_at: u64) -> FeedItem {
    FeedItem {
        source_feed: feed.into(),
        title: format!("Title {link}"),
        link: link.into(),
        published_at,
        summary: "s".into(),
    }
}

fn feeds(urls: &[&str]) -> FeedsSection {
    FeedsSection {
        urls: urls.iter().map(|s| s.to_string()).collect(),
        default_cap: 10,
        caps: HashMap::new(),
        skip: Vec::new(),
    }
}

const FILTER: FilterSection = FilterSection {
    recency_hours: 1,
    required_keywords: Vec::new(),
};

#[tokio::test]
async fn previously_seen_links_never_resurface() {
    let now = 10_000u64;
    let url = "https://a.test/rss";
    let providers: Vec<Box<dyn FeedProvider>> = vec![Box::new(StaticFeed {
        url: url.into(),
        items: vec![
            item(url, "https://a.test/already-sent", now - 5),
            item(url, "https://a.test/new", now - 5),
        ],
    })];

    let mut seen = HashSet::new();
    seen.insert("https://a.test/already-sent");
    let out = ingest::run_once(&providers, &feeds(&[url]), &FILTER, &seen, now).await;
    assert_eq!(out.items.len(), 1);
    assert_eq!(out.items[0].link, "https://a.test/new");
    assert_eq!(out.stats.dedup_out, 1);
}

#[tokio::test]
async fn same_link_across_two_feeds_appears_once() {
    let now = 10_000u64;
    let a = "https://a.test/rss";
    let b = "https://b.test/rss";
    let shared = "https://story.test/one";
    let providers: Vec<Box<dyn FeedProvider>> = vec![
        Box::new(StaticFeed {
            url: a.into(),
            items: vec![item(a, shared, now - 5)],
        }),
        Box::new(StaticFeed {
            url: b.into(),
            items: vec![item(b, shared, now - 4), item(b, "https://b.test/own", now - 3)],
        }),
    ];

    let out = ingest::run_once(&providers, &feeds(&[a, b]), &FILTER, &HashSet::new(), now).await;
    let links: Vec<&str> = out.items.iter().map(|i| i.link.as_str()).collect();
    // the first feed in configuration order wins the shared story
    assert_eq!(links, vec![shared, "https://b.test/own"]);
    assert_eq!(out.items[0].source_feed, a);
    assert_eq!(out.stats.dedup_out, 1);
}
