// src/ingest/rss.rs
//! RSS 2.0 provider. One instance per configured feed URL; fetch errors
//! surface as `Err` and the caller decides that the feed is skipped.

use anyhow::{Context, Result};
use async_trait::async_trait;
use metrics::{counter, histogram};
use quick_xml::de::from_str;
use serde::Deserialize;
use std::time::Duration;
use time::{format_description::well_known::Rfc2822, OffsetDateTime, UtcOffset};

use crate::ingest::types::{FeedItem, FeedProvider};

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

fn parse_rfc2822_to_unix(ts: &str) -> u64 {
    OffsetDateTime::parse(ts, &Rfc2822)
        .ok()
        .map(|dt| dt.to_offset(UtcOffset::UTC).unix_timestamp())
        .and_then(|x| u64::try_from(x).ok())
        .unwrap_or(0)
}

pub struct RssFeedProvider {
    url: String,
    mode: Mode,
}

enum Mode {
    /// Canned XML body, used by tests and offline runs.
    Fixture(String),
    Http { client: reqwest::Client },
}

impl RssFeedProvider {
    pub fn from_url(url: &str, connect_timeout: Duration, request_timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .user_agent("ai-digest-agent/0.1")
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .build()
            .unwrap_or_default();
        Self {
            url: url.to_string(),
            mode: Mode::Http { client },
        }
    }

    pub fn from_fixture_str(url: &str, body: &str) -> Self {
        Self {
            url: url.to_string(),
            mode: Mode::Fixture(body.to_string()),
        }
    }

    fn parse_items_from_str(&self, s: &str) -> Result<Vec<FeedItem>> {
        let t0 = std::time::Instant::now();
        let xml_clean = scrub_html_entities_for_xml(s);
        let rss: Rss = from_str(&xml_clean)
            .with_context(|| format!("parsing rss xml from {}", self.url))?;

        let mut out = Vec::with_capacity(rss.channel.item.len());
        for it in rss.channel.item {
            // No link means no identity; such entries can never be deduped
            // across runs, so they are dropped here.
            let Some(link) = it.link.filter(|l| !l.trim().is_empty()) else {
                continue;
            };
            let title = crate::ingest::normalize_text(it.title.as_deref().unwrap_or_default());
            let summary =
                crate::ingest::normalize_text(it.description.as_deref().unwrap_or_default());
            if title.is_empty() && summary.is_empty() {
                continue;
            }

            out.push(FeedItem {
                source_feed: self.url.clone(),
                title,
                link: link.trim().to_string(),
                published_at: it
                    .pub_date
                    .as_deref()
                    .map(parse_rfc2822_to_unix)
                    .unwrap_or(0),
                summary,
            });
        }

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("ingest_parse_ms").record(ms);
        counter!("ingest_entries_total").increment(out.len() as u64);
        Ok(out)
    }
}

#[async_trait]
impl FeedProvider for RssFeedProvider {
    async fn fetch(&self) -> Result<Vec<FeedItem>> {
        match &self.mode {
            Mode::Fixture(s) => self.parse_items_from_str(s),
            Mode::Http { client } => {
                let body = match client.get(&self.url).send().await {
                    Ok(resp) => {
                        let resp = resp
                            .error_for_status()
                            .with_context(|| format!("feed http status {}", self.url))?;
                        resp.text()
                            .await
                            .with_context(|| format!("feed http body {}", self.url))?
                    }
                    Err(e) => {
                        return Err(e).with_context(|| format!("feed http get {}", self.url));
                    }
                };
                self.parse_items_from_str(&body)
            }
        }
    }

    fn feed_url(&self) -> &str {
        &self.url
    }
}

// quick-xml chokes on bare HTML entities inside descriptions; map the
// common ones to plain characters before deserializing.
fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
}
