// src/ingest/types.rs
use anyhow::Result;

/// One feed entry as produced by ingestion. Immutable afterward; `link`
/// is the identity used for all deduplication.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct FeedItem {
    pub source_feed: String,
    pub title: String,
    pub link: String,
    pub published_at: u64, // unix seconds
    pub summary: String,
}

#[async_trait::async_trait]
pub trait FeedProvider: Send + Sync {
    async fn fetch(&self) -> Result<Vec<FeedItem>>;
    /// The configured feed URL; used for cap lookups and log context.
    fn feed_url(&self) -> &str;
}
