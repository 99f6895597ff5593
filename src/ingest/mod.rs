// src/ingest/mod.rs
pub mod rss;
pub mod types;

use std::collections::HashSet;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge};
use once_cell::sync::OnceCell;

use crate::config::{FeedsSection, FilterSection};
use crate::ingest::types::{FeedItem, FeedProvider};

/// One-time metrics registration (so series carry descriptions when a
/// recorder is installed by the host).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_entries_total", "Entries parsed from feeds.");
        describe_counter!("ingest_kept_total", "Entries kept after pre-filtering.");
        describe_counter!(
            "ingest_filtered_total",
            "Entries dropped by recency/keyword rules."
        );
        describe_counter!(
            "ingest_dedup_total",
            "Entries dropped as already seen or repeated in-run."
        );
        describe_counter!(
            "ingest_capped_total",
            "Entries dropped by the per-feed cap."
        );
        describe_counter!("ingest_feed_errors_total", "Feed fetch/parse errors.");
        describe_histogram!("ingest_parse_ms", "Feed parse time in milliseconds.");
        describe_gauge!("ingest_last_run_ts", "Unix ts when ingest last ran.");
    });
}

/// Normalize text: decode HTML entities, strip tags, collapse whitespace,
/// cap length so prompts stay bounded.
pub fn normalize_text(s: &str) -> String {
    let mut out = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, " ").to_string();

    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").trim().to_string();

    if out.chars().count() > 2000 {
        out = out.chars().take(2000).collect();
    }
    out
}

/// Empty keyword list disables the keyword gate entirely.
pub fn matches_keywords(item: &FeedItem, keywords_lower: &[String]) -> bool {
    if keywords_lower.is_empty() {
        return true;
    }
    let title = item.title.to_lowercase();
    let summary = item.summary.to_lowercase();
    keywords_lower
        .iter()
        .any(|k| title.contains(k.as_str()) || summary.contains(k.as_str()))
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PrefilterStats {
    pub fetched: usize,
    pub kept: usize,
    pub filtered_out: usize,
    pub dedup_out: usize,
    pub capped_out: usize,
}

/// Deterministic pre-filter for one feed's entries, in feed document order:
/// recency window (inclusive at the boundary), keyword gate, seen-set and
/// in-run dedup, then the per-feed cap keeps the first `cap` survivors.
pub fn prefilter_feed(
    entries: Vec<FeedItem>,
    now: u64,
    recency_hours: u64,
    keywords_lower: &[String],
    cap: usize,
    seen: &HashSet<&str>,
    seen_this_run: &mut HashSet<String>,
) -> (Vec<FeedItem>, PrefilterStats) {
    let window_secs = recency_hours.saturating_mul(3600);
    let mut stats = PrefilterStats {
        fetched: entries.len(),
        ..Default::default()
    };

    let mut kept = Vec::new();
    for item in entries {
        let age = now.saturating_sub(item.published_at);
        // An item exactly at the window edge is included.
        let in_window = age <= window_secs && item.published_at <= now && item.published_at > 0;
        if !in_window || !matches_keywords(&item, keywords_lower) {
            stats.filtered_out += 1;
            continue;
        }
        if seen.contains(item.link.as_str()) || !seen_this_run.insert(item.link.clone()) {
            stats.dedup_out += 1;
            continue;
        }
        if kept.len() >= cap {
            stats.capped_out += 1;
            continue;
        }
        kept.push(item);
    }

    stats.kept = kept.len();
    (kept, stats)
}

#[derive(Debug, Default)]
pub struct IngestOutcome {
    /// Surviving items, feeds in configuration order, entries in feed order.
    pub items: Vec<FeedItem>,
    pub stats: PrefilterStats,
    pub feed_errors: usize,
}

/// Run ingestion once across all providers. A failing feed is logged and
/// skipped; it never aborts the run.
pub async fn run_once(
    providers: &[Box<dyn FeedProvider>],
    feeds: &FeedsSection,
    filter: &FilterSection,
    seen: &HashSet<&str>,
    now: u64,
) -> IngestOutcome {
    ensure_metrics_described();

    let keywords_lower: Vec<String> = filter
        .required_keywords
        .iter()
        .map(|k| k.to_lowercase())
        .collect();

    let mut out = IngestOutcome::default();
    let mut seen_this_run: HashSet<String> = HashSet::new();

    for p in providers {
        let url = p.feed_url();
        if feeds.is_skipped(url) {
            tracing::debug!(feed = url, "feed on skip list");
            continue;
        }
        let entries = match p.fetch().await {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = ?e, feed = url, "feed fetch failed; skipping");
                counter!("ingest_feed_errors_total").increment(1);
                out.feed_errors += 1;
                continue;
            }
        };

        let (mut kept, stats) = prefilter_feed(
            entries,
            now,
            filter.recency_hours,
            &keywords_lower,
            feeds.cap_for(url),
            seen,
            &mut seen_this_run,
        );
        tracing::info!(
            feed = url,
            fetched = stats.fetched,
            kept = stats.kept,
            filtered = stats.filtered_out,
            dedup = stats.dedup_out,
            capped = stats.capped_out,
            "feed pre-filtered"
        );

        out.stats.fetched += stats.fetched;
        out.stats.kept += stats.kept;
        out.stats.filtered_out += stats.filtered_out;
        out.stats.dedup_out += stats.dedup_out;
        out.stats.capped_out += stats.capped_out;
        out.items.append(&mut kept);
    }

    counter!("ingest_kept_total").increment(out.stats.kept as u64);
    counter!("ingest_filtered_total").increment(out.stats.filtered_out as u64);
    counter!("ingest_dedup_total").increment(out.stats.dedup_out as u64);
    counter!("ingest_capped_total").increment(out.stats.capped_out as u64);
    gauge!("ingest_last_run_ts").set(now as f64);

    out
}
