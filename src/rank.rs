// src/rank.rs
//! Relevance filter: one ranking call over all pre-filtered items, strict
//! parse of the returned JSON. A reply we cannot parse is a
//! `MalformedResponse`, which the pipeline downgrades to an empty ranked
//! set: the digest shrinks, the run continues.

use std::collections::HashMap;

use serde::Deserialize;

use crate::ai::{DynModelClient, GenRequest, UsageMeter};
use crate::error::DigestError;
use crate::ingest::types::FeedItem;

const SNIPPET_MAX_CHARS: usize = 500;

/// FeedItem plus the model-assigned relevance fields.
#[derive(Debug, Clone)]
pub struct RankedItem {
    pub item: FeedItem,
    /// 1..=10, clamped on parse.
    pub score: u8,
    /// Free-form tag from the model ("News", "Tutorial/Guide", ...).
    pub content_kind: String,
    pub justification: String,
    pub keywords: Vec<String>,
}

impl RankedItem {
    /// Tutorial-flavored items get their own digest section.
    pub fn is_tutorial(&self) -> bool {
        self.content_kind.to_lowercase().contains("tutorial")
    }
}

fn ranking_prompt(prefs: &str, items: &[FeedItem], top_n: usize) -> String {
    let mut lines = String::new();
    for item in items {
        let snippet: String = item.summary.chars().take(SNIPPET_MAX_CHARS).collect();
        lines.push_str(&format!(
            "- Title: {}\n  URL: {}\n  Snippet: {}\n  Source Feed: {}\n",
            item.title, item.link, snippet, item.source_feed
        ));
    }

    format!(
        "You are an assistant curating a daily digest for this reader:\n{prefs}\n\n\
         Analyze the following items fetched from RSS feeds. Prioritize by the reader's \
         interests; feeds listed earlier are higher priority. Filter out low-signal noise, \
         marketing fluff, and duplicates aggressively.\n\n\
         For the TOP {top_n} most relevant items, output a JSON list of objects with exactly \
         these fields:\n\
         - \"url\": original URL\n\
         - \"relevance_score\": integer 1-10, 10 = most relevant\n\
         - \"justification\": one short sentence\n\
         - \"content_type\": one of \"News\", \"Research\", \"Tutorial/Guide\", \"Opinion\", \
           \"Market/Competitor Info\", \"Company Update\", \"Other\"\n\
         - \"keywords\": 3-5 keywords\n\n\
         Input items:\n{lines}\n\
         Output ONLY the JSON list."
    )
}

#[derive(Debug, Deserialize)]
struct RankedRaw {
    url: String,
    relevance_score: f64,
    #[serde(default)]
    justification: String,
    #[serde(default)]
    content_type: String,
    #[serde(default)]
    keywords: Vec<String>,
}

/// Models wrap JSON in markdown fences more often than not.
fn strip_code_fences(s: &str) -> &str {
    let mut out = s.trim();
    if let Some(rest) = out.strip_prefix("```") {
        // drop the fence line ("```json" or bare "```")
        out = rest.split_once('\n').map(|(_, body)| body).unwrap_or(rest);
        if let Some(body) = out.trim_end().strip_suffix("```") {
            out = body;
        }
    } else if let Some(rest) = out.strip_prefix("json") {
        out = rest;
    }
    out.trim()
}

pub fn parse_ranked(
    raw_reply: &str,
    items: &[FeedItem],
    top_n: usize,
) -> Result<Vec<RankedItem>, DigestError> {
    let cleaned = strip_code_fences(raw_reply);
    let raw: Vec<RankedRaw> = serde_json::from_str(cleaned).map_err(|e| {
        DigestError::MalformedResponse(format!(
            "ranking JSON: {e}; reply started with {:?}",
            cleaned.chars().take(80).collect::<String>()
        ))
    })?;

    let by_link: HashMap<&str, &FeedItem> =
        items.iter().map(|i| (i.link.as_str(), i)).collect();

    let mut ranked = Vec::with_capacity(raw.len());
    for r in raw {
        let Some(item) = by_link.get(r.url.as_str()) else {
            // The model invented or rewrote a URL; nothing to attach it to.
            tracing::warn!(url = %r.url, "ranked url not among input items; dropped");
            continue;
        };
        let score = (r.relevance_score.round() as i64).clamp(1, 10) as u8;
        ranked.push(RankedItem {
            item: (*item).clone(),
            score,
            content_kind: r.content_type,
            justification: r.justification,
            keywords: r.keywords,
        });
    }

    // Stable sort keeps the model's ordering within equal scores.
    ranked.sort_by(|a, b| b.score.cmp(&a.score));
    ranked.truncate(top_n);
    Ok(ranked)
}

pub async fn rank_items(
    client: &DynModelClient,
    model: &str,
    prefs: &str,
    items: &[FeedItem],
    top_n: usize,
    meter: &UsageMeter,
) -> Result<Vec<RankedItem>, DigestError> {
    if items.is_empty() {
        return Ok(Vec::new());
    }

    let prompt = ranking_prompt(prefs, items, top_n);
    tracing::info!(items = items.len(), model, "requesting relevance ranking");
    let reply = client.generate(GenRequest::new(model, prompt)).await?;
    meter.record(model, reply.usage);

    parse_ranked(&reply.text, items, top_n)
}
