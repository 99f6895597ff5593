// src/summarize.rs
//! Two-stage summarization: a lightweight brief per item, then a deeper
//! analysis that gets the brief as extra context. Items are independent,
//! so they fan out under a semaphore; the merge is by original item order,
//! never by completion order.

use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::ai::{DynModelClient, GenRequest, UsageMeter};
use crate::rank::RankedItem;

const SNIPPET_MAX_CHARS: usize = 2000;

#[derive(Debug, Clone)]
pub struct AnalyzedItem {
    pub ranked: RankedItem,
    /// Short plain-text summary from the lightweight model.
    pub brief: String,
    /// Markdown analysis block rendered verbatim into the digest.
    pub analysis_md: String,
}

#[derive(Debug, Default)]
pub struct SummarizeOutput {
    pub news: Vec<AnalyzedItem>,
    pub feed_tutorials: Vec<AnalyzedItem>,
}

fn brief_prompt(item: &RankedItem) -> String {
    let snippet: String = item.item.summary.chars().take(SNIPPET_MAX_CHARS).collect();
    format!(
        "Summarize the following item in 3-4 plain sentences for a busy technical reader. \
         No markdown, no preamble.\n\nTitle: {}\nSnippet: {}",
        item.item.title, snippet
    )
}

fn analysis_prompt(item: &RankedItem, brief: &str) -> String {
    let snippet: String = item.item.summary.chars().take(SNIPPET_MAX_CHARS).collect();
    format!(
        "For the following item, write a structured analysis for a busy, technical CTO. \
         Base every statement SOLELY on the provided snippet and summary; where nothing is \
         clear, say so.\n\n\
         Title: {title}\n\
         URL: {url}\n\
         Snippet: {snippet}\n\
         Short summary: {brief}\n\n\
         Output format (Markdown, exactly this structure):\n\
         ### {title}\n\
         **Source:** {url}\n\
         **Summary:** (3-4 concise sentences)\n\
         **Key Technical Insight:** (the specific innovation, method, or detail)\n\
         **Market/Competitive Relevance:** (impact on the broader market, or state none)\n\
         **Actionable Idea:** (an experiment to run or a strategic question, or state none)\n\
         ---",
        title = item.item.title,
        url = item.item.link,
    )
}

async fn analyze_one(
    client: DynModelClient,
    summary_model: String,
    analysis_model: String,
    item: RankedItem,
    meter: Arc<UsageMeter>,
) -> Option<AnalyzedItem> {
    let brief_reply = match client
        .generate(GenRequest::new(&summary_model, brief_prompt(&item)))
        .await
    {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!(error = %e, link = %item.item.link, "brief summary failed; item dropped");
            return None;
        }
    };
    meter.record(&summary_model, brief_reply.usage);
    let brief = brief_reply.text.trim().to_string();

    let analysis_reply = match client
        .generate(GenRequest::new(
            &analysis_model,
            analysis_prompt(&item, &brief),
        ))
        .await
    {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!(error = %e, link = %item.item.link, "analysis failed; item dropped");
            return None;
        }
    };
    meter.record(&analysis_model, analysis_reply.usage);

    Some(AnalyzedItem {
        ranked: item,
        brief,
        analysis_md: analysis_reply.text.trim().to_string(),
    })
}

/// Select the top news / feed-tutorial items from the ranked set (which is
/// already score-ordered) and analyze them concurrently.
pub async fn summarize_and_analyze(
    client: &DynModelClient,
    summary_model: &str,
    analysis_model: &str,
    ranked: Vec<RankedItem>,
    num_news: usize,
    num_feed_tutorials: usize,
    concurrency: usize,
    meter: &Arc<UsageMeter>,
) -> SummarizeOutput {
    let (tutorials, news): (Vec<_>, Vec<_>) =
        ranked.into_iter().partition(|r| r.is_tutorial());
    let selected_news: Vec<RankedItem> = news.into_iter().take(num_news).collect();
    let selected_tutorials: Vec<RankedItem> =
        tutorials.into_iter().take(num_feed_tutorials).collect();

    let news_len = selected_news.len();
    if news_len + selected_tutorials.len() == 0 {
        return SummarizeOutput::default();
    }
    tracing::info!(
        news = news_len,
        feed_tutorials = selected_tutorials.len(),
        concurrency,
        "summarizing ranked items"
    );

    let sem = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut handles = Vec::new();
    for item in selected_news.into_iter().chain(selected_tutorials) {
        let sem = Arc::clone(&sem);
        let client = Arc::clone(client);
        let meter = Arc::clone(meter);
        let summary_model = summary_model.to_string();
        let analysis_model = analysis_model.to_string();
        handles.push(tokio::spawn(async move {
            // Closed only if the runtime is shutting down.
            let _permit = sem.acquire_owned().await.ok()?;
            analyze_one(client, summary_model, analysis_model, item, meter).await
        }));
    }

    // Awaiting handles in spawn order gives a deterministic merge whatever
    // the completion order was.
    let mut out = SummarizeOutput::default();
    for (idx, handle) in handles.into_iter().enumerate() {
        let analyzed = match handle.await {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "summarizer task panicked; item dropped");
                None
            }
        };
        if let Some(a) = analyzed {
            if idx < news_len {
                out.news.push(a);
            } else {
                out.feed_tutorials.push(a);
            }
        }
    }
    out
}
