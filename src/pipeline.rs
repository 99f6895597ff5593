// src/pipeline.rs
//! One digest run: INGEST -> FILTER -> SUMMARIZE -> TUTORIAL -> ASSEMBLE
//! -> DELIVER -> PERSIST_STATE. Sub-failures degrade the digest; the run
//! only aborts when there is nothing at all to assemble.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;

use crate::ai::{DynModelClient, TokenUsage, UsageMeter};
use crate::config::DigestConfig;
use crate::digest::assemble_digest;
use crate::error::DigestError;
use crate::ingest::{self, rss::RssFeedProvider, types::FeedProvider};
use crate::notify::{DigestEmail, DigestSender};
use crate::rank::rank_items;
use crate::state::RunState;
use crate::summarize::summarize_and_analyze;
use crate::tutorial::generate_tutorial;

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("pipeline_runs_total", "Completed pipeline runs.");
        describe_counter!("pipeline_aborts_total", "Runs aborted before assembly.");
        describe_counter!("pipeline_delivery_errors_total", "Email transport failures.");
    });
}

#[derive(Debug)]
pub struct RunReport {
    pub ingested: usize,
    pub ranked: usize,
    pub analyzed: usize,
    pub tutorial_generated: bool,
    pub delivered: bool,
    pub digest_path: Option<PathBuf>,
    pub usage: TokenUsage,
    pub estimated_cost_usd: Option<f64>,
}

/// Build one RSS provider per configured, non-skipped feed URL.
pub fn build_providers(cfg: &DigestConfig) -> Vec<Box<dyn FeedProvider>> {
    let connect = Duration::from_secs(cfg.run.connect_timeout_secs);
    let request = Duration::from_secs(cfg.run.request_timeout_secs);
    cfg.feeds
        .urls
        .iter()
        .filter(|u| !cfg.feeds.is_skipped(u))
        .map(|u| Box::new(RssFeedProvider::from_url(u, connect, request)) as Box<dyn FeedProvider>)
        .collect()
}

pub async fn run(
    cfg: &DigestConfig,
    providers: &[Box<dyn FeedProvider>],
    client: &DynModelClient,
    sender: &dyn DigestSender,
) -> Result<RunReport, DigestError> {
    ensure_metrics_described();
    let started = std::time::Instant::now();
    let now = Utc::now();
    let now_unix = now.timestamp().max(0) as u64;

    let mut state = RunState::load(&cfg.run.state_path)
        .map_err(|e| DigestError::Config(format!("state file: {e:#}")))?;
    let meter = Arc::new(UsageMeter::new());

    // INGEST
    let ingested = ingest::run_once(
        providers,
        &cfg.feeds,
        &cfg.filter,
        &state.seen_links(),
        now_unix,
    )
    .await;
    tracing::info!(
        kept = ingested.items.len(),
        feed_errors = ingested.feed_errors,
        "ingestion complete"
    );

    // FILTER: a malformed or failed ranking call degrades to an empty set.
    let ranked = match rank_items(
        client,
        &cfg.models.ranking,
        &cfg.digest.preference_prompt,
        &ingested.items,
        cfg.digest.top_n_ranked,
        &meter,
    )
    .await
    {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!(error = %e, "ranking failed; continuing with empty ranked set");
            Vec::new()
        }
    };
    let ranked_count = ranked.len();

    // SUMMARIZE
    let analyzed = summarize_and_analyze(
        client,
        &cfg.models.summary,
        &cfg.models.analysis,
        ranked,
        cfg.digest.num_news_items,
        cfg.digest.num_feed_tutorials,
        cfg.run.summarize_concurrency,
        &meter,
    )
    .await;
    let analyzed_count = analyzed.news.len() + analyzed.feed_tutorials.len();

    // TUTORIAL: failure never blocks delivery; the topic stays queued.
    let topics = &cfg.digest.tutorial_topics;
    let tutorial_md = match state.current_topic(topics) {
        Some(topic) => {
            match generate_tutorial(client, &cfg.models.tutorial, topic, &meter).await {
                Ok(md) => Some(md),
                Err(e) => {
                    tracing::warn!(error = %e, topic, "tutorial generation failed; section omitted");
                    None
                }
            }
        }
        None => {
            tracing::warn!("no tutorial topics configured");
            None
        }
    };

    // Abort gate: an empty digest is not worth sending, and the seen-set
    // must stay untouched so the next run gets another chance.
    if analyzed_count == 0 && tutorial_md.is_none() {
        counter!("pipeline_aborts_total").increment(1);
        return Err(DigestError::EmptyRun);
    }

    // ASSEMBLE
    let date_str = now.format("%Y-%m-%d").to_string();
    let document = assemble_digest(
        &analyzed.news,
        &analyzed.feed_tutorials,
        tutorial_md.as_deref(),
        &date_str,
    );

    // The local copy is written before any delivery attempt, so a transport
    // failure never loses the digest.
    let digest_path = match write_digest_file(cfg, &now, &document) {
        Ok(p) => Some(p),
        Err(e) => {
            tracing::error!(error = %e, "could not write digest file");
            None
        }
    };

    // DELIVER
    let email = DigestEmail {
        subject: format!("{} {date_str}", cfg.email.subject_prefix),
        body: document,
    };
    let delivered = match sender.send(&email).await {
        Ok(()) => {
            tracing::info!(transport = sender.transport_name(), "digest delivered");
            true
        }
        Err(e) => {
            counter!("pipeline_delivery_errors_total").increment(1);
            tracing::error!(error = %e, transport = sender.transport_name(), "delivery failed; digest kept locally");
            false
        }
    };

    // PERSIST_STATE: only links that actually went into the digest count
    // as processed; unranked survivors may rank higher on a slower day.
    let delivered_links = analyzed
        .news
        .iter()
        .chain(analyzed.feed_tutorials.iter())
        .map(|a| a.ranked.item.link.clone());
    state.mark_seen(delivered_links, now_unix);
    let pruned = state.prune(now_unix, cfg.run.seen_retention_days);
    if pruned > 0 {
        tracing::info!(pruned, "pruned aged seen-links");
    }
    if tutorial_md.is_some() {
        state.advance_topic(topics);
    }
    if let Err(e) = state.save(&cfg.run.state_path) {
        tracing::error!(error = %e, "state save failed; next run may re-deliver items");
    }

    counter!("pipeline_runs_total").increment(1);
    let usage = meter.total();
    let estimated_cost_usd = meter.estimated_cost_usd(&cfg.models.pricing);
    tracing::info!(
        elapsed_secs = started.elapsed().as_secs_f64(),
        prompt_tokens = usage.prompt,
        completion_tokens = usage.completion,
        cost_usd = estimated_cost_usd,
        "pipeline run finished"
    );

    Ok(RunReport {
        ingested: ingested.items.len(),
        ranked: ranked_count,
        analyzed: analyzed_count,
        tutorial_generated: tutorial_md.is_some(),
        delivered,
        digest_path,
        usage,
        estimated_cost_usd,
    })
}

fn write_digest_file(
    cfg: &DigestConfig,
    now: &chrono::DateTime<Utc>,
    document: &str,
) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(&cfg.run.output_dir).with_context(|| {
        format!("creating output dir {}", cfg.run.output_dir.display())
    })?;
    let path = cfg
        .run
        .output_dir
        .join(format!("digest_{}.md", now.format("%Y%m%d_%H%M%S")));
    std::fs::write(&path, document)
        .with_context(|| format!("writing digest to {}", path.display()))?;
    tracing::info!(path = %path.display(), "digest written");
    Ok(path)
}
