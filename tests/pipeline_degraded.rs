// tests/pipeline_degraded.rs
//! A malformed ranking reply degrades to an empty ranked set; the run still
//! completes with a tutorial-only digest.

use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;

use ai_digest_agent::ai::{DynModelClient, MockModel};
use ai_digest_agent::config::DigestConfig;
use ai_digest_agent::ingest::types::{FeedItem, FeedProvider};
use ai_digest_agent::notify::{DigestEmail, DigestSender};
use ai_digest_agent::pipeline;
use ai_digest_agent::state::RunState;

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

#[derive(Default)]
struct MockSender {
    sent: Mutex<Vec<DigestEmail>>,
}

#[async_trait]
impl DigestSender for MockSender {
    async fn send(&self, email: &DigestEmail) -> Result<()> {
        self.sent.lock().unwrap().push(email.clone());
        Ok(())
    }
    fn transport_name(&self) -> &'static str {
        "mock"
    }
}

fn test_cfg(dir: &Path) -> DigestConfig {
    let src = format!(
        r#"
        [feeds]
        urls = ["https://feed.test/rss"]

        [models]
        ranking = "rank-m"
        summary = "sum-m"
        analysis = "ana-m"
        tutorial = "tut-m"

        [digest]
        tutorial_topics = ["Topic A", "Topic B"]

        [run]
        summarize_concurrency = 1
        state_path = "{dir}/state.json"
        output_dir = "{dir}/out"
        "#,
        dir = dir.display()
    );
    toml::from_str(&src).unwrap()
}

#[tokio::test]
async fn malformed_ranking_yields_tutorial_only_digest() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = test_cfg(dir.path());

    let providers: Vec<Box<dyn FeedProvider>> = vec![Box::new(StaticFeed {
        url: "https://feed.test/rss".into(),
        items: vec![FeedItem {
            source_feed: "https://feed.test/rss".into(),
            title: "Fresh item".into(),
            link: "https://feed.test/one".into(),
            published_at: (Utc::now().timestamp() - 60) as u64,
            summary: "snippet".into(),
        }],
    })];

    let mock = MockModel::new();
    mock.enqueue_ok("rank-m", "I'm sorry, I can't produce a ranking today.");
    mock.enqueue_ok("tut-m", "## Skill-Up Tutorial: Topic A\nbody");
    let client: DynModelClient = Arc::new(mock);
    let sender = MockSender::default();

    let report = pipeline::run(&cfg, &providers, &client, &sender)
        .await
        .unwrap();

    assert_eq!(report.ingested, 1);
    assert_eq!(report.ranked, 0);
    assert_eq!(report.analyzed, 0);
    assert!(report.tutorial_generated);
    assert!(report.delivered);

    let sent = sender.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].body.contains("*No relevant news items found today.*"));
    assert!(sent[0].body.contains("## Skill-Up Tutorial: Topic A"));
    drop(sent);

    // nothing was delivered item-wise, so nothing becomes "seen"; the
    // tutorial succeeded, so the rotation advances
    let state = RunState::load(&cfg.run.state_path).unwrap();
    assert!(state.seen.is_empty());
    assert_eq!(state.topic_index, 1);
}

#[tokio::test]
async fn failed_tutorial_keeps_topic_queued() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = test_cfg(dir.path());

    let link = "https://feed.test/one";
    let providers: Vec<Box<dyn FeedProvider>> = vec![Box::new(StaticFeed {
        url: "https://feed.test/rss".into(),
        items: vec![FeedItem {
            source_feed: "https://feed.test/rss".into(),
            title: "Fresh item".into(),
            link: link.into(),
            published_at: (Utc::now().timestamp() - 60) as u64,
            summary: "snippet".into(),
        }],
    })];

    let mock = MockModel::new();
    mock.enqueue_ok(
        "rank-m",
        &format!(r#"[{{"url": "{link}", "relevance_score": 8, "content_type": "News"}}]"#),
    );
    mock.enqueue_ok("sum-m", "brief");
    mock.enqueue_ok(
        "ana-m",
        &format!("### Fresh item\n**Source:** {link}\n**Summary:** S.\n---"),
    );
    mock.enqueue_err("tut-m", "model unavailable");
    let client: DynModelClient = Arc::new(mock);
    let sender = MockSender::default();

    let report = pipeline::run(&cfg, &providers, &client, &sender)
        .await
        .unwrap();
    assert!(!report.tutorial_generated);
    assert_eq!(report.analyzed, 1);

    let sent = sender.sent.lock().unwrap();
    assert!(sent[0]
        .body
        .contains("*Tutorial generation failed or no topic was available today.*"));
    drop(sent);

    // Topic A was not consumed; the next run retries it
    let state = RunState::load(&cfg.run.state_path).unwrap();
    assert_eq!(state.topic_index, 0);
    assert!(state.contains(link));
}
