// src/config/mod.rs
//! Run configuration: one TOML file, parsed once at startup and passed by
//! reference into each stage. Secrets never live here; see `secrets`.

pub mod secrets;

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::DigestError;

pub const DEFAULT_CONFIG_PATH: &str = "config/digest.toml";
pub const ENV_CONFIG_PATH: &str = "DIGEST_CONFIG_PATH";

fn default_feed_cap() -> usize {
    10
}
fn default_recency_hours() -> u64 {
    36
}
fn default_top_n() -> usize {
    20
}
fn default_num_news() -> usize {
    7
}
fn default_num_feed_tutorials() -> usize {
    5
}
fn default_subject_prefix() -> String {
    "[AI Digest]".to_string()
}
fn default_schedule_time() -> String {
    "06:00".to_string()
}
fn default_true() -> bool {
    true
}
fn default_concurrency() -> usize {
    3
}
fn default_state_path() -> PathBuf {
    PathBuf::from("state/digest_state.json")
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("out")
}
fn default_request_timeout() -> u64 {
    30
}
fn default_connect_timeout() -> u64 {
    5
}
fn default_retention_days() -> u64 {
    90
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Execute one pipeline run and exit.
    Once,
    /// Keep the process alive and run daily at `run.schedule_time`.
    Schedule,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmailProvider {
    Smtp,
    Sendgrid,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedsSection {
    pub urls: Vec<String>,
    /// Applied to any feed without an entry in `caps`.
    #[serde(default = "default_feed_cap")]
    pub default_cap: usize,
    /// Per-feed item caps keyed by feed URL.
    #[serde(default)]
    pub caps: HashMap<String, usize>,
    /// Feeds listed here are not fetched at all.
    #[serde(default)]
    pub skip: Vec<String>,
}

impl FeedsSection {
    pub fn cap_for(&self, url: &str) -> usize {
        self.caps.get(url).copied().unwrap_or(self.default_cap)
    }

    pub fn is_skipped(&self, url: &str) -> bool {
        self.skip.iter().any(|s| s == url)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FilterSection {
    #[serde(default = "default_recency_hours")]
    pub recency_hours: u64,
    /// Empty list disables keyword filtering entirely.
    #[serde(default)]
    pub required_keywords: Vec<String>,
}

impl Default for FilterSection {
    fn default() -> Self {
        Self {
            recency_hours: default_recency_hours(),
            required_keywords: Vec::new(),
        }
    }
}

/// USD per one million tokens.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ModelPricing {
    pub input: f64,
    pub output: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelsSection {
    pub ranking: String,
    pub summary: String,
    pub analysis: String,
    pub tutorial: String,
    #[serde(default)]
    pub pricing: HashMap<String, ModelPricing>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DigestSection {
    #[serde(default = "default_top_n")]
    pub top_n_ranked: usize,
    #[serde(default = "default_num_news")]
    pub num_news_items: usize,
    #[serde(default = "default_num_feed_tutorials")]
    pub num_feed_tutorials: usize,
    /// Injected into the ranking prompt so the model knows whose digest this is.
    #[serde(default)]
    pub preference_prompt: String,
    #[serde(default)]
    pub tutorial_topics: Vec<String>,
}

impl Default for DigestSection {
    fn default() -> Self {
        Self {
            top_n_ranked: default_top_n(),
            num_news_items: default_num_news(),
            num_feed_tutorials: default_num_feed_tutorials(),
            preference_prompt: String::new(),
            tutorial_topics: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunSection {
    #[serde(default = "default_run_mode")]
    pub mode: RunMode,
    /// "HH:MM", local time of the daily scheduled run.
    #[serde(default = "default_schedule_time")]
    pub schedule_time: String,
    /// In schedule mode, run once immediately before waiting for the slot.
    #[serde(default = "default_true")]
    pub run_on_start: bool,
    /// Upper bound on in-flight summarizer model calls.
    #[serde(default = "default_concurrency")]
    pub summarize_concurrency: usize,
    #[serde(default = "default_state_path")]
    pub state_path: PathBuf,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Seen links older than this are pruned on save; 0 keeps them forever.
    #[serde(default = "default_retention_days")]
    pub seen_retention_days: u64,
}

fn default_run_mode() -> RunMode {
    RunMode::Once
}

impl Default for RunSection {
    fn default() -> Self {
        Self {
            mode: default_run_mode(),
            schedule_time: default_schedule_time(),
            run_on_start: true,
            summarize_concurrency: default_concurrency(),
            state_path: default_state_path(),
            output_dir: default_output_dir(),
            request_timeout_secs: default_request_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            seen_retention_days: default_retention_days(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmailSection {
    #[serde(default = "default_email_provider")]
    pub provider: EmailProvider,
    #[serde(default = "default_subject_prefix")]
    pub subject_prefix: String,
}

fn default_email_provider() -> EmailProvider {
    EmailProvider::Smtp
}

impl Default for EmailSection {
    fn default() -> Self {
        Self {
            provider: default_email_provider(),
            subject_prefix: default_subject_prefix(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DigestConfig {
    pub feeds: FeedsSection,
    #[serde(default)]
    pub filter: FilterSection,
    pub models: ModelsSection,
    #[serde(default)]
    pub digest: DigestSection,
    #[serde(default)]
    pub run: RunSection,
    #[serde(default)]
    pub email: EmailSection,
}

impl DigestConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, DigestError> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .map_err(|e| DigestError::Config(format!("reading {}: {e}", path.display())))?;
        let mut cfg: DigestConfig = toml::from_str(&data)
            .map_err(|e| DigestError::Config(format!("parsing {}: {e}", path.display())))?;
        cfg.normalize()?;
        Ok(cfg)
    }

    /// Resolution order: $DIGEST_CONFIG_PATH, then config/digest.toml.
    pub fn load_default() -> Result<Self, DigestError> {
        let path = std::env::var(ENV_CONFIG_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
        Self::load_from_file(path)
    }

    fn normalize(&mut self) -> Result<(), DigestError> {
        for url in &mut self.feeds.urls {
            *url = url.trim().to_string();
        }
        self.feeds.urls.retain(|u| !u.is_empty());

        if self.run.summarize_concurrency == 0 {
            self.run.summarize_concurrency = 1;
        }

        // Fail early on an unusable schedule slot; once-mode never reads it,
        // but a bad value would otherwise only surface at the first sleep.
        parse_schedule_time(&self.run.schedule_time)?;

        if self.feeds.urls.is_empty() {
            tracing::warn!("no feed urls configured; digest will carry the tutorial only");
        }
        Ok(())
    }
}

/// Parse "HH:MM" into (hour, minute).
pub fn parse_schedule_time(s: &str) -> Result<(u32, u32), DigestError> {
    let bad = || DigestError::Config(format!("invalid schedule_time {s:?}, expected HH:MM"));
    let (h, m) = s.split_once(':').ok_or_else(&bad)?;
    let h: u32 = h.trim().parse().map_err(|_| bad())?;
    let m: u32 = m.trim().parse().map_err(|_| bad())?;
    if h > 23 || m > 59 {
        return Err(bad());
    }
    Ok((h, m))
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [feeds]
        urls = ["https://a.example/rss", "  https://b.example/rss "]

        [models]
        ranking = "gemini-2.0-flash"
        summary = "gemini-2.0-flash"
        analysis = "gemini-2.5-pro"
        tutorial = "gemini-2.5-pro"
    "#;

    #[test]
    fn minimal_config_fills_defaults() {
        let mut cfg: DigestConfig = toml::from_str(MINIMAL).unwrap();
        cfg.normalize().unwrap();
        assert_eq!(cfg.feeds.urls[1], "https://b.example/rss");
        assert_eq!(cfg.feeds.default_cap, 10);
        assert_eq!(cfg.filter.recency_hours, 36);
        assert!(cfg.filter.required_keywords.is_empty());
        assert_eq!(cfg.run.mode, RunMode::Once);
        assert_eq!(cfg.email.subject_prefix, "[AI Digest]");
        assert_eq!(cfg.run.summarize_concurrency, 3);
    }

    #[test]
    fn per_feed_cap_falls_back_to_default() {
        let mut cfg: DigestConfig = toml::from_str(MINIMAL).unwrap();
        cfg.feeds
            .caps
            .insert("https://a.example/rss".into(), 15);
        assert_eq!(cfg.feeds.cap_for("https://a.example/rss"), 15);
        assert_eq!(cfg.feeds.cap_for("https://b.example/rss"), 10);
    }

    #[test]
    fn schedule_time_is_validated() {
        assert_eq!(parse_schedule_time("06:00").unwrap(), (6, 0));
        assert_eq!(parse_schedule_time("23:59").unwrap(), (23, 59));
        assert!(parse_schedule_time("24:00").is_err());
        assert!(parse_schedule_time("six").is_err());
    }

    #[test]
    fn bad_schedule_time_fails_normalize() {
        let mut cfg: DigestConfig = toml::from_str(MINIMAL).unwrap();
        cfg.run.schedule_time = "25:61".into();
        assert!(cfg.normalize().is_err());
    }
}
