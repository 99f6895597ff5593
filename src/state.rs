// src/state.rs
//! Cross-run state: the seen-link set and the tutorial rotation index,
//! one JSON file, written atomically (tmp + rename). Loaded at the start
//! of a run and saved only after a completed run.

use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SeenEntry {
    pub link: String,
    /// Unix seconds of the run that first delivered this link.
    pub seen_at: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunState {
    #[serde(default)]
    pub seen: Vec<SeenEntry>,
    /// Index into the configured tutorial topic list; advanced only after
    /// a tutorial was actually generated.
    #[serde(default)]
    pub topic_index: usize,
}

impl RunState {
    /// Missing file is a first run, not an error. A corrupt file is an
    /// error: silently dropping the seen-set would re-deliver everything.
    pub fn load(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(s) => serde_json::from_str(&s)
                .with_context(|| format!("parsing state file {}", path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e).with_context(|| format!("reading state file {}", path.display())),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("creating state dir {}", dir.display()))?;
        }
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(self).context("serializing state")?;
        let mut f = fs::File::create(&tmp)
            .with_context(|| format!("creating {}", tmp.display()))?;
        f.write_all(json.as_bytes()).context("writing state")?;
        fs::rename(&tmp, path).context("replacing state file")?;
        Ok(())
    }

    pub fn contains(&self, link: &str) -> bool {
        self.seen.iter().any(|e| e.link == link)
    }

    /// Borrowed view for hot-path membership tests during ingest.
    pub fn seen_links(&self) -> HashSet<&str> {
        self.seen.iter().map(|e| e.link.as_str()).collect()
    }

    pub fn mark_seen<I: IntoIterator<Item = String>>(&mut self, links: I, now: u64) {
        for link in links {
            if !self.contains(&link) {
                self.seen.push(SeenEntry { link, seen_at: now });
            }
        }
    }

    /// Drop entries older than `retention_days`. 0 disables pruning.
    pub fn prune(&mut self, now: u64, retention_days: u64) -> usize {
        if retention_days == 0 {
            return 0;
        }
        let cutoff = now.saturating_sub(retention_days * 86_400);
        let before = self.seen.len();
        self.seen.retain(|e| e.seen_at >= cutoff);
        before - self.seen.len()
    }

    /// Current topic, if any are configured.
    pub fn current_topic<'a>(&self, topics: &'a [String]) -> Option<&'a str> {
        if topics.is_empty() {
            return None;
        }
        Some(topics[self.topic_index % topics.len()].as_str())
    }

    /// Rotate to the next topic. Call only after a confirmed success so a
    /// failed topic is retried on the next run.
    pub fn advance_topic(&mut self, topics: &[String]) {
        if topics.is_empty() {
            return;
        }
        self.topic_index = (self.topic_index + 1) % topics.len();
    }
}
