// src/schedule.rs
//! Daily in-process scheduler for `--mode schedule`. The deployed form is
//! expected to use an OS timer with `--mode once`; this loop exists so a
//! plain long-running process works too. One run's failure never stops
//! the loop.

use chrono::{DateTime, Datelike, Local, TimeZone};

use crate::ai::DynModelClient;
use crate::config::{parse_schedule_time, DigestConfig};
use crate::error::DigestError;
use crate::ingest::types::FeedProvider;
use crate::notify::DigestSender;
use crate::pipeline;

/// Seconds from `now` to the next local occurrence of `hh:mm`.
/// Exactly-at-the-slot counts as the next day to avoid a double fire.
pub fn secs_until_next(now: DateTime<Local>, hour: u32, minute: u32) -> u64 {
    let today_slot = Local
        .with_ymd_and_hms(
            now.year(),
            now.month(),
            now.day(),
            hour,
            minute,
            0,
        )
        .single();
    // DST gaps make a local wall time ambiguous or nonexistent; fall back
    // to "in 24h" rather than guessing.
    let Some(slot) = today_slot else {
        return 24 * 3600;
    };
    let delta = slot.signed_duration_since(now).num_seconds();
    if delta > 0 {
        delta as u64
    } else {
        (delta + 24 * 3600).max(1) as u64
    }
}

pub async fn run_loop(
    cfg: &DigestConfig,
    providers: &[Box<dyn FeedProvider>],
    client: &DynModelClient,
    sender: &dyn DigestSender,
) -> Result<(), DigestError> {
    let (hour, minute) = parse_schedule_time(&cfg.run.schedule_time)?;

    if cfg.run.run_on_start {
        tracing::info!("running initial pipeline execution before scheduling");
        log_outcome(pipeline::run(cfg, providers, client, sender).await);
    }

    loop {
        let wait = secs_until_next(Local::now(), hour, minute);
        tracing::info!(
            wait_secs = wait,
            slot = %cfg.run.schedule_time,
            "sleeping until next scheduled run"
        );
        tokio::time::sleep(std::time::Duration::from_secs(wait)).await;
        log_outcome(pipeline::run(cfg, providers, client, sender).await);
    }
}

fn log_outcome(result: Result<pipeline::RunReport, DigestError>) {
    match result {
        Ok(report) => tracing::info!(?report, "scheduled run completed"),
        Err(e) => tracing::error!(error = %e, "scheduled run failed"),
    }
}
