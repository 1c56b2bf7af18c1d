//! YieldPilot Treasury Keeper
//!
//! Off-chain service that evaluates treasury snapshots against the active
//! policy, ranks them by stress risk and writes proposal-only reports.
//! Nothing is ever signed or broadcast.

mod config;
mod loader;
mod report;
mod risk_queue;

use anyhow::{Context, Result};
use config::Config;
use report::{evaluate_snapshot, write_report, EvaluationContext, SnapshotReport};
use risk_queue::RiskQueue;
use std::sync::Arc;
use std::time::Duration;
use tokio::time;

/// Command-line flags
#[derive(Debug, Default)]
struct Args {
    /// Run a single batch and exit
    once: bool,
    /// Write a default config to this path and exit
    init_config: Option<String>,
}

fn parse_args() -> Result<Args> {
    let mut args = Args::default();
    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--once" => args.once = true,
            "--init-config" => {
                let path = iter.next().context("--init-config requires a path")?;
                args.init_config = Some(path);
            }
            other => anyhow::bail!("Unknown argument: {}", other),
        }
    }
    Ok(args)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = parse_args()?;
    if let Some(path) = &args.init_config {
        return Config::write_default(path);
    }

    log::info!("Starting YieldPilot Treasury Keeper");

    // Load configuration
    let config = Config::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config ({:#}), using default testnet config", e);
        Config::default_testnet()
    });

    let policy = loader::load_policy(&config.policy_path)?;
    log::info!(
        "Active policy {} v{} ({} buckets, {} rules)",
        config.policy_id,
        config.policy_version,
        policy.allocations.len(),
        policy.rules.len()
    );
    log::info!("Watching snapshots in {}", config.snapshot_dir);

    let ctx = Arc::new(EvaluationContext::new(&config, policy));
    let mut queue = RiskQueue::new();

    // Main event loop
    let mut interval = time::interval(Duration::from_secs(config.poll_interval_secs.max(1)));

    loop {
        interval.tick().await;

        if let Err(e) = process_batch(&mut queue, &ctx, &config).await {
            log::error!("Error processing snapshot batch: {:#}", e);
        }

        // Log queue status
        if !queue.is_empty() {
            log::debug!("Risk queue size: {}", queue.len());

            if let Some(worst) = queue.peek() {
                log::debug!("Riskiest snapshot: {} (score {})", worst.snapshot_id, worst.risk_score());
            }
        }

        if args.once {
            log::info!("Single batch complete, exiting");
            return Ok(());
        }
    }
}

/// Evaluate every snapshot in parallel, refresh the queue and write reports
async fn process_batch(
    queue: &mut RiskQueue,
    ctx: &Arc<EvaluationContext>,
    config: &Config,
) -> Result<()> {
    let snapshots = loader::load_snapshots(&config.snapshot_dir)?;
    if snapshots.is_empty() {
        log::debug!("No snapshots to evaluate");
        queue.retain_ids(&[]);
        return Ok(());
    }

    let ids: Vec<String> = snapshots.iter().map(|s| s.id.clone()).collect();
    let handles = snapshots.into_iter().map(|snapshot| {
        let ctx = Arc::clone(ctx);
        tokio::task::spawn_blocking(move || evaluate_snapshot(&ctx, &snapshot))
    });

    let results = futures::future::join_all(handles).await;
    let evaluated = refresh_queue(queue, ids.into_iter().zip(results).collect());

    log::info!("Evaluated {} snapshot(s)", evaluated);

    for alert in queue.alerts(config.alert_score_threshold) {
        log::warn!(
            "Risk alert: snapshot {} scored {} ({}): {}",
            alert.snapshot_id,
            alert.risk_score(),
            alert.risk_level().as_str(),
            alert.stress.risk_report.recommendations.join(" ")
        );
    }

    let written = write_ranked_reports(&queue.ranked(), config);
    log::info!("Wrote {} report(s) to {}", written, config.output_dir);

    Ok(())
}

/// Push fresh evaluations. Entries gone from disk or failed this batch are dropped.
fn refresh_queue<E: std::fmt::Display>(
    queue: &mut RiskQueue,
    evaluated: Vec<(String, std::result::Result<SnapshotReport, E>)>,
) -> usize {
    let mut live = Vec::with_capacity(evaluated.len());
    for (id, result) in evaluated {
        match result {
            Ok(report) => {
                queue.push(report);
                live.push(id);
            }
            Err(e) => log::error!("Evaluation of snapshot {} failed: {}", id, e),
        }
    }
    queue.retain_ids(&live);
    live.len()
}

/// Write up to `max_reports_per_batch` reports, riskiest first
fn write_ranked_reports(ranked: &[&SnapshotReport], config: &Config) -> usize {
    let mut written = 0;
    for report in ranked.iter().take(config.max_reports_per_batch) {
        match write_report(&config.output_dir, report) {
            Ok(path) => {
                log::debug!("Report written: {}", path.display());
                written += 1;
            }
            Err(e) => log::error!("Failed to write report for {}: {:#}", report.snapshot_id, e),
        }
    }
    written
}
