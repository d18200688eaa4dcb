//! Long-lived recovery daemon.
//!
//! Runs the recovery scanner on its interval until interrupted, and owns the
//! auxiliary process registry: dead entries left behind by a previous run are
//! pruned at startup. Worker signals themselves are delivered in-process by
//! whatever embeds [`crate::application::TaskStateManager`]; this daemon
//! covers the recovery side for workers that died silently.

use anyhow::{Context, Result};
use clap::Args;
use tracing::{info, warn};

use crate::domain::models::{Config, RecoveryConfigPatch};
use crate::services::ProcessRegistry;

#[derive(Args, Debug)]
pub struct DaemonArgs {
    /// Override the configured scan interval
    #[arg(long)]
    pub scan_interval_ms: Option<u64>,

    /// Override the configured staleness cooldown
    #[arg(long)]
    pub cooldown_ms: Option<u64>,

    /// Override the configured restart attempt cap
    #[arg(long)]
    pub max_attempts: Option<u32>,
}

pub async fn execute(config: &Config, args: DaemonArgs, json: bool) -> Result<()> {
    let services = super::build_services(config)?;
    let scanner = services.scanner(config);

    let patch = RecoveryConfigPatch {
        enabled: None,
        cooldown_period_ms: args.cooldown_ms,
        max_recovery_attempts: args.max_attempts,
        scan_interval_ms: args.scan_interval_ms,
    };
    let effective = scanner.update_config(patch).await;

    let registry = ProcessRegistry::load(&config.registry.persist_path)
        .await
        .context("failed to load process registry")?;
    let pruned = registry.prune_dead().await;
    if pruned > 0 {
        info!(pruned, "stale process entries from a previous run removed");
    }

    scanner
        .start()
        .await
        .context("failed to start recovery scanner")?;

    if json {
        let payload = serde_json::json!({
            "running": scanner.is_running(),
            "config": effective,
            "projects": services.projects.len(),
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else if scanner.is_running() {
        println!(
            "Recovery daemon running over {} project(s), scanning every {}ms. Ctrl-C to stop.",
            services.projects.len(),
            effective.scan_interval_ms
        );
    } else {
        println!("Recovery is disabled in configuration; nothing to do.");
        return Ok(());
    }

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("shutdown requested");
    scanner.stop();

    let health = scanner.health().await;
    if health.stats.failed_recoveries > 0 {
        warn!(
            failed = health.stats.failed_recoveries,
            "some restart calls failed during this run"
        );
    }
    if !json {
        println!(
            "Stopped. Attempts: {} ({} ok, {} failed).",
            health.stats.total_attempts,
            health.stats.successful_recoveries,
            health.stats.failed_recoveries
        );
    }
    Ok(())
}
