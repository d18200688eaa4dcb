//! One-shot recovery sweep.

use anyhow::{Context, Result};
use clap::Args;

use crate::cli::output::TableFormatter;
use crate::domain::models::Config;

#[derive(Args, Debug)]
pub struct ScanArgs {
    /// Detect and report stuck tasks without restarting anything
    #[arg(long)]
    pub dry_run: bool,
}

pub async fn execute(config: &Config, args: ScanArgs, json: bool) -> Result<()> {
    let services = super::build_services(config)?;
    let scanner = services.scanner(config);

    let stuck = if args.dry_run {
        scanner.detect_stuck().await
    } else {
        scanner
            .healthcheck()
            .await
            .context("recovery dependencies unreachable")?;
        scanner.scan_now().await
    };
    let stats = scanner.stats().await;

    if json {
        let payload = serde_json::json!({
            "dry_run": args.dry_run,
            "stuck_tasks": stuck,
            "stats": stats,
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    if stuck.is_empty() {
        println!("No stuck tasks found.");
        return Ok(());
    }

    println!("Stuck tasks:");
    println!("{}", TableFormatter::new().format_stuck_tasks(&stuck));
    if args.dry_run {
        println!("\nDry run: no restarts dispatched.");
    } else {
        println!(
            "\nRestarts dispatched: {} ok, {} failed",
            stats.successful_recoveries, stats.failed_recoveries
        );
    }
    Ok(())
}
