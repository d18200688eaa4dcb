//! Project and recovery status overview.
//!
//! Read-only: lists tasks per project, runs the scanner healthcheck, reports
//! stuck-task detection without spending attempts, and prints the recovery
//! configuration and stats snapshot.

use anyhow::{Context, Result};
use clap::Args;
use serde_json::json;

use crate::cli::output::TableFormatter;
use crate::domain::models::{Config, Project, Task};
use crate::domain::ports::TaskStore;
use crate::services::{HealthStatus, ScannerError, StuckTask};

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Only show this project (by name)
    #[arg(short, long)]
    pub project: Option<String>,
}

pub async fn execute(config: &Config, args: StatusArgs, json: bool) -> Result<()> {
    let services = super::build_services(config)?;
    let scanner = services.scanner(config);

    let mut projects = Vec::new();
    for project in &services.projects {
        if let Some(ref filter) = args.project {
            if &project.name != filter {
                continue;
            }
        }
        let tasks = services
            .task_store
            .list_tasks(project.id)
            .await
            .with_context(|| format!("failed to list tasks for project '{}'", project.name))?;
        projects.push((project.clone(), tasks));
    }

    let healthcheck = scanner.healthcheck().await;
    // Read-only detection: no attempts spent, nothing restarted.
    let stuck = scanner.detect_stuck().await;
    let health = scanner.health().await;

    if json {
        let payload = status_payload(&projects, &healthcheck, &stuck, &health);
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    let formatter = TableFormatter::new();
    for (project, tasks) in &projects {
        println!("Project: {} ({})", project.name, project.path.display());
        if tasks.is_empty() {
            println!("  no tasks\n");
        } else {
            println!("{}\n", formatter.format_tasks(tasks));
        }
    }

    match &healthcheck {
        Ok(()) => println!("Healthcheck: ok"),
        Err(error) => println!("Healthcheck failed: {error}"),
    }

    if stuck.is_empty() {
        println!("No tasks look stuck.");
    } else {
        println!("Stuck tasks (detection only):");
        println!("{}", formatter.format_stuck_tasks(&stuck));
    }

    println!(
        "\nRecovery: enabled={} cooldown={}ms max_attempts={} interval={}ms",
        health.config.enabled,
        health.config.cooldown_period_ms,
        health.config.max_recovery_attempts,
        health.config.scan_interval_ms
    );
    println!(
        "Stats: {} attempts ({} ok, {} failed), {} currently stuck",
        health.stats.total_attempts,
        health.stats.successful_recoveries,
        health.stats.failed_recoveries,
        health.stats.tasks_currently_stuck
    );
    Ok(())
}

/// Assemble the machine-readable status report.
fn status_payload(
    projects: &[(Project, Vec<Task>)],
    healthcheck: &Result<(), ScannerError>,
    stuck: &[StuckTask],
    health: &HealthStatus,
) -> serde_json::Value {
    json!({
        "projects": projects
            .iter()
            .map(|(project, tasks)| json!({
                "id": project.id,
                "name": project.name,
                "path": project.path,
                "tasks": tasks,
            }))
            .collect::<Vec<_>>(),
        "healthcheck": match healthcheck {
            Ok(()) => json!({ "ok": true }),
            Err(error) => json!({ "ok": false, "error": error.to_string() }),
        },
        "stuck_tasks": stuck,
        "recovery_config": health.config,
        "stats": health.stats,
    })
}
