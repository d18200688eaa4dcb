//! CLI type definitions
//!
//! This module contains clap command structures that define the CLI interface.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use super::commands::daemon::DaemonArgs;
use super::commands::scan::ScanArgs;
use super::commands::status::StatusArgs;

#[derive(Parser)]
#[command(name = "drover")]
#[command(about = "Drover - task lifecycle orchestration and stuck-task recovery", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Configuration file (defaults to .drover/config.yaml in the working
    /// directory)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one recovery sweep over all watched projects
    Scan(ScanArgs),

    /// Show watched projects, their tasks, and recovery configuration
    Status(StatusArgs),

    /// Run the recovery scanner as a long-lived daemon
    Daemon(DaemonArgs),
}
