//! Drover - Task Orchestration & Recovery
//!
//! Drover coordinates long-running, externally-executed units of work as they
//! move through a multi-phase workflow (planning → coding → quality review →
//! human review → done). It owns one lifecycle state machine per task, maps
//! raw worker signals to status changes, persists each change to the durable
//! plan record (and its working-copy replica), and runs a periodic recovery
//! scanner that restarts tasks whose workers have silently died.
//!
//! # Architecture
//!
//! This crate follows Clean Architecture / Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): pure models, the lifecycle transition
//!   function, the exit decision table, and the port traits
//! - **Application Layer** (`application`): the task state manager that
//!   multiplexes lifecycle machines and applies their effects
//! - **Service Layer** (`services`): the recovery scanner and the auxiliary
//!   process registry
//! - **Adapters** (`adapters`): file-backed stores, the command spawner, and
//!   in-memory mocks
//! - **Infrastructure Layer** (`infrastructure`): configuration and logging
//! - **CLI Layer** (`cli`): command-line interface
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use drover::adapters::{FsPlanStore, FsTaskStore};
//! use drover::application::TaskStateManager;
//! use drover::domain::models::Project;
//!
//! # async fn example() {
//! let projects = vec![Project::new("demo", "/work/demo")];
//! let manager = TaskStateManager::new(
//!     Arc::new(FsTaskStore::new(projects)),
//!     Arc::new(FsPlanStore::new()),
//! );
//! let mut changes = manager.subscribe();
//! # }
//! ```

pub mod adapters;
pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use application::{StatusChange, TaskStateManager};
pub use domain::models::{
    classify_exit, decide_exit, status_for_progress, Config, ExecutionProgress, ExitSignal,
    LifecycleEvent, LifecycleState, Phase, PlanRecord, Project, RecoveryConfig, ReviewReason,
    Task, TaskStatus,
};
pub use domain::ports::{PlanStore, RecoveryNotifier, TaskStore, WorkerSpawner};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{ProcessRegistry, RecoveryScanner, RecoveryStats, StuckTask};
