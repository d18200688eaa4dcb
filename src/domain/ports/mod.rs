//! Port trait definitions (hexagonal architecture).
//!
//! Async trait interfaces the adapters implement:
//! - `TaskStore`: task and project lookup with cache invalidation
//! - `PlanStore`: durable plan record I/O, primary plus working copy
//! - `WorkerSpawner`: the external capability that restarts workers
//! - `RecoveryNotifier`: fire-and-forget outcome notifications
//!
//! These contracts keep the orchestration core independent of where tasks
//! live, how records are stored, and how workers are launched.

pub mod notifier;
pub mod plan_store;
pub mod task_store;
pub mod worker_spawner;

pub use notifier::{NullNotifier, RecoveryEvent, RecoveryNotifier, TracingNotifier};
pub use plan_store::PlanStore;
pub use task_store::TaskStore;
pub use worker_spawner::{ResumeOptions, WorkerSpawner};
