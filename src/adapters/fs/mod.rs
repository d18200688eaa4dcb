//! File-backed store adapters.
//!
//! The on-disk layout, shared by both stores:
//!
//! ```text
//! <project>/
//!   .drover/specs/<spec_id>/task.json   scheduling metadata, written upstream
//!   .drover/specs/<spec_id>/plan.json   durable plan record
//!   .worktrees/<spec_id>/...            isolated checkout, when one exists
//! ```
//!
//! A worktree checkout carries its own `.drover/specs/<spec_id>/plan.json`
//! replica; status persists to both copies.

pub mod plan_store;
pub mod task_store;

pub use plan_store::FsPlanStore;
pub use task_store::FsTaskStore;
