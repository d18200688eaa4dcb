//! Application layer orchestrating domain logic.
//!
//! This layer coordinates between domain models and ports, implementing
//! workflows that span multiple aggregates. It owns the per-task lifecycle
//! machines and routes worker signals through them.

pub mod state_manager;

pub use state_manager::{StatusChange, TaskStateManager};
