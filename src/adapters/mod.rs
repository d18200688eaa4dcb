//! Adapter implementations of the domain ports.
//!
//! - `fs`: file-backed task and plan stores over the on-disk state layout
//! - `command_spawner`: worker restarts via configured command templates
//! - `mock`: in-memory ports for tests

pub mod command_spawner;
pub mod fs;
pub mod mock;

pub use command_spawner::CommandSpawner;
pub use fs::{FsPlanStore, FsTaskStore};
