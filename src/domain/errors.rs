//! Port errors.

use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

/// Failures from the task and plan stores.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt record at {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Failures from the worker-spawn capability.
#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("Spawn capability unavailable: {0}")]
    Unavailable(String),

    #[error("Resume failed for task {task_id}: {message}")]
    Failed { task_id: Uuid, message: String },
}
