//! Notification sink port and the bundled no-op/logging implementations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::models::TaskStatus;

/// Outcome of a recovery attempt, pushed to whoever wants to hear about it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RecoveryEvent {
    /// A restart call was accepted by the spawn capability
    TaskRecovered {
        task_id: Uuid,
        project_id: Uuid,
        status: TaskStatus,
        attempt: u32,
        at: DateTime<Utc>,
    },
    /// A restart call failed
    RecoveryFailed {
        task_id: Uuid,
        project_id: Uuid,
        status: TaskStatus,
        attempt: u32,
        error: String,
        at: DateTime<Utc>,
    },
}

/// Fire-and-forget notification sink.
///
/// Callers never await delivery guarantees; implementations must not block
/// the recovery loop and must not fail loudly.
#[async_trait]
pub trait RecoveryNotifier: Send + Sync {
    async fn notify(&self, event: RecoveryEvent);
}

/// A sink that drops everything.
///
/// Use this when no notification channel is wired up but the type system
/// requires a `RecoveryNotifier` implementation.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullNotifier;

impl NullNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl RecoveryNotifier for NullNotifier {
    async fn notify(&self, _event: RecoveryEvent) {}
}

/// A sink that writes outcomes to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl TracingNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl RecoveryNotifier for TracingNotifier {
    async fn notify(&self, event: RecoveryEvent) {
        match event {
            RecoveryEvent::TaskRecovered {
                task_id, attempt, ..
            } => {
                info!(%task_id, attempt, "task restart dispatched");
            }
            RecoveryEvent::RecoveryFailed {
                task_id,
                attempt,
                error,
                ..
            } => {
                warn!(%task_id, attempt, error, "task restart failed");
            }
        }
    }
}
