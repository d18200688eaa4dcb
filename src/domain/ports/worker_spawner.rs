use crate::domain::errors::SpawnError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

/// Options accompanying an execution resume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeOptions {
    /// Continue from the recorded progress instead of starting the workflow
    /// over
    pub continue_from_progress: bool,
}

impl Default for ResumeOptions {
    fn default() -> Self {
        Self {
            continue_from_progress: true,
        }
    }
}

impl ResumeOptions {
    /// Options the recovery scanner uses: pick up where the dead worker
    /// stopped.
    pub fn recovery() -> Self {
        Self::default()
    }
}

/// Port for the external worker-spawn capability.
///
/// Restart idempotency on an already-healthy task is this capability's
/// responsibility, not the caller's.
#[async_trait]
pub trait WorkerSpawner: Send + Sync {
    /// Verify the capability is reachable; gating check for the scanner's
    /// start
    async fn healthcheck(&self) -> Result<(), SpawnError>;

    /// Restart the automated review of a task
    async fn resume_qa(
        &self,
        task_id: Uuid,
        project_path: &Path,
        spec_id: &str,
    ) -> Result<(), SpawnError>;

    /// Restart the execution of a task
    async fn resume_execution(
        &self,
        task_id: Uuid,
        project_path: &Path,
        spec_id: &str,
        options: ResumeOptions,
    ) -> Result<(), SpawnError>;
}
