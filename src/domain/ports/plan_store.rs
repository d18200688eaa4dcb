use crate::domain::errors::StoreError;
use crate::domain::models::{PlanRecord, TaskStatus};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Port for durable plan record I/O.
///
/// The adapter owns the on-disk layout; callers get paths from
/// `record_path`/`working_copy_path` and hand them back to the read/write
/// operations. Status writes are best-effort from the orchestrator's point
/// of view: failures are logged by the caller, never fatal.
#[async_trait]
pub trait PlanStore: Send + Sync {
    /// Primary record location for a task's workflow state
    fn record_path(&self, state_root: &Path, spec_id: &str) -> PathBuf;

    /// Read a record; `Ok(None)` when none exists at the path
    async fn read_record(&self, path: &Path) -> Result<Option<PlanRecord>, StoreError>;

    /// Update the status (and freshness timestamp) of the record at `path`.
    /// Returns `Ok(false)` when there is no record to update.
    async fn write_status(
        &self,
        path: &Path,
        status: TaskStatus,
        project_id: Uuid,
    ) -> Result<bool, StoreError>;

    /// Locate the working-copy replica of a task's record, if the task has
    /// an isolated checkout. `None` means no secondary write is needed.
    async fn working_copy_path(&self, project_path: &Path, spec_id: &str) -> Option<PathBuf>;
}
