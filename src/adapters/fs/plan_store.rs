//! Filesystem plan store.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};
use uuid::Uuid;

use crate::domain::errors::StoreError;
use crate::domain::models::{PlanRecord, TaskStatus};
use crate::domain::ports::PlanStore;

/// Directory under a workspace root holding worktree checkouts.
const WORKTREES_DIR: &str = ".worktrees";
/// Durable state directory inside a worktree checkout.
const WORKTREE_STATE_DIR: &str = ".drover";

/// Plan records as JSON files under a project's state root.
///
/// Writes are atomic (temp file + rename) so a crashed write never leaves a
/// half-written record behind; readers see either the old record or the new
/// one.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsPlanStore;

impl FsPlanStore {
    pub fn new() -> Self {
        Self
    }

    async fn write_record(path: &Path, record: &PlanRecord) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(record).map_err(|source| StoreError::Corrupt {
            path: path.to_path_buf(),
            source,
        })?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|source| StoreError::Io {
                path: tmp.clone(),
                source,
            })?;
        tokio::fs::rename(&tmp, path)
            .await
            .map_err(|source| StoreError::Io {
                path: path.to_path_buf(),
                source,
            })
    }
}

#[async_trait]
impl PlanStore for FsPlanStore {
    fn record_path(&self, state_root: &Path, spec_id: &str) -> PathBuf {
        state_root.join("specs").join(spec_id).join("plan.json")
    }

    async fn read_record(&self, path: &Path) -> Result<Option<PlanRecord>, StoreError> {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(StoreError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        let record = serde_json::from_str(&content).map_err(|source| StoreError::Corrupt {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Some(record))
    }

    async fn write_status(
        &self,
        path: &Path,
        status: TaskStatus,
        project_id: Uuid,
    ) -> Result<bool, StoreError> {
        let Some(mut record) = self.read_record(path).await? else {
            return Ok(false);
        };
        record.set_status(status);
        Self::write_record(path, &record).await?;
        trace!(
            path = %path.display(),
            project_id = %project_id,
            status = %status,
            "plan record status written"
        );
        Ok(true)
    }

    async fn working_copy_path(&self, project_path: &Path, spec_id: &str) -> Option<PathBuf> {
        let state_root = project_path
            .join(WORKTREES_DIR)
            .join(spec_id)
            .join(WORKTREE_STATE_DIR);
        let path = self.record_path(&state_root, spec_id);
        match tokio::fs::try_exists(&path).await {
            Ok(true) => Some(path),
            Ok(false) => None,
            Err(error) => {
                debug!(
                    path = %path.display(),
                    error = %error,
                    "working-copy probe failed, secondary write skipped"
                );
                None
            }
        }
    }
}
