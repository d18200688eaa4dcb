//! Mock port implementations for testing.
//!
//! Same spirit as an in-memory fake: configurable failures, recorded calls,
//! no I/O. Used by the unit tests here and the integration tests under
//! `tests/`.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::errors::{SpawnError, StoreError};
use crate::domain::models::{PlanRecord, Project, Task, TaskStatus};
use crate::domain::ports::{
    PlanStore, RecoveryEvent, RecoveryNotifier, ResumeOptions, TaskStore, WorkerSpawner,
};

/// In-memory task store with injectable per-project failures.
#[derive(Default)]
pub struct MockTaskStore {
    projects: RwLock<Vec<Project>>,
    tasks: RwLock<HashMap<Uuid, Vec<Task>>>,
    failing_projects: RwLock<HashSet<Uuid>>,
    fail_project_listing: RwLock<bool>,
    invalidations: RwLock<Vec<Uuid>>,
}

impl MockTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_project(&self, project: Project) {
        self.projects.write().await.push(project);
    }

    pub async fn add_task(&self, task: Task) {
        self.tasks
            .write()
            .await
            .entry(task.project_id)
            .or_default()
            .push(task);
    }

    /// Make `list_tasks` fail for one project.
    pub async fn fail_tasks_for(&self, project_id: Uuid) {
        self.failing_projects.write().await.insert(project_id);
    }

    /// Make `list_projects` fail entirely.
    pub async fn fail_project_listing(&self) {
        *self.fail_project_listing.write().await = true;
    }

    /// Project ids passed to `invalidate_cache`, in call order.
    pub async fn invalidations(&self) -> Vec<Uuid> {
        self.invalidations.read().await.clone()
    }
}

#[async_trait]
impl TaskStore for MockTaskStore {
    async fn list_projects(&self) -> Result<Vec<Project>, StoreError> {
        if *self.fail_project_listing.read().await {
            return Err(StoreError::Unavailable("project listing down".into()));
        }
        Ok(self.projects.read().await.clone())
    }

    async fn list_tasks(&self, project_id: Uuid) -> Result<Vec<Task>, StoreError> {
        if self.failing_projects.read().await.contains(&project_id) {
            return Err(StoreError::Unavailable(format!(
                "task listing down for {project_id}"
            )));
        }
        Ok(self
            .tasks
            .read()
            .await
            .get(&project_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn invalidate_cache(&self, project_id: Uuid) {
        self.invalidations.write().await.push(project_id);
    }
}

/// In-memory plan store using the same path layout as the filesystem
/// adapter.
#[derive(Default)]
pub struct MockPlanStore {
    records: RwLock<HashMap<PathBuf, PlanRecord>>,
    working_copies: RwLock<HashMap<PathBuf, PathBuf>>,
    write_log: RwLock<Vec<(PathBuf, TaskStatus)>>,
    fail_writes: RwLock<bool>,
}

impl MockPlanStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_record(&self, path: PathBuf, record: PlanRecord) {
        self.records.write().await.insert(path, record);
    }

    /// Declare that `spec_id` under `project_path` has a working-copy record
    /// at `copy_path` (a record must be inserted there separately).
    pub async fn set_working_copy(&self, project_path: &Path, spec_id: &str, copy_path: PathBuf) {
        self.working_copies
            .write()
            .await
            .insert(Self::copy_key(project_path, spec_id), copy_path);
    }

    pub async fn fail_writes(&self) {
        *self.fail_writes.write().await = true;
    }

    pub async fn record_at(&self, path: &Path) -> Option<PlanRecord> {
        self.records.read().await.get(path).cloned()
    }

    pub async fn status_at(&self, path: &Path) -> Option<TaskStatus> {
        self.records.read().await.get(path).map(|r| r.status)
    }

    /// Status writes in call order.
    pub async fn writes(&self) -> Vec<(PathBuf, TaskStatus)> {
        self.write_log.read().await.clone()
    }

    fn copy_key(project_path: &Path, spec_id: &str) -> PathBuf {
        project_path.join(spec_id)
    }
}

#[async_trait]
impl PlanStore for MockPlanStore {
    fn record_path(&self, state_root: &Path, spec_id: &str) -> PathBuf {
        state_root.join("specs").join(spec_id).join("plan.json")
    }

    async fn read_record(&self, path: &Path) -> Result<Option<PlanRecord>, StoreError> {
        Ok(self.records.read().await.get(path).cloned())
    }

    async fn write_status(
        &self,
        path: &Path,
        status: TaskStatus,
        _project_id: Uuid,
    ) -> Result<bool, StoreError> {
        if *self.fail_writes.read().await {
            return Err(StoreError::Unavailable("plan store down".into()));
        }
        let mut records = self.records.write().await;
        let Some(record) = records.get_mut(path) else {
            return Ok(false);
        };
        record.set_status(status);
        self.write_log.write().await.push((path.to_path_buf(), status));
        Ok(true)
    }

    async fn working_copy_path(&self, project_path: &Path, spec_id: &str) -> Option<PathBuf> {
        self.working_copies
            .read()
            .await
            .get(&Self::copy_key(project_path, spec_id))
            .cloned()
    }
}

/// What kind of restart a spawner call asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnKind {
    Execution,
    Qa,
}

/// One recorded spawner call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnCall {
    pub kind: SpawnKind,
    pub task_id: Uuid,
    pub project_path: PathBuf,
    pub spec_id: String,
}

/// Worker spawner that records calls and fails on demand.
#[derive(Default)]
pub struct MockWorkerSpawner {
    calls: Arc<RwLock<Vec<SpawnCall>>>,
    failing_tasks: RwLock<HashSet<Uuid>>,
    fail_healthcheck: RwLock<bool>,
}

impl MockWorkerSpawner {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn fail_for_task(&self, task_id: Uuid) {
        self.failing_tasks.write().await.insert(task_id);
    }

    pub async fn fail_healthcheck(&self) {
        *self.fail_healthcheck.write().await = true;
    }

    pub async fn calls(&self) -> Vec<SpawnCall> {
        self.calls.read().await.clone()
    }

    async fn record(
        &self,
        kind: SpawnKind,
        task_id: Uuid,
        project_path: &Path,
        spec_id: &str,
    ) -> Result<(), SpawnError> {
        if self.failing_tasks.read().await.contains(&task_id) {
            return Err(SpawnError::Failed {
                task_id,
                message: "injected spawn failure".into(),
            });
        }
        self.calls.write().await.push(SpawnCall {
            kind,
            task_id,
            project_path: project_path.to_path_buf(),
            spec_id: spec_id.to_string(),
        });
        Ok(())
    }
}

#[async_trait]
impl WorkerSpawner for MockWorkerSpawner {
    async fn healthcheck(&self) -> Result<(), SpawnError> {
        if *self.fail_healthcheck.read().await {
            return Err(SpawnError::Unavailable("spawner down".into()));
        }
        Ok(())
    }

    async fn resume_qa(
        &self,
        task_id: Uuid,
        project_path: &Path,
        spec_id: &str,
    ) -> Result<(), SpawnError> {
        self.record(SpawnKind::Qa, task_id, project_path, spec_id)
            .await
    }

    async fn resume_execution(
        &self,
        task_id: Uuid,
        project_path: &Path,
        spec_id: &str,
        _options: ResumeOptions,
    ) -> Result<(), SpawnError> {
        self.record(SpawnKind::Execution, task_id, project_path, spec_id)
            .await
    }
}

/// Notifier that remembers every event.
#[derive(Default)]
pub struct RecordingNotifier {
    events: RwLock<Vec<RecoveryEvent>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<RecoveryEvent> {
        self.events.read().await.clone()
    }
}

#[async_trait]
impl RecoveryNotifier for RecordingNotifier {
    async fn notify(&self, event: RecoveryEvent) {
        self.events.write().await.push(event);
    }
}
