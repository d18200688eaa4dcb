//! Common test utilities for integration tests
//!
//! Scaffolds the on-disk project layout the file-backed adapters expect:
//! `task.json` and `plan.json` under `<state_root>/specs/<spec_id>/`, plus
//! optional worktree record replicas.

use std::path::PathBuf;

use chrono::{Duration, Utc};
use tempfile::TempDir;
use uuid::Uuid;

use drover::domain::models::{PlanRecord, Project, Task, TaskStatus};

/// A project rooted in a temporary directory, cleaned up on drop.
pub struct TempProject {
    pub dir: TempDir,
    pub project: Project,
}

impl TempProject {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let project = Project::new("demo", dir.path());
        Self { dir, project }
    }

    pub fn record_path(&self, spec_id: &str) -> PathBuf {
        self.project
            .state_root
            .join("specs")
            .join(spec_id)
            .join("plan.json")
    }

    pub fn worktree_record_path(&self, spec_id: &str) -> PathBuf {
        self.project
            .path
            .join(".worktrees")
            .join(spec_id)
            .join(".drover/specs")
            .join(spec_id)
            .join("plan.json")
    }

    /// Schedule a task: write its `task.json` and a matching plan record.
    pub async fn schedule(&self, spec_id: &str, status: TaskStatus) -> Task {
        let task = Task::new(self.project.id, spec_id, spec_id).with_status(status);
        self.write_task(&task).await;
        self.write_record(&PlanRecord::new(task.id, status), &self.record_path(spec_id))
            .await;
        task
    }

    pub async fn write_task(&self, task: &Task) {
        let dir = self.project.state_root.join("specs").join(&task.spec_id);
        tokio::fs::create_dir_all(&dir).await.unwrap();
        tokio::fs::write(
            dir.join("task.json"),
            serde_json::to_string_pretty(task).unwrap(),
        )
        .await
        .unwrap();
    }

    pub async fn write_record(&self, record: &PlanRecord, path: &PathBuf) {
        tokio::fs::create_dir_all(path.parent().unwrap()).await.unwrap();
        tokio::fs::write(path, serde_json::to_string_pretty(record).unwrap())
            .await
            .unwrap();
    }

    /// Backdate a record so the scanner sees it as stale.
    pub async fn backdate_record(&self, spec_id: &str, task_id: Uuid, status: TaskStatus, age_ms: i64) {
        let record = PlanRecord::new(task_id, status)
            .with_last_updated(Utc::now() - Duration::milliseconds(age_ms));
        self.write_record(&record, &self.record_path(spec_id)).await;
    }

    pub async fn read_record(&self, path: &PathBuf) -> PlanRecord {
        let content = tokio::fs::read_to_string(path).await.unwrap();
        serde_json::from_str(&content).unwrap()
    }

    pub async fn record_status(&self, spec_id: &str) -> TaskStatus {
        self.read_record(&self.record_path(spec_id)).await.status
    }
}
