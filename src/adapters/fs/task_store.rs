//! Filesystem task store.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::errors::StoreError;
use crate::domain::models::{Project, Task};
use crate::domain::ports::TaskStore;

/// Tasks discovered from `task.json` files under each project's state root.
///
/// Projects are declared in configuration; tasks are whatever the scheduling
/// side has written to `<state_root>/specs/<spec_id>/task.json`. Listings are
/// cached per project until someone calls `invalidate_cache`, which the
/// orchestrator does after every persisted status change.
pub struct FsTaskStore {
    projects: Vec<Project>,
    cache: RwLock<HashMap<Uuid, Vec<Task>>>,
}

impl FsTaskStore {
    pub fn new(projects: Vec<Project>) -> Self {
        Self {
            projects,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Scan a project's spec directories for task metadata files.
    ///
    /// A corrupt `task.json` is skipped with a warning rather than hiding
    /// the project's other tasks; a missing `specs/` directory is an empty
    /// project, not an error.
    async fn scan(state_root: &Path) -> Result<Vec<Task>, StoreError> {
        let specs = state_root.join("specs");
        let mut entries = match tokio::fs::read_dir(&specs).await {
            Ok(entries) => entries,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(StoreError::Io {
                    path: specs,
                    source,
                })
            }
        };

        let mut tasks = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|source| StoreError::Io {
            path: specs.clone(),
            source,
        })? {
            let task_file = entry.path().join("task.json");
            let content = match tokio::fs::read_to_string(&task_file).await {
                Ok(content) => content,
                Err(error) if error.kind() == std::io::ErrorKind::NotFound => continue,
                Err(source) => {
                    return Err(StoreError::Io {
                        path: task_file,
                        source,
                    })
                }
            };
            match serde_json::from_str::<Task>(&content) {
                Ok(task) => tasks.push(task),
                Err(error) => {
                    warn!(
                        path = %task_file.display(),
                        error = %error,
                        "corrupt task file skipped"
                    );
                }
            }
        }
        tasks.sort_by(|a, b| a.spec_id.cmp(&b.spec_id));
        Ok(tasks)
    }
}

#[async_trait]
impl TaskStore for FsTaskStore {
    async fn list_projects(&self) -> Result<Vec<Project>, StoreError> {
        Ok(self.projects.clone())
    }

    async fn list_tasks(&self, project_id: Uuid) -> Result<Vec<Task>, StoreError> {
        if let Some(tasks) = self.cache.read().await.get(&project_id) {
            return Ok(tasks.clone());
        }
        let Some(project) = self.projects.iter().find(|p| p.id == project_id) else {
            debug!(project_id = %project_id, "task listing for unknown project");
            return Ok(Vec::new());
        };
        let tasks = Self::scan(&project.state_root).await?;
        self.cache.write().await.insert(project_id, tasks.clone());
        Ok(tasks)
    }

    async fn invalidate_cache(&self, project_id: Uuid) {
        if self.cache.write().await.remove(&project_id).is_some() {
            debug!(project_id = %project_id, "task cache invalidated");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::TaskStatus;
    use tempfile::TempDir;

    async fn write_task(project: &Project, task: &Task) {
        let dir = project.state_root.join("specs").join(&task.spec_id);
        tokio::fs::create_dir_all(&dir).await.unwrap();
        tokio::fs::write(
            dir.join("task.json"),
            serde_json::to_string_pretty(task).unwrap(),
        )
        .await
        .unwrap();
    }

    async fn fixture() -> (FsTaskStore, Project, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let project = Project::new("demo", dir.path());
        let store = FsTaskStore::new(vec![project.clone()]);
        (store, project, dir)
    }

    #[tokio::test]
    async fn test_lists_declared_projects() {
        let (store, project, _dir) = fixture().await;
        let projects = store.list_projects().await.unwrap();
        assert_eq!(projects, vec![project]);
    }

    #[tokio::test]
    async fn test_missing_specs_dir_is_empty_project() {
        let (store, project, _dir) = fixture().await;
        assert!(store.list_tasks(project.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_scans_tasks_ordered_by_spec_id() {
        let (store, project, _dir) = fixture().await;
        let b = Task::new(project.id, "spec-b", "B");
        let a = Task::new(project.id, "spec-a", "A").with_status(TaskStatus::InProgress);
        write_task(&project, &b).await;
        write_task(&project, &a).await;

        let tasks = store.list_tasks(project.id).await.unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].id, a.id);
        assert_eq!(tasks[0].status, TaskStatus::InProgress);
        assert_eq!(tasks[1].id, b.id);
    }

    #[tokio::test]
    async fn test_corrupt_task_file_skipped() {
        let (store, project, _dir) = fixture().await;
        let good = Task::new(project.id, "spec-good", "Good");
        write_task(&project, &good).await;
        let bad_dir = project.state_root.join("specs/spec-bad");
        tokio::fs::create_dir_all(&bad_dir).await.unwrap();
        tokio::fs::write(bad_dir.join("task.json"), "not json")
            .await
            .unwrap();

        let tasks = store.list_tasks(project.id).await.unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].id, good.id);
    }

    #[tokio::test]
    async fn test_cache_serves_until_invalidated() {
        let (store, project, _dir) = fixture().await;
        let task = Task::new(project.id, "spec-a", "A");
        write_task(&project, &task).await;

        assert_eq!(store.list_tasks(project.id).await.unwrap().len(), 1);

        // A second task appears behind the cache's back.
        write_task(&project, &Task::new(project.id, "spec-b", "B")).await;
        assert_eq!(store.list_tasks(project.id).await.unwrap().len(), 1);

        store.invalidate_cache(project.id).await;
        assert_eq!(store.list_tasks(project.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_project_lists_nothing() {
        let (store, _project, _dir) = fixture().await;
        assert!(store.list_tasks(Uuid::new_v4()).await.unwrap().is_empty());
    }
}
