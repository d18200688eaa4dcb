use crate::domain::errors::StoreError;
use crate::domain::models::{Project, Task};
use async_trait::async_trait;
use uuid::Uuid;

/// Port for task and project lookup.
///
/// Implementations may cache per project; `invalidate_cache` tells them a
/// project's task statuses changed behind their back.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// List every known project
    async fn list_projects(&self) -> Result<Vec<Project>, StoreError>;

    /// List the tasks of one project
    async fn list_tasks(&self, project_id: Uuid) -> Result<Vec<Task>, StoreError>;

    /// Drop any cached task data for the project
    async fn invalidate_cache(&self, project_id: Uuid);
}
