//! CLI command implementations.

pub mod daemon;
pub mod scan;
pub mod status;

use std::sync::Arc;

use anyhow::{bail, Result};

use crate::adapters::{CommandSpawner, FsPlanStore, FsTaskStore};
use crate::domain::models::{Config, Project};
use crate::domain::ports::TracingNotifier;
use crate::services::RecoveryScanner;

/// Concrete port wiring shared by the commands.
pub(crate) struct Services {
    pub task_store: Arc<FsTaskStore>,
    pub plan_store: Arc<FsPlanStore>,
    pub spawner: Arc<CommandSpawner>,
    pub projects: Vec<Project>,
}

/// Build the file-backed service stack from configuration.
pub(crate) fn build_services(config: &Config) -> Result<Services> {
    if config.projects.is_empty() {
        bail!("no projects configured; add projects to .drover/config.yaml");
    }
    let projects: Vec<Project> = config.projects.iter().map(|p| p.resolve()).collect();
    Ok(Services {
        task_store: Arc::new(FsTaskStore::new(projects.clone())),
        plan_store: Arc::new(FsPlanStore::new()),
        spawner: Arc::new(CommandSpawner::new(config.spawner.clone())),
        projects,
    })
}

impl Services {
    /// A scanner over this wiring, reporting outcomes to the log.
    pub(crate) fn scanner(&self, config: &Config) -> Arc<RecoveryScanner> {
        Arc::new(RecoveryScanner::new(
            self.task_store.clone(),
            self.plan_store.clone(),
            self.spawner.clone(),
            Arc::new(TracingNotifier::new()),
            config.recovery,
        ))
    }
}
