//! Worker restarts through configured command templates.

use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::errors::SpawnError;
use crate::domain::models::SpawnerConfig;
use crate::domain::ports::{ResumeOptions, WorkerSpawner};

/// Spawner that launches resume commands from [`SpawnerConfig`] templates.
///
/// Workers are detached: the command is spawned in the project workspace and
/// left to run; whether a restart on an already-healthy task is harmless is
/// the worker command's responsibility. Template tokens may contain
/// `{task_id}`, `{project_path}` and `{spec_id}` placeholders.
pub struct CommandSpawner {
    config: SpawnerConfig,
}

impl CommandSpawner {
    pub fn new(config: SpawnerConfig) -> Self {
        Self { config }
    }

    /// Substitute placeholders into every token of a template.
    fn render(template: &[String], task_id: Uuid, project_path: &Path, spec_id: &str) -> Vec<String> {
        let task_id = task_id.to_string();
        let project_path = project_path.display().to_string();
        template
            .iter()
            .map(|token| {
                token
                    .replace("{task_id}", &task_id)
                    .replace("{project_path}", &project_path)
                    .replace("{spec_id}", spec_id)
            })
            .collect()
    }

    fn launch(
        argv: &[String],
        task_id: Uuid,
        project_path: &Path,
    ) -> Result<(), SpawnError> {
        let (program, args) = argv.split_first().ok_or_else(|| {
            SpawnError::Unavailable("empty resume command template".to_string())
        })?;
        let child = Command::new(program)
            .args(args)
            .current_dir(project_path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|error| SpawnError::Failed {
                task_id,
                message: format!("failed to spawn `{program}`: {error}"),
            })?;
        info!(
            task_id = %task_id,
            program = %program,
            pid = child.id().unwrap_or(0),
            "worker resume command spawned"
        );
        Ok(())
    }
}

#[async_trait]
impl WorkerSpawner for CommandSpawner {
    async fn healthcheck(&self) -> Result<(), SpawnError> {
        if self.config.resume_execution.is_empty() || self.config.resume_qa.is_empty() {
            return Err(SpawnError::Unavailable(
                "resume command templates not configured".to_string(),
            ));
        }
        Ok(())
    }

    async fn resume_qa(
        &self,
        task_id: Uuid,
        project_path: &Path,
        spec_id: &str,
    ) -> Result<(), SpawnError> {
        let argv = Self::render(&self.config.resume_qa, task_id, project_path, spec_id);
        debug!(task_id = %task_id, argv = ?argv, "resuming automated review");
        Self::launch(&argv, task_id, project_path)
    }

    async fn resume_execution(
        &self,
        task_id: Uuid,
        project_path: &Path,
        spec_id: &str,
        options: ResumeOptions,
    ) -> Result<(), SpawnError> {
        let mut argv = Self::render(&self.config.resume_execution, task_id, project_path, spec_id);
        if options.continue_from_progress {
            argv.push("--continue".to_string());
        }
        debug!(task_id = %task_id, argv = ?argv, "resuming execution");
        Self::launch(&argv, task_id, project_path)
    }
}
