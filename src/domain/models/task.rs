//! Task and project domain models.
//!
//! Tasks are created by the surrounding system when work is scheduled and
//! mutated here only through the orchestrator. Projects are read-only from
//! this subsystem's perspective apart from persistence writes under their
//! state root.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

use super::phase::Phase;
use super::status::TaskStatus;

/// Worker-reported execution progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionProgress {
    /// Currently active phase
    pub phase: Phase,
    /// Progress through the active phase, 0..=100
    #[serde(default)]
    pub phase_progress: f32,
    /// Progress through the whole workflow, 0..=100
    #[serde(default)]
    pub overall_progress: f32,
    /// Phases the worker has marked complete
    #[serde(default)]
    pub completed_phases: Vec<Phase>,
}

impl ExecutionProgress {
    pub fn new(phase: Phase) -> Self {
        Self {
            phase,
            phase_progress: 0.0,
            overall_progress: 0.0,
            completed_phases: Vec::new(),
        }
    }

    pub fn with_completed(mut self, phases: Vec<Phase>) -> Self {
        self.completed_phases = phases;
        self
    }

    pub fn with_overall_progress(mut self, pct: f32) -> Self {
        self.overall_progress = pct;
        self
    }
}

/// One subtask line item with its completion flag. Identifiers are assigned
/// by workers and opaque here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subtask {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub completed: bool,
}

/// Per-task knobs set at scheduling time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TaskMetadata {
    /// Gate the task on human plan approval before coding starts
    #[serde(default)]
    pub require_review_before_coding: bool,
}

/// A unit of work driven by an external worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Stable identity, distinct from any display identifier
    pub id: Uuid,
    /// Owning project
    pub project_id: Uuid,
    /// Stable workflow identifier; names the task's state directory on disk
    pub spec_id: String,
    pub title: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub execution_progress: Option<ExecutionProgress>,
    #[serde(default)]
    pub subtasks: Vec<Subtask>,
    #[serde(default)]
    pub metadata: TaskMetadata,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl Task {
    pub fn new(project_id: Uuid, spec_id: impl Into<String>, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            project_id,
            spec_id: spec_id.into(),
            title: title.into(),
            status: TaskStatus::Backlog,
            execution_progress: None,
            subtasks: Vec::new(),
            metadata: TaskMetadata::default(),
            created_at: now,
            last_updated: now,
        }
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_progress(mut self, progress: ExecutionProgress) -> Self {
        self.execution_progress = Some(progress);
        self
    }

    pub fn with_require_plan_review(mut self, require: bool) -> Self {
        self.metadata.require_review_before_coding = require;
        self
    }

    /// The phase the task was last seen in, `idle` when no progress exists.
    pub fn current_phase(&self) -> Phase {
        self.execution_progress
            .as_ref()
            .map_or(Phase::Idle, |p| p.phase)
    }
}

/// A workspace with its own durable workflow state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    /// Workspace root
    pub path: PathBuf,
    /// Directory holding durable workflow state for this project's tasks
    pub state_root: PathBuf,
}

impl Project {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let state_root = path.join(".drover");
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            path,
            state_root,
        }
    }

    pub fn with_state_root(mut self, state_root: impl Into<PathBuf>) -> Self {
        self.state_root = state_root.into();
        self
    }
}
