//! Core domain models: statuses, phases, the lifecycle machine, decision
//! logic, tasks, plan records and configuration.

pub mod config;
pub mod decision;
pub mod lifecycle;
pub mod phase;
pub mod plan;
pub mod status;
pub mod task;

pub use config::{
    Config, LoggingConfig, ProjectConfig, RecoveryConfig, RecoveryConfigPatch, RegistryConfig,
    SpawnerConfig,
};
pub use decision::{classify_exit, decide_exit, status_for_progress, ExitDecision, ExitRule,
    ExitSignal};
pub use lifecycle::{
    transition, Effect, LifecycleEvent, LifecycleState, MachineState, ManualStatus, Transition,
};
pub use phase::{is_valid_phase_transition, would_phase_regress, Phase};
pub use plan::{PlanPhase, PlanRecord, PlanStatus, PlanStep, StepStatus, SubtaskFlags};
pub use status::{ReviewReason, TaskStatus};
pub use task::{ExecutionProgress, Project, Subtask, Task, TaskMetadata};
