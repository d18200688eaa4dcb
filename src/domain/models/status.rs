//! Task status and review reason.
//!
//! Status is the externally visible task state, coarser than the worker-side
//! phase. `human_review` carries a [`ReviewReason`] explaining why the task
//! is waiting on a human.

use serde::{Deserialize, Serialize};

/// Externally visible state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Not yet started
    Backlog,
    /// Worker is planning or coding
    InProgress,
    /// Automated quality review is running
    AiReview,
    /// Waiting on a human decision
    HumanReview,
    /// Worker failed; waiting on a human
    Error,
    /// Accepted and closed
    Done,
}

impl Default for TaskStatus {
    fn default() -> Self {
        Self::Backlog
    }
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Backlog => "backlog",
            Self::InProgress => "in_progress",
            Self::AiReview => "ai_review",
            Self::HumanReview => "human_review",
            Self::Error => "error",
            Self::Done => "done",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "backlog" => Some(Self::Backlog),
            "in_progress" | "inprogress" => Some(Self::InProgress),
            "ai_review" | "aireview" => Some(Self::AiReview),
            "human_review" | "humanreview" => Some(Self::HumanReview),
            "error" => Some(Self::Error),
            "done" => Some(Self::Done),
            _ => None,
        }
    }

    /// Check if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// Statuses that imply a worker should be making progress.
    ///
    /// These are the statuses the recovery scanner watches for staleness.
    pub fn is_worker_active(&self) -> bool {
        matches!(self, Self::InProgress | Self::AiReview)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why a task is sitting in `human_review`.
///
/// A `human_review` status without a reason is a defect worth surfacing; the
/// orchestrator logs a warning when it sees one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewReason {
    /// Plan is ready and the task is gated on plan approval
    PlanReview,
    /// Work finished and awaits acceptance
    Completed,
    /// Worker exited with a failure
    Errors,
    /// Automated review rejected the work
    QaRejected,
    /// Worker stopped without a clearer outcome
    Stopped,
}

impl ReviewReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PlanReview => "plan_review",
            Self::Completed => "completed",
            Self::Errors => "errors",
            Self::QaRejected => "qa_rejected",
            Self::Stopped => "stopped",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "plan_review" | "planreview" => Some(Self::PlanReview),
            "completed" => Some(Self::Completed),
            "errors" => Some(Self::Errors),
            "qa_rejected" | "qarejected" => Some(Self::QaRejected),
            "stopped" => Some(Self::Stopped),
            _ => None,
        }
    }
}

impl std::fmt::Display for ReviewReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
