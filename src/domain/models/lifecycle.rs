//! Task lifecycle state machine.
//!
//! The machine is a pure transition function over explicit state and event
//! enums: `transition(current, event)` returns the next state plus the
//! effects to apply, or `None` when the event has no transition in the
//! current state (a no-op by state machine semantics, never an error). All
//! I/O — persistence, notification — happens in the orchestrator that applies
//! the returned effects, which keeps this module trivially unit-testable.
//!
//! `done` is terminal: no event, including operator overrides, leaves it.

use serde::{Deserialize, Serialize};

use super::decision::{classify_exit, ExitRule, ExitSignal};
use super::phase::Phase;
use super::status::{ReviewReason, TaskStatus};

/// Internal machine state, finer-grained than [`TaskStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Backlog,
    Planning,
    /// Plan produced, gated on human approval
    AwaitingPlanReview,
    Coding,
    QaReview,
    QaFixing,
    HumanReview,
    Error,
    Done,
}

impl LifecycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Backlog => "backlog",
            Self::Planning => "planning",
            Self::AwaitingPlanReview => "awaiting_plan_review",
            Self::Coding => "coding",
            Self::QaReview => "qa_review",
            Self::QaFixing => "qa_fixing",
            Self::HumanReview => "human_review",
            Self::Error => "error",
            Self::Done => "done",
        }
    }

    /// Check if this is the terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// The externally visible status for this machine state.
    ///
    /// `awaiting_plan_review` shows as `human_review`: from the outside the
    /// task is waiting on a person either way.
    pub fn status(&self) -> TaskStatus {
        match self {
            Self::Backlog => TaskStatus::Backlog,
            Self::Planning | Self::Coding => TaskStatus::InProgress,
            Self::QaReview | Self::QaFixing => TaskStatus::AiReview,
            Self::AwaitingPlanReview | Self::HumanReview => TaskStatus::HumanReview,
            Self::Error => TaskStatus::Error,
            Self::Done => TaskStatus::Done,
        }
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Operator override targets; the only statuses that may be forced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManualStatus {
    Backlog,
    /// Caller supplies the reason; `None` is accepted but flagged upstream
    HumanReview(Option<ReviewReason>),
    Done,
}

/// Everything that can happen to a task's machine.
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleEvent {
    PlanningStarted,
    PlanningComplete {
        /// Whether the task gates on plan approval before coding
        require_review: bool,
    },
    /// Reported by progress ticks; defined for completeness, coding is
    /// entered through `PlanningComplete`
    CodingStarted,
    QaStarted,
    QaPassed,
    QaFailed,
    UserStopped,
    UserResumed,
    /// Global: routes through the exit decision table from any live state
    ProcessExited(ExitSignal),
    /// Global: operator escape hatch
    ManualOverride(ManualStatus),
}

impl LifecycleEvent {
    /// Short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::PlanningStarted => "planning_started",
            Self::PlanningComplete { .. } => "planning_complete",
            Self::CodingStarted => "coding_started",
            Self::QaStarted => "qa_started",
            Self::QaPassed => "qa_passed",
            Self::QaFailed => "qa_failed",
            Self::UserStopped => "user_stopped",
            Self::UserResumed => "user_resumed",
            Self::ProcessExited(_) => "process_exited",
            Self::ManualOverride(_) => "manual_override",
        }
    }
}

/// Current machine position: state plus the review-reason context.
///
/// The reason is set by transitions entering `human_review` or `error` (and
/// by the qa_review → qa_fixing edge) and cleared by transitions leaving
/// them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineState {
    pub state: LifecycleState,
    pub review_reason: Option<ReviewReason>,
}

impl Default for MachineState {
    fn default() -> Self {
        Self::new()
    }
}

impl MachineState {
    /// Initial state for a brand-new task.
    pub fn new() -> Self {
        Self {
            state: LifecycleState::Backlog,
            review_reason: None,
        }
    }

    /// Adopt an existing task's position, so a restarted orchestrator does
    /// not replay the task's early life. The phase disambiguates statuses
    /// that cover two machine states.
    pub fn seeded(status: TaskStatus, phase: Option<Phase>) -> Self {
        let state = match status {
            TaskStatus::Backlog => LifecycleState::Backlog,
            TaskStatus::InProgress => match phase {
                Some(Phase::Planning) => LifecycleState::Planning,
                _ => LifecycleState::Coding,
            },
            TaskStatus::AiReview => match phase {
                Some(Phase::QaFixing) => LifecycleState::QaFixing,
                _ => LifecycleState::QaReview,
            },
            TaskStatus::HumanReview => LifecycleState::HumanReview,
            TaskStatus::Error => LifecycleState::Error,
            TaskStatus::Done => LifecycleState::Done,
        };
        Self {
            state,
            review_reason: None,
        }
    }
}

/// What the orchestrator must do after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Persist and publish the externally visible status
    EmitStatus {
        status: TaskStatus,
        reason: Option<ReviewReason>,
    },
}

/// A successful transition: the new position and its effects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub next: MachineState,
    pub effects: Vec<Effect>,
}

fn to(state: LifecycleState, reason: Option<ReviewReason>) -> Option<Transition> {
    Some(Transition {
        next: MachineState {
            state,
            review_reason: reason,
        },
        effects: vec![Effect::EmitStatus {
            status: state.status(),
            reason,
        }],
    })
}

/// Pure transition function.
///
/// Returns `None` when the event has no transition from the current state;
/// callers treat that as an ignored event. `done` ignores everything.
pub fn transition(current: &MachineState, event: &LifecycleEvent) -> Option<Transition> {
    use LifecycleState as S;

    if current.state.is_terminal() {
        return None;
    }

    // Global events apply from any live state.
    match event {
        LifecycleEvent::ProcessExited(signal) => {
            return match classify_exit(signal) {
                ExitRule::NonZeroExit => to(S::Error, Some(ReviewReason::Errors)),
                ExitRule::QaApproved | ExitRule::AllSubtasksDone | ExitRule::SomeSubtasksDone => {
                    to(S::HumanReview, Some(ReviewReason::Completed))
                }
                ExitRule::PlanReviewPending => to(S::HumanReview, Some(ReviewReason::PlanReview)),
                // Ambiguous successful exit: the worker is gone either way,
                // so the task lands in front of a human.
                ExitRule::CleanNoWork => to(S::HumanReview, Some(ReviewReason::Stopped)),
            };
        }
        LifecycleEvent::ManualOverride(target) => {
            return match target {
                ManualStatus::Backlog => to(S::Backlog, None),
                ManualStatus::HumanReview(reason) => to(S::HumanReview, *reason),
                ManualStatus::Done => to(S::Done, None),
            };
        }
        _ => {}
    }

    match (current.state, event) {
        (S::Backlog, LifecycleEvent::PlanningStarted) => to(S::Planning, None),

        (S::Planning, LifecycleEvent::PlanningComplete { require_review: true }) => {
            to(S::AwaitingPlanReview, Some(ReviewReason::PlanReview))
        }
        (S::Planning, LifecycleEvent::PlanningComplete { require_review: false }) => {
            to(S::Coding, None)
        }

        (S::AwaitingPlanReview, LifecycleEvent::UserResumed) => to(S::Coding, None),
        (S::AwaitingPlanReview, LifecycleEvent::UserStopped) => to(S::Backlog, None),

        (S::Coding, LifecycleEvent::QaStarted) => to(S::QaReview, None),
        (S::Coding, LifecycleEvent::UserStopped) => to(S::Backlog, None),

        (S::QaReview, LifecycleEvent::QaPassed) => {
            to(S::HumanReview, Some(ReviewReason::Completed))
        }
        (S::QaReview, LifecycleEvent::QaFailed) => {
            to(S::QaFixing, Some(ReviewReason::QaRejected))
        }

        (S::QaFixing, LifecycleEvent::QaPassed) => {
            to(S::HumanReview, Some(ReviewReason::Completed))
        }
        (S::QaFixing, LifecycleEvent::QaFailed) => {
            to(S::HumanReview, Some(ReviewReason::QaRejected))
        }

        (S::HumanReview | S::Error, LifecycleEvent::UserResumed) => to(S::Coding, None),

        _ => None,
    }
}
