//! Workflow phase protocol.
//!
//! Phases are the worker-side view of progress: planning → coding →
//! qa_review/qa_fixing → complete, with `failed` as the terminal failure
//! phase. The predicates here are pure and total over the closed enum;
//! string inputs go through [`Phase::parse`], which returns `None` for
//! anything unknown so callers reject rather than guess.

use serde::{Deserialize, Serialize};

/// Coarse workflow stage reported by a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// No work started yet
    Idle,
    /// Producing a plan
    Planning,
    /// Executing the plan
    Coding,
    /// Automated review running
    QaReview,
    /// Addressing automated review findings
    QaFixing,
    /// Finished successfully
    Complete,
    /// Finished with a failure
    Failed,
}

impl Default for Phase {
    fn default() -> Self {
        Self::Idle
    }
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Planning => "planning",
            Self::Coding => "coding",
            Self::QaReview => "qa_review",
            Self::QaFixing => "qa_fixing",
            Self::Complete => "complete",
            Self::Failed => "failed",
        }
    }

    /// Parse a phase name. Unknown values return `None`; callers must treat
    /// that as an invalid transition, never as a pass-through.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "idle" => Some(Self::Idle),
            "planning" => Some(Self::Planning),
            "coding" => Some(Self::Coding),
            "qa_review" | "qareview" => Some(Self::QaReview),
            "qa_fixing" | "qafixing" => Some(Self::QaFixing),
            "complete" | "completed" => Some(Self::Complete),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Check if this phase ends the workflow.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }

    /// True iff this phase sits at or past `other` in workflow order.
    pub fn at_or_beyond(&self, other: Self) -> bool {
        self.rank() >= other.rank()
    }

    /// Position in workflow order. `qa_review` and `qa_fixing` share a rank,
    /// as do the two terminal phases: moving between them is not regression.
    pub(crate) fn rank(&self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::Planning => 1,
            Self::Coding => 2,
            Self::QaReview | Self::QaFixing => 3,
            Self::Complete | Self::Failed => 4,
        }
    }

    /// The phase that must already be in `completed_phases` before this one
    /// may become active.
    fn prerequisite(&self) -> Option<Self> {
        match self {
            Self::Idle | Self::Planning | Self::Failed => None,
            Self::Coding => Some(Self::Planning),
            Self::QaReview => Some(Self::Coding),
            Self::QaFixing => Some(Self::QaReview),
            Self::Complete => Some(Self::Coding),
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// True iff `next` is strictly earlier in workflow order than `current`,
/// independent of which phases are marked complete.
pub fn would_phase_regress(current: Phase, next: Phase) -> bool {
    next.rank() < current.rank()
}

/// Full legality check for a proposed phase transition.
///
/// Rejects regression, rejects leaving a terminal phase, and rejects
/// advancing into a phase whose prerequisite has not been marked complete.
/// The prerequisite rule keeps two phases from looking simultaneously active
/// when progress reports arrive out of order.
pub fn is_valid_phase_transition(current: Phase, next: Phase, completed_phases: &[Phase]) -> bool {
    if current.is_terminal() && next != current {
        return false;
    }
    if would_phase_regress(current, next) {
        return false;
    }
    match next.prerequisite() {
        Some(required) => completed_phases.contains(&required),
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regression_detection() {
        assert!(would_phase_regress(Phase::Coding, Phase::Planning));
        assert!(would_phase_regress(Phase::QaReview, Phase::Coding));
        assert!(would_phase_regress(Phase::Complete, Phase::QaFixing));
        assert!(would_phase_regress(Phase::Planning, Phase::Idle));

        assert!(!would_phase_regress(Phase::Planning, Phase::Coding));
        assert!(!would_phase_regress(Phase::Coding, Phase::Coding));
        // Shared rank: neither direction regresses.
        assert!(!would_phase_regress(Phase::QaReview, Phase::QaFixing));
        assert!(!would_phase_regress(Phase::QaFixing, Phase::QaReview));
        assert!(!would_phase_regress(Phase::Complete, Phase::Failed));

        assert!(Phase::QaReview.at_or_beyond(Phase::Coding));
        assert!(Phase::Coding.at_or_beyond(Phase::Coding));
        assert!(!Phase::Planning.at_or_beyond(Phase::Coding));
    }

    #[test]
    fn test_prerequisite_gating() {
        // Coding needs planning completed first.
        assert!(!is_valid_phase_transition(
            Phase::Planning,
            Phase::Coding,
            &[]
        ));
        assert!(is_valid_phase_transition(
            Phase::Planning,
            Phase::Coding,
            &[Phase::Planning]
        ));

        // QA review needs coding completed.
        assert!(!is_valid_phase_transition(
            Phase::Coding,
            Phase::QaReview,
            &[Phase::Planning]
        ));
        assert!(is_valid_phase_transition(
            Phase::Coding,
            Phase::QaReview,
            &[Phase::Planning, Phase::Coding]
        ));
    }

    #[test]
    fn test_no_leaving_terminal_phase() {
        assert!(!is_valid_phase_transition(
            Phase::Complete,
            Phase::Coding,
            &[Phase::Planning, Phase::Coding]
        ));
        assert!(!is_valid_phase_transition(
            Phase::Failed,
            Phase::Planning,
            &[]
        ));
    }

    #[test]
    fn test_regression_always_invalid() {
        assert!(!is_valid_phase_transition(
            Phase::Coding,
            Phase::Planning,
            &[Phase::Planning]
        ));
    }

    #[test]
    fn test_planning_needs_no_prerequisite() {
        assert!(is_valid_phase_transition(Phase::Idle, Phase::Planning, &[]));
    }

    #[test]
    fn test_failure_allowed_from_any_active_phase() {
        assert!(is_valid_phase_transition(Phase::Planning, Phase::Failed, &[]));
        assert!(is_valid_phase_transition(
            Phase::QaFixing,
            Phase::Failed,
            &[]
        ));
    }

    #[test]
    fn test_unknown_phase_fails_closed() {
        assert_eq!(Phase::parse("deploying"), None);
        assert_eq!(Phase::parse(""), None);
        assert_eq!(Phase::parse("qa_review"), Some(Phase::QaReview));
        assert_eq!(Phase::parse("COMPLETE"), Some(Phase::Complete));
    }

    #[test]
    fn test_terminal_phases() {
        assert!(Phase::Complete.is_terminal());
        assert!(Phase::Failed.is_terminal());
        assert!(!Phase::QaFixing.is_terminal());
        assert!(!Phase::Idle.is_terminal());
    }
}
