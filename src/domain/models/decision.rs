//! Pure status decision logic.
//!
//! Two raw signal kinds come in from workers: progress ticks and process
//! exits. Nothing here mutates state; these functions map a signal to a
//! target status (and, for exits, a review reason) that callers apply.

use serde::{Deserialize, Serialize};

use super::phase::Phase;
use super::plan::PlanRecord;
use super::status::{ReviewReason, TaskStatus};

/// Everything known about a worker process at the moment it exited.
///
/// The subtask booleans are summaries of the durable plan record; use
/// [`ExitSignal::from_record`] when a record is at hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitSignal {
    /// Raw process exit code
    pub exit_code: i32,
    /// The plan record contains at least one subtask
    pub has_subtasks: bool,
    /// Every subtask in the record is done
    pub all_subtasks_done: bool,
    /// At least one subtask in the record is done
    pub has_completed_subtasks: bool,
    /// The automated reviewer approved the work
    pub qa_approved: bool,
    /// The task is gated on plan approval before coding
    pub require_review_before_coding: bool,
}

impl ExitSignal {
    /// A clean exit with no flags set.
    pub fn clean() -> Self {
        Self {
            exit_code: 0,
            has_subtasks: false,
            all_subtasks_done: false,
            has_completed_subtasks: false,
            qa_approved: false,
            require_review_before_coding: false,
        }
    }

    /// Build a signal from an exit code and the task's durable record.
    pub fn from_record(exit_code: i32, record: &PlanRecord, require_review: bool) -> Self {
        let flags = record.subtask_flags();
        Self {
            exit_code,
            has_subtasks: flags.has_subtasks,
            all_subtasks_done: flags.all_subtasks_done,
            has_completed_subtasks: flags.has_completed_subtasks,
            qa_approved: record.qa_approved(),
            require_review_before_coding: require_review,
        }
    }
}

/// Which rule of the exit decision table matched, in precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitRule {
    /// (1) Non-zero exit code
    NonZeroExit,
    /// (2) Automated review approved
    QaApproved,
    /// (3) Subtasks exist and all are done
    AllSubtasksDone,
    /// (4) Some subtasks are done
    SomeSubtasksDone,
    /// (5) Plan-review gate with nothing completed and no approval
    PlanReviewPending,
    /// (6) Successful exit with no completed work and no review requirement
    CleanNoWork,
}

/// Outcome of the exit decision: the status to adopt (if any) and the review
/// reason to attach.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitDecision {
    /// New status, or `None` to keep the current one
    pub status: Option<TaskStatus>,
    /// Review reason accompanying the status
    pub reason: Option<ReviewReason>,
}

/// Run the six-rule decision table; first match wins.
///
/// QA approval and completed work always outrank a pending plan-review
/// requirement, which is why rules (2)–(4) sit above rule (5).
pub fn classify_exit(signal: &ExitSignal) -> ExitRule {
    if signal.exit_code != 0 {
        ExitRule::NonZeroExit
    } else if signal.qa_approved {
        ExitRule::QaApproved
    } else if signal.has_subtasks && signal.all_subtasks_done {
        ExitRule::AllSubtasksDone
    } else if signal.has_completed_subtasks {
        ExitRule::SomeSubtasksDone
    } else if signal.require_review_before_coding {
        ExitRule::PlanReviewPending
    } else {
        ExitRule::CleanNoWork
    }
}

/// Map a process exit to a status change.
///
/// Rule (6) deliberately produces no change: a successful exit that completed
/// nothing and needs no review keeps whatever status the task already had.
pub fn decide_exit(signal: &ExitSignal) -> ExitDecision {
    match classify_exit(signal) {
        ExitRule::NonZeroExit => ExitDecision {
            status: Some(TaskStatus::HumanReview),
            reason: Some(ReviewReason::Errors),
        },
        ExitRule::QaApproved | ExitRule::AllSubtasksDone | ExitRule::SomeSubtasksDone => {
            ExitDecision {
                status: Some(TaskStatus::HumanReview),
                reason: Some(ReviewReason::Completed),
            }
        }
        ExitRule::PlanReviewPending => ExitDecision {
            status: Some(TaskStatus::HumanReview),
            reason: Some(ReviewReason::PlanReview),
        },
        ExitRule::CleanNoWork => ExitDecision {
            status: None,
            reason: None,
        },
    }
}

/// Coarse status implied by a progress tick's phase.
///
/// `idle` implies no change at all, hence `None`.
pub fn status_for_progress(phase: Phase) -> Option<TaskStatus> {
    match phase {
        Phase::Idle => None,
        Phase::Planning | Phase::Coding => Some(TaskStatus::InProgress),
        Phase::QaReview | Phase::QaFixing => Some(TaskStatus::AiReview),
        Phase::Complete | Phase::Failed => Some(TaskStatus::HumanReview),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signal(
        exit_code: i32,
        has: bool,
        all: bool,
        some: bool,
        qa: bool,
        review: bool,
    ) -> ExitSignal {
        ExitSignal {
            exit_code,
            has_subtasks: has,
            all_subtasks_done: all,
            has_completed_subtasks: some,
            qa_approved: qa,
            require_review_before_coding: review,
        }
    }

    #[test]
    fn test_nonzero_exit_outranks_everything() {
        // All other flags set in the most "successful" configuration.
        let s = signal(1, true, true, true, true, true);
        let d = decide_exit(&s);
        assert_eq!(d.status, Some(TaskStatus::HumanReview));
        assert_eq!(d.reason, Some(ReviewReason::Errors));
        assert_eq!(classify_exit(&s), ExitRule::NonZeroExit);
    }

    #[test]
    fn test_qa_approval_outranks_plan_review_gate() {
        let s = signal(0, false, false, false, true, true);
        let d = decide_exit(&s);
        assert_eq!(d.status, Some(TaskStatus::HumanReview));
        assert_eq!(d.reason, Some(ReviewReason::Completed));
    }

    #[test]
    fn test_all_subtasks_done_completes() {
        let s = signal(0, true, true, true, false, true);
        assert_eq!(classify_exit(&s), ExitRule::AllSubtasksDone);
        assert_eq!(decide_exit(&s).reason, Some(ReviewReason::Completed));
    }

    #[test]
    fn test_partial_subtasks_still_complete() {
        let s = signal(0, true, false, true, false, true);
        assert_eq!(classify_exit(&s), ExitRule::SomeSubtasksDone);
        assert_eq!(decide_exit(&s).reason, Some(ReviewReason::Completed));
    }

    #[test]
    fn test_plan_review_gate_fires_only_without_completed_work() {
        let s = signal(0, true, false, false, false, true);
        let d = decide_exit(&s);
        assert_eq!(d.status, Some(TaskStatus::HumanReview));
        assert_eq!(d.reason, Some(ReviewReason::PlanReview));
    }

    #[test]
    fn test_clean_exit_with_no_work_is_no_change() {
        let s = signal(0, false, false, false, false, false);
        let d = decide_exit(&s);
        assert_eq!(d.status, None);
        assert_eq!(d.reason, None);
        assert_eq!(classify_exit(&s), ExitRule::CleanNoWork);
    }

    #[test]
    fn test_subtasks_present_but_none_done_no_gate() {
        // Subtasks exist, none done, no review gate: falls through to rule 6.
        let s = signal(0, true, false, false, false, false);
        assert_eq!(classify_exit(&s), ExitRule::CleanNoWork);
    }

    #[test]
    fn test_progress_status_mapping() {
        assert_eq!(status_for_progress(Phase::Idle), None);
        assert_eq!(
            status_for_progress(Phase::Planning),
            Some(TaskStatus::InProgress)
        );
        assert_eq!(
            status_for_progress(Phase::Coding),
            Some(TaskStatus::InProgress)
        );
        assert_eq!(
            status_for_progress(Phase::QaReview),
            Some(TaskStatus::AiReview)
        );
        assert_eq!(
            status_for_progress(Phase::QaFixing),
            Some(TaskStatus::AiReview)
        );
        assert_eq!(
            status_for_progress(Phase::Complete),
            Some(TaskStatus::HumanReview)
        );
        assert_eq!(
            status_for_progress(Phase::Failed),
            Some(TaskStatus::HumanReview)
        );
    }
}
