//! Durable plan record.
//!
//! The on-disk record a worker keeps next to its workspace: current status,
//! plan approval state, a freshness timestamp, and the phase/subtask
//! breakdown. The record exists twice when a task has an isolated working
//! copy; both copies are expected to converge on status after a persist.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::phase::Phase;
use super::status::TaskStatus;

/// Approval state of the plan itself, owned by workers and passed through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    Draft,
    PendingApproval,
    Approved,
    Rejected,
}

impl Default for PlanStatus {
    fn default() -> Self {
        Self::Draft
    }
}

/// Progress state of a phase or subtask inside the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl Default for StepStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl StepStatus {
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

/// One subtask line item inside a phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanStep {
    /// Worker-assigned identifier, opaque here
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub status: StepStatus,
}

/// One phase entry with its subtasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanPhase {
    /// Which workflow phase this entry describes
    pub name: Phase,
    #[serde(default)]
    pub status: StepStatus,
    #[serde(default)]
    pub subtasks: Vec<PlanStep>,
}

/// Subtask summary derived from a record, feeding the exit decision table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SubtaskFlags {
    pub has_subtasks: bool,
    pub all_subtasks_done: bool,
    pub has_completed_subtasks: bool,
}

/// Per-task durable record, persisted as JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanRecord {
    /// Stable task identity; lets a directory scan attribute records
    pub task_id: Uuid,
    pub status: TaskStatus,
    #[serde(default)]
    pub plan_status: PlanStatus,
    pub last_updated: DateTime<Utc>,
    #[serde(default)]
    pub phases: Vec<PlanPhase>,
}

impl PlanRecord {
    pub fn new(task_id: Uuid, status: TaskStatus) -> Self {
        Self {
            task_id,
            status,
            plan_status: PlanStatus::default(),
            last_updated: Utc::now(),
            phases: Vec::new(),
        }
    }

    /// Builder-style phase attachment, mostly for tests and fixtures.
    pub fn with_phase(mut self, phase: PlanPhase) -> Self {
        self.phases.push(phase);
        self
    }

    pub fn with_last_updated(mut self, at: DateTime<Utc>) -> Self {
        self.last_updated = at;
        self
    }

    /// Set the status and refresh the timestamp in one step.
    pub fn set_status(&mut self, status: TaskStatus) {
        self.status = status;
        self.last_updated = Utc::now();
    }

    /// Milliseconds since the record was last touched. Clamped at zero for
    /// clocks that ran backwards.
    pub fn age_ms(&self, now: DateTime<Utc>) -> u64 {
        let delta = now.signed_duration_since(self.last_updated);
        u64::try_from(delta.num_milliseconds()).unwrap_or(0)
    }

    /// Summarize subtask completion across all phases.
    pub fn subtask_flags(&self) -> SubtaskFlags {
        let mut total = 0usize;
        let mut done = 0usize;
        for phase in &self.phases {
            for step in &phase.subtasks {
                total += 1;
                if step.status.is_done() {
                    done += 1;
                }
            }
        }
        SubtaskFlags {
            has_subtasks: total > 0,
            all_subtasks_done: total > 0 && done == total,
            has_completed_subtasks: done > 0,
        }
    }

    /// True when the automated review phase has run to completion.
    pub fn qa_approved(&self) -> bool {
        self.phases
            .iter()
            .any(|p| p.name == Phase::QaReview && p.status.is_done())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn step(id: &str, status: StepStatus) -> PlanStep {
        PlanStep {
            id: id.to_string(),
            title: String::new(),
            status,
        }
    }

    #[test]
    fn test_subtask_flags_empty_record() {
        let record = PlanRecord::new(Uuid::new_v4(), TaskStatus::Backlog);
        let flags = record.subtask_flags();
        assert!(!flags.has_subtasks);
        assert!(!flags.all_subtasks_done);
        assert!(!flags.has_completed_subtasks);
    }

    #[test]
    fn test_subtask_flags_partial_completion() {
        let record = PlanRecord::new(Uuid::new_v4(), TaskStatus::InProgress).with_phase(PlanPhase {
            name: Phase::Coding,
            status: StepStatus::InProgress,
            subtasks: vec![
                step("1", StepStatus::Completed),
                step("2", StepStatus::Pending),
            ],
        });
        let flags = record.subtask_flags();
        assert!(flags.has_subtasks);
        assert!(!flags.all_subtasks_done);
        assert!(flags.has_completed_subtasks);
    }

    #[test]
    fn test_subtask_flags_all_done_across_phases() {
        let record = PlanRecord::new(Uuid::new_v4(), TaskStatus::InProgress)
            .with_phase(PlanPhase {
                name: Phase::Planning,
                status: StepStatus::Completed,
                subtasks: vec![step("1", StepStatus::Completed)],
            })
            .with_phase(PlanPhase {
                name: Phase::Coding,
                status: StepStatus::Completed,
                subtasks: vec![step("2", StepStatus::Completed)],
            });
        assert!(record.subtask_flags().all_subtasks_done);
    }

    #[test]
    fn test_qa_approved_requires_completed_qa_phase() {
        let mut record = PlanRecord::new(Uuid::new_v4(), TaskStatus::AiReview).with_phase(PlanPhase {
            name: Phase::QaReview,
            status: StepStatus::InProgress,
            subtasks: vec![],
        });
        assert!(!record.qa_approved());

        record.phases[0].status = StepStatus::Completed;
        assert!(record.qa_approved());
    }

    #[test]
    fn test_age_ms() {
        let now = Utc::now();
        let record = PlanRecord::new(Uuid::new_v4(), TaskStatus::InProgress)
            .with_last_updated(now - Duration::milliseconds(600_000));
        let age = record.age_ms(now);
        assert!((599_000..=601_000).contains(&age));

        // Future timestamp clamps to zero.
        let fresh = PlanRecord::new(Uuid::new_v4(), TaskStatus::InProgress)
            .with_last_updated(now + Duration::seconds(30));
        assert_eq!(fresh.age_ms(now), 0);
    }

    #[test]
    fn test_record_json_round_trip() {
        let record = PlanRecord::new(Uuid::new_v4(), TaskStatus::HumanReview).with_phase(PlanPhase {
            name: Phase::Coding,
            status: StepStatus::Completed,
            subtasks: vec![step("s-1", StepStatus::Completed)],
        });
        let json = serde_json::to_string(&record).unwrap();
        let back: PlanRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_record_tolerates_missing_optional_fields() {
        let json = format!(
            r#"{{"task_id":"{}","status":"in_progress","last_updated":"2026-01-10T12:00:00Z"}}"#,
            Uuid::new_v4()
        );
        let record: PlanRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(record.plan_status, PlanStatus::Draft);
        assert!(record.phases.is_empty());
    }
}
