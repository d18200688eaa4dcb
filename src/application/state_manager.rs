//! Task state manager: routes worker signals through lifecycle machines.
//!
//! One machine per task, created on first contact and seeded from the task's
//! persisted position. Handlers never return errors to the caller; a signal
//! that cannot be processed is logged and dropped so one broken task cannot
//! stall the others.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{broadcast, Mutex, RwLock};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::domain::models::{
    is_valid_phase_transition, transition, would_phase_regress, Effect, ExecutionProgress,
    ExitSignal, LifecycleEvent, LifecycleState, MachineState, ManualStatus, Phase, Project,
    ReviewReason, Task, TaskStatus,
};
use crate::domain::ports::{PlanStore, TaskStore};

/// A visible status change, published to all subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub task_id: Uuid,
    pub project_id: Uuid,
    pub status: TaskStatus,
    pub review_reason: Option<ReviewReason>,
}

/// One task's machine plus the context needed to act on its effects.
struct MachineEntry {
    task_id: Uuid,
    project_id: Uuid,
    spec_id: String,
    machine: MachineState,
    /// Last (status, reason) pair published; repeats are suppressed.
    last_emitted: (TaskStatus, Option<ReviewReason>),
}

/// Central orchestrator for task lifecycle state.
///
/// Receives signals from workers (progress ticks, process exits) and from
/// operators (stop, resume, manual overrides), runs them through the pure
/// transition function, and applies the resulting effects: persisting the
/// new status through the plan store and broadcasting a [`StatusChange`].
///
/// # Concurrency Design
///
/// - The machine map is a `RwLock<HashMap>`; entries are created at most
///   once per task id under the write lock.
/// - Each entry sits behind its own fair `Mutex`, held for the whole of a
///   signal's processing including persistence. The per-task lock is the
///   task's mailbox: signals for the same task apply strictly in arrival
///   order, while different tasks proceed in parallel.
/// - No lock is ever held across a call that takes another entry's lock.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use drover::adapters::mock::{MockPlanStore, MockTaskStore};
/// use drover::application::TaskStateManager;
///
/// # async fn example() {
/// let manager = TaskStateManager::new(
///     Arc::new(MockTaskStore::new()),
///     Arc::new(MockPlanStore::new()),
/// );
/// let mut changes = manager.subscribe();
/// // feed signals, then:
/// while let Ok(change) = changes.recv().await {
///     println!("{} -> {}", change.task_id, change.status);
/// }
/// # }
/// ```
pub struct TaskStateManager {
    task_store: Arc<dyn TaskStore>,
    plan_store: Arc<dyn PlanStore>,
    machines: RwLock<HashMap<Uuid, Arc<Mutex<MachineEntry>>>>,
    status_tx: broadcast::Sender<StatusChange>,
}

impl TaskStateManager {
    /// Create a new manager over the given stores.
    pub fn new(task_store: Arc<dyn TaskStore>, plan_store: Arc<dyn PlanStore>) -> Self {
        // Bounded fan-out; a subscriber that falls behind sees a lag error,
        // not unbounded memory growth.
        let (status_tx, _) = broadcast::channel(256);
        Self {
            task_store,
            plan_store,
            machines: RwLock::new(HashMap::new()),
            status_tx,
        }
    }

    /// Subscribe to status changes. Each subscriber sees every change
    /// published after the call.
    pub fn subscribe(&self) -> broadcast::Receiver<StatusChange> {
        self.status_tx.subscribe()
    }

    /// Handle a progress tick from a worker.
    ///
    /// Idle ticks and ticks that would move the task's phase backwards are
    /// dropped. A tick that arrives ahead of the machine (worker already
    /// coding while the machine still thinks the task is in backlog) first
    /// back-fills the planning transitions, then applies normally.
    #[instrument(skip(self, progress), fields(task_id = %task_id, phase = %progress.phase))]
    pub async fn handle_execution_progress(&self, task_id: Uuid, progress: &ExecutionProgress) {
        if progress.phase == Phase::Idle {
            debug!("idle tick ignored");
            return;
        }
        let Some((project, task)) = self.resolve_context(task_id).await else {
            warn!("progress signal for unknown task dropped");
            return;
        };
        let current = task.current_phase();
        if would_phase_regress(current, progress.phase) {
            warn!(
                current = %current,
                proposed = %progress.phase,
                "regressing phase tick dropped"
            );
            return;
        }
        if !is_valid_phase_transition(current, progress.phase, &progress.completed_phases) {
            debug!(
                current = %current,
                proposed = %progress.phase,
                "tick arrived ahead of its prerequisites"
            );
        }

        let entry = self.entry_for(&task).await;
        let mut entry = entry.lock().await;

        // Back-fill: a tick at or past coding means the worker is
        // demonstrably past the plan-approval gate, so catch the machine up
        // without gating.
        if progress.phase.at_or_beyond(Phase::Coding) {
            if entry.machine.state == LifecycleState::Backlog {
                info!("back-filling planning start for out-of-order tick");
                self.apply(&mut entry, &project, &LifecycleEvent::PlanningStarted)
                    .await;
            }
            if entry.machine.state == LifecycleState::Planning {
                info!("back-filling planning completion for out-of-order tick");
                self.apply(
                    &mut entry,
                    &project,
                    &LifecycleEvent::PlanningComplete {
                        require_review: false,
                    },
                )
                .await;
            }
        }

        if let Some(event) = Self::event_for_tick(entry.machine.state, progress.phase) {
            self.apply(&mut entry, &project, &event).await;
        }
    }

    /// Handle a worker process exit.
    ///
    /// The signal carries the exit code and the worker's view of subtask and
    /// QA state; the machine routes it through the exit decision rules.
    #[instrument(skip(self, signal), fields(task_id = %task_id, exit_code = signal.exit_code))]
    pub async fn handle_process_exit(&self, task_id: Uuid, signal: ExitSignal) {
        self.handle_event(task_id, LifecycleEvent::ProcessExited(signal))
            .await;
    }

    /// Handle an operator stopping a task.
    #[instrument(skip(self), fields(task_id = %task_id))]
    pub async fn handle_user_stopped(&self, task_id: Uuid) {
        self.handle_event(task_id, LifecycleEvent::UserStopped).await;
    }

    /// Handle an operator resuming a stopped, reviewed, or errored task.
    #[instrument(skip(self), fields(task_id = %task_id))]
    pub async fn handle_user_resumed(&self, task_id: Uuid) {
        self.handle_event(task_id, LifecycleEvent::UserResumed).await;
    }

    /// Force a task to one of the operator-settable statuses.
    ///
    /// `done` is final: once forced there the machine ignores everything,
    /// including further overrides.
    #[instrument(skip(self, target), fields(task_id = %task_id))]
    pub async fn handle_manual_status(&self, task_id: Uuid, target: ManualStatus) {
        self.handle_event(task_id, LifecycleEvent::ManualOverride(target))
            .await;
    }

    /// The externally visible status of a task's live machine, or `None`
    /// when no machine exists for it yet.
    pub async fn current_status(&self, task_id: Uuid) -> Option<TaskStatus> {
        let entry = self.machines.read().await.get(&task_id).cloned()?;
        let entry = entry.lock().await;
        Some(entry.machine.state.status())
    }

    /// Number of tasks with a live machine.
    pub async fn tracked_tasks(&self) -> usize {
        self.machines.read().await.len()
    }

    /// Drop a task's machine. Returns whether one existed.
    ///
    /// The next signal for the task creates a fresh machine seeded from the
    /// task's persisted position.
    pub async fn cleanup_task(&self, task_id: Uuid) -> bool {
        let removed = self.machines.write().await.remove(&task_id).is_some();
        if removed {
            debug!(task_id = %task_id, "machine dropped");
        }
        removed
    }

    /// Drop every machine. Returns how many were dropped.
    pub async fn cleanup_all(&self) -> usize {
        let mut machines = self.machines.write().await;
        let count = machines.len();
        machines.clear();
        count
    }

    /// Resolve a task id to its project and task records.
    async fn resolve_context(&self, task_id: Uuid) -> Option<(Project, Task)> {
        let projects = match self.task_store.list_projects().await {
            Ok(projects) => projects,
            Err(error) => {
                warn!(error = %error, "project listing failed while resolving signal");
                return None;
            }
        };
        for project in projects {
            match self.task_store.list_tasks(project.id).await {
                Ok(tasks) => {
                    if let Some(task) = tasks.into_iter().find(|t| t.id == task_id) {
                        return Some((project, task));
                    }
                }
                Err(error) => {
                    warn!(
                        project_id = %project.id,
                        error = %error,
                        "task listing failed while resolving signal"
                    );
                }
            }
        }
        None
    }

    /// Get or lazily create the machine entry for a task.
    ///
    /// The `HashMap::entry` call under the write lock is what guarantees at
    /// most one machine per task id, however many signals race on first
    /// contact.
    async fn entry_for(&self, task: &Task) -> Arc<Mutex<MachineEntry>> {
        let mut machines = self.machines.write().await;
        machines
            .entry(task.id)
            .or_insert_with(|| {
                let machine = MachineState::seeded(
                    task.status,
                    task.execution_progress.as_ref().map(|p| p.phase),
                );
                debug!(
                    task_id = %task.id,
                    state = %machine.state,
                    "machine created from persisted position"
                );
                Arc::new(Mutex::new(MachineEntry {
                    task_id: task.id,
                    project_id: task.project_id,
                    spec_id: task.spec_id.clone(),
                    machine,
                    last_emitted: (task.status, None),
                }))
            })
            .clone()
    }

    /// Resolve context, lock the task's machine, and apply one event.
    async fn handle_event(&self, task_id: Uuid, event: LifecycleEvent) {
        let Some((project, task)) = self.resolve_context(task_id).await else {
            warn!(event = event.name(), "signal for unknown task dropped");
            return;
        };
        let entry = self.entry_for(&task).await;
        let mut entry = entry.lock().await;
        self.apply(&mut entry, &project, &event).await;
    }

    /// Run one event through the machine and carry out its effects.
    ///
    /// Caller holds the entry lock, so effects from one signal land before
    /// the next signal for the same task is looked at.
    async fn apply(&self, entry: &mut MachineEntry, project: &Project, event: &LifecycleEvent) {
        match transition(&entry.machine, event) {
            Some(t) => {
                debug!(
                    from = %entry.machine.state,
                    to = %t.next.state,
                    event = event.name(),
                    "machine transition"
                );
                entry.machine = t.next;
                for effect in t.effects {
                    let Effect::EmitStatus { status, reason } = effect;
                    self.emit(entry, project, status, reason).await;
                }
            }
            None => {
                debug!(
                    state = %entry.machine.state,
                    event = event.name(),
                    "event ignored in current state"
                );
            }
        }
    }

    /// Persist and publish one visible status, deduplicating repeats.
    ///
    /// Persistence happens only when the status component actually changed;
    /// a reason-only change (qa_review rejecting into qa_fixing stays
    /// `ai_review`) is published but not written.
    async fn emit(
        &self,
        entry: &mut MachineEntry,
        project: &Project,
        status: TaskStatus,
        reason: Option<ReviewReason>,
    ) {
        if status == TaskStatus::HumanReview && reason.is_none() {
            warn!(task_id = %entry.task_id, "human_review emitted without a reason");
        }
        if (status, reason) == entry.last_emitted {
            debug!(status = %status, "duplicate status suppressed");
            return;
        }
        let status_changed = status != entry.last_emitted.0;
        entry.last_emitted = (status, reason);

        if status_changed {
            self.persist_status(project, &entry.spec_id, status).await;
            self.task_store.invalidate_cache(project.id).await;
        }

        info!(
            task_id = %entry.task_id,
            status = %status,
            reason = reason.map(|r| r.as_str()).unwrap_or("-"),
            "status changed"
        );
        // A send error just means nobody is listening right now.
        let _ = self.status_tx.send(StatusChange {
            task_id: entry.task_id,
            project_id: entry.project_id,
            status,
            review_reason: reason,
        });
    }

    /// Write the status to the durable record and, when one exists, the
    /// working copy. Both writes are best-effort: a failure is logged and
    /// the in-memory machine stays authoritative.
    async fn persist_status(&self, project: &Project, spec_id: &str, status: TaskStatus) {
        let primary = self.plan_store.record_path(&project.state_root, spec_id);
        match self.plan_store.write_status(&primary, status, project.id).await {
            Ok(true) => debug!(path = %primary.display(), "status persisted"),
            Ok(false) => warn!(path = %primary.display(), "no durable record to update"),
            Err(error) => {
                warn!(
                    path = %primary.display(),
                    error = %error,
                    "durable status write failed"
                );
            }
        }

        if let Some(copy) = self
            .plan_store
            .working_copy_path(&project.path, spec_id)
            .await
        {
            match self.plan_store.write_status(&copy, status, project.id).await {
                Ok(true) => debug!(path = %copy.display(), "working-copy status persisted"),
                Ok(false) => debug!(path = %copy.display(), "working copy has no record"),
                Err(error) => {
                    warn!(
                        path = %copy.display(),
                        error = %error,
                        "working-copy status write failed"
                    );
                }
            }
        }
    }

    /// The lifecycle event a progress tick maps to, given where the machine
    /// currently stands.
    fn event_for_tick(state: LifecycleState, phase: Phase) -> Option<LifecycleEvent> {
        match phase {
            Phase::Idle | Phase::Failed => None,
            Phase::Planning => Some(LifecycleEvent::PlanningStarted),
            Phase::Coding => Some(LifecycleEvent::CodingStarted),
            Phase::QaReview => Some(LifecycleEvent::QaStarted),
            // Only the first failure observation drives the qa_review →
            // qa_fixing edge; a repeated qa_fixing tick must not eject the
            // machine into human_review.
            Phase::QaFixing => {
                (state == LifecycleState::QaReview).then_some(LifecycleEvent::QaFailed)
            }
            Phase::Complete => Some(LifecycleEvent::QaPassed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::mock::{MockPlanStore, MockTaskStore};
    use crate::domain::models::PlanRecord;
    use std::path::PathBuf;
    use tokio::sync::broadcast::error::TryRecvError;

    struct Fixture {
        manager: TaskStateManager,
        task_store: Arc<MockTaskStore>,
        plan_store: Arc<MockPlanStore>,
        project: Project,
        task: Task,
        primary: PathBuf,
    }

    async fn fixture(status: TaskStatus, phase: Option<Phase>) -> Fixture {
        let task_store = Arc::new(MockTaskStore::new());
        let plan_store = Arc::new(MockPlanStore::new());
        let project = Project::new("demo", "/work/demo");
        let mut task = Task::new(project.id, "spec-001", "Build the thing").with_status(status);
        if let Some(phase) = phase {
            task = task.with_progress(ExecutionProgress::new(phase));
        }
        task_store.add_project(project.clone()).await;
        task_store.add_task(task.clone()).await;

        let primary = plan_store.record_path(&project.state_root, &task.spec_id);
        plan_store
            .insert_record(primary.clone(), PlanRecord::new(task.id, status))
            .await;

        let manager = TaskStateManager::new(task_store.clone(), plan_store.clone());
        Fixture {
            manager,
            task_store,
            plan_store,
            project,
            task,
            primary,
        }
    }

    fn drain(rx: &mut broadcast::Receiver<StatusChange>) -> Vec<StatusChange> {
        let mut out = Vec::new();
        while let Ok(change) = rx.try_recv() {
            out.push(change);
        }
        out
    }

    #[tokio::test]
    async fn test_unknown_task_signal_dropped() {
        let fx = fixture(TaskStatus::Backlog, None).await;
        let mut rx = fx.manager.subscribe();

        fx.manager
            .handle_execution_progress(Uuid::new_v4(), &ExecutionProgress::new(Phase::Planning))
            .await;

        assert_eq!(fx.manager.tracked_tasks().await, 0);
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
    }

    #[tokio::test]
    async fn test_progress_publishes_once_per_change() {
        let fx = fixture(TaskStatus::Backlog, None).await;
        let mut rx = fx.manager.subscribe();

        let tick = ExecutionProgress::new(Phase::Planning);
        fx.manager.handle_execution_progress(fx.task.id, &tick).await;
        fx.manager.handle_execution_progress(fx.task.id, &tick).await;

        let changes = drain(&mut rx);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].status, TaskStatus::InProgress);
        assert_eq!(changes[0].review_reason, None);
        assert_eq!(
            fx.manager.current_status(fx.task.id).await,
            Some(TaskStatus::InProgress)
        );
    }

    #[tokio::test]
    async fn test_backfill_from_backlog_on_coding_tick() {
        let fx = fixture(TaskStatus::Backlog, None).await;
        let mut rx = fx.manager.subscribe();

        fx.manager
            .handle_execution_progress(fx.task.id, &ExecutionProgress::new(Phase::Coding))
            .await;

        // backlog → planning → coding, but in_progress publishes only once.
        let changes = drain(&mut rx);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].status, TaskStatus::InProgress);
        assert_eq!(
            fx.plan_store.status_at(&fx.primary).await,
            Some(TaskStatus::InProgress)
        );
        assert_eq!(fx.task_store.invalidations().await, vec![fx.project.id]);
    }

    #[tokio::test]
    async fn test_idle_tick_ignored() {
        let fx = fixture(TaskStatus::Backlog, None).await;
        let mut rx = fx.manager.subscribe();

        fx.manager
            .handle_execution_progress(fx.task.id, &ExecutionProgress::new(Phase::Idle))
            .await;

        assert_eq!(fx.manager.tracked_tasks().await, 0);
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
    }

    #[tokio::test]
    async fn test_regressing_tick_dropped() {
        let fx = fixture(TaskStatus::AiReview, Some(Phase::QaReview)).await;
        let mut rx = fx.manager.subscribe();

        fx.manager
            .handle_execution_progress(fx.task.id, &ExecutionProgress::new(Phase::Coding))
            .await;

        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
        // No machine was created for a dropped signal either.
        assert_eq!(fx.manager.tracked_tasks().await, 0);
    }

    #[tokio::test]
    async fn test_clean_exit_with_done_subtasks_completes() {
        let fx = fixture(TaskStatus::InProgress, Some(Phase::Coding)).await;
        let mut rx = fx.manager.subscribe();

        let signal = ExitSignal {
            has_subtasks: true,
            all_subtasks_done: true,
            has_completed_subtasks: true,
            ..ExitSignal::clean()
        };
        fx.manager.handle_process_exit(fx.task.id, signal).await;

        let changes = drain(&mut rx);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].status, TaskStatus::HumanReview);
        assert_eq!(changes[0].review_reason, Some(ReviewReason::Completed));
        assert_eq!(
            fx.plan_store.status_at(&fx.primary).await,
            Some(TaskStatus::HumanReview)
        );
    }

    #[tokio::test]
    async fn test_exit_persists_working_copy_too() {
        let fx = fixture(TaskStatus::InProgress, Some(Phase::Coding)).await;
        let copy = fx
            .project
            .path
            .join(".worktrees")
            .join(&fx.task.spec_id)
            .join("plan.json");
        fx.plan_store
            .insert_record(copy.clone(), PlanRecord::new(fx.task.id, TaskStatus::InProgress))
            .await;
        fx.plan_store
            .set_working_copy(&fx.project.path, &fx.task.spec_id, copy.clone())
            .await;

        fx.manager
            .handle_process_exit(
                fx.task.id,
                ExitSignal {
                    exit_code: 3,
                    ..ExitSignal::clean()
                },
            )
            .await;

        assert_eq!(
            fx.plan_store.status_at(&fx.primary).await,
            Some(TaskStatus::Error)
        );
        assert_eq!(fx.plan_store.status_at(&copy).await, Some(TaskStatus::Error));
    }

    #[tokio::test]
    async fn test_exit_failure_emits_error_with_reason() {
        let fx = fixture(TaskStatus::InProgress, Some(Phase::Coding)).await;
        let mut rx = fx.manager.subscribe();

        fx.manager
            .handle_process_exit(
                fx.task.id,
                ExitSignal {
                    exit_code: 1,
                    ..ExitSignal::clean()
                },
            )
            .await;

        let changes = drain(&mut rx);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].status, TaskStatus::Error);
        assert_eq!(changes[0].review_reason, Some(ReviewReason::Errors));
    }

    #[tokio::test]
    async fn test_reason_only_change_publishes_without_persisting() {
        let fx = fixture(TaskStatus::AiReview, Some(Phase::QaReview)).await;
        let mut rx = fx.manager.subscribe();

        // qa_review → qa_fixing: status stays ai_review, reason appears.
        fx.manager
            .handle_execution_progress(fx.task.id, &ExecutionProgress::new(Phase::QaFixing))
            .await;

        let changes = drain(&mut rx);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].status, TaskStatus::AiReview);
        assert_eq!(changes[0].review_reason, Some(ReviewReason::QaRejected));
        assert!(fx.plan_store.writes().await.is_empty());
        assert!(fx.task_store.invalidations().await.is_empty());
    }

    #[tokio::test]
    async fn test_repeated_qa_fixing_tick_does_not_eject() {
        let fx = fixture(TaskStatus::AiReview, Some(Phase::QaReview)).await;

        let tick = ExecutionProgress::new(Phase::QaFixing);
        fx.manager.handle_execution_progress(fx.task.id, &tick).await;
        fx.manager.handle_execution_progress(fx.task.id, &tick).await;

        assert_eq!(
            fx.manager.current_status(fx.task.id).await,
            Some(TaskStatus::AiReview)
        );
    }

    #[tokio::test]
    async fn test_stop_returns_task_to_backlog() {
        let fx = fixture(TaskStatus::InProgress, Some(Phase::Coding)).await;
        let mut rx = fx.manager.subscribe();

        fx.manager.handle_user_stopped(fx.task.id).await;
        // A stopped task restarts through planning, not through resume.
        fx.manager.handle_user_resumed(fx.task.id).await;

        let changes = drain(&mut rx);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].status, TaskStatus::Backlog);
        assert_eq!(
            fx.manager.current_status(fx.task.id).await,
            Some(TaskStatus::Backlog)
        );
    }

    #[tokio::test]
    async fn test_resume_from_human_review_restarts_coding() {
        let fx = fixture(TaskStatus::HumanReview, None).await;
        let mut rx = fx.manager.subscribe();

        fx.manager.handle_user_resumed(fx.task.id).await;

        let changes = drain(&mut rx);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].status, TaskStatus::InProgress);
        assert_eq!(changes[0].review_reason, None);
    }

    #[tokio::test]
    async fn test_manual_done_locks_machine() {
        let fx = fixture(TaskStatus::InProgress, Some(Phase::Coding)).await;
        let mut rx = fx.manager.subscribe();

        fx.manager
            .handle_manual_status(fx.task.id, ManualStatus::Done)
            .await;
        fx.manager
            .handle_execution_progress(fx.task.id, &ExecutionProgress::new(Phase::QaReview))
            .await;
        fx.manager.handle_user_resumed(fx.task.id).await;

        let changes = drain(&mut rx);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].status, TaskStatus::Done);
        assert_eq!(
            fx.manager.current_status(fx.task.id).await,
            Some(TaskStatus::Done)
        );
    }

    #[tokio::test]
    async fn test_manual_human_review_without_reason_still_published() {
        let fx = fixture(TaskStatus::InProgress, Some(Phase::Coding)).await;
        let mut rx = fx.manager.subscribe();

        fx.manager
            .handle_manual_status(fx.task.id, ManualStatus::HumanReview(None))
            .await;

        let changes = drain(&mut rx);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].status, TaskStatus::HumanReview);
        assert_eq!(changes[0].review_reason, None);
    }

    #[tokio::test]
    async fn test_store_failure_drops_signal_silently() {
        let fx = fixture(TaskStatus::Backlog, None).await;
        fx.task_store.fail_project_listing().await;
        let mut rx = fx.manager.subscribe();

        fx.manager
            .handle_execution_progress(fx.task.id, &ExecutionProgress::new(Phase::Planning))
            .await;

        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
        assert_eq!(fx.manager.tracked_tasks().await, 0);
    }

    #[tokio::test]
    async fn test_persist_failure_does_not_block_publish() {
        let fx = fixture(TaskStatus::InProgress, Some(Phase::Coding)).await;
        fx.plan_store.fail_writes().await;
        let mut rx = fx.manager.subscribe();

        fx.manager
            .handle_process_exit(fx.task.id, ExitSignal::clean())
            .await;

        let changes = drain(&mut rx);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].status, TaskStatus::HumanReview);
        assert_eq!(changes[0].review_reason, Some(ReviewReason::Stopped));
    }

    #[tokio::test]
    async fn test_at_most_one_machine_per_task() {
        let fx = fixture(TaskStatus::Backlog, None).await;

        let a = fx.manager.entry_for(&fx.task).await;
        let b = fx.manager.entry_for(&fx.task).await;

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(fx.manager.tracked_tasks().await, 1);
    }

    #[tokio::test]
    async fn test_cleanup_task_and_reseed() {
        let fx = fixture(TaskStatus::InProgress, Some(Phase::Coding)).await;

        fx.manager
            .handle_execution_progress(fx.task.id, &ExecutionProgress::new(Phase::QaReview))
            .await;
        assert_eq!(fx.manager.tracked_tasks().await, 1);

        assert!(fx.manager.cleanup_task(fx.task.id).await);
        assert!(!fx.manager.cleanup_task(fx.task.id).await);
        assert_eq!(fx.manager.current_status(fx.task.id).await, None);

        // Next signal re-creates the machine from the store's position,
        // which still says in_progress/coding.
        fx.manager
            .handle_execution_progress(fx.task.id, &ExecutionProgress::new(Phase::QaReview))
            .await;
        assert_eq!(
            fx.manager.current_status(fx.task.id).await,
            Some(TaskStatus::AiReview)
        );
    }

    #[tokio::test]
    async fn test_cleanup_all() {
        let fx = fixture(TaskStatus::Backlog, None).await;
        let second = Task::new(fx.project.id, "spec-002", "Other");
        fx.task_store.add_task(second.clone()).await;

        fx.manager
            .handle_execution_progress(fx.task.id, &ExecutionProgress::new(Phase::Planning))
            .await;
        fx.manager
            .handle_execution_progress(second.id, &ExecutionProgress::new(Phase::Planning))
            .await;

        assert_eq!(fx.manager.cleanup_all().await, 2);
        assert_eq!(fx.manager.tracked_tasks().await, 0);
    }

    #[tokio::test]
    async fn test_plan_review_gate_via_exit_signal() {
        let fx = fixture(TaskStatus::InProgress, Some(Phase::Planning)).await;
        let mut rx = fx.manager.subscribe();

        fx.manager
            .handle_process_exit(
                fx.task.id,
                ExitSignal {
                    require_review_before_coding: true,
                    ..ExitSignal::clean()
                },
            )
            .await;

        let changes = drain(&mut rx);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].status, TaskStatus::HumanReview);
        assert_eq!(changes[0].review_reason, Some(ReviewReason::PlanReview));
        assert_eq!(
            fx.plan_store.status_at(&fx.primary).await,
            Some(TaskStatus::HumanReview)
        );
    }
}
