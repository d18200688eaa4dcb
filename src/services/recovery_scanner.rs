//! Recovery scanner background service.
//!
//! Periodically sweeps every watched project for tasks that claim a worker
//! is active while their durable plan record has gone stale, and restarts
//! the matching worker through the spawn capability. Attempt counting keeps
//! a permanently broken task from being restarted forever.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{Notify, RwLock};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::domain::errors::{SpawnError, StoreError};
use crate::domain::models::{Project, RecoveryConfig, RecoveryConfigPatch, Task, TaskStatus};
use crate::domain::ports::{
    PlanStore, RecoveryEvent, RecoveryNotifier, ResumeOptions, TaskStore, WorkerSpawner,
};

/// Rolling per-project error log length.
const MAX_PROJECT_ERRORS: usize = 10;

/// Startup failure; the one error class the scanner surfaces instead of
/// swallowing.
#[derive(Debug, Error)]
pub enum ScannerError {
    #[error("task-listing capability unreachable")]
    TaskStore(#[from] StoreError),
    #[error("worker-spawn capability unreachable")]
    Spawner(#[from] SpawnError),
}

/// A task the scanner judged stuck during a sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StuckTask {
    pub task_id: Uuid,
    pub project_id: Uuid,
    pub project_name: String,
    pub spec_id: String,
    pub title: String,
    pub status: TaskStatus,
    /// How long the durable record has gone without an update
    pub stale_ms: u64,
    /// Restart attempts already spent before this sweep
    pub attempts: u32,
    /// True when the attempt budget is used up; reported, not restarted
    pub exhausted: bool,
    #[serde(skip)]
    pub(crate) project_path: std::path::PathBuf,
}

/// Aggregate recovery counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryStats {
    /// Restart calls dispatched, counted at dispatch whether or not the
    /// call later succeeds
    pub total_attempts: u64,
    pub successful_recoveries: u64,
    pub failed_recoveries: u64,
    /// Stuck tasks seen in the most recent sweep, exhausted ones included
    pub tasks_currently_stuck: usize,
}

/// Operator-facing snapshot of the scanner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub is_running: bool,
    pub is_enabled: bool,
    pub last_scan_at: Option<DateTime<Utc>>,
    pub next_scan_at: Option<DateTime<Utc>>,
    pub stats: RecoveryStats,
    pub config: RecoveryConfig,
    /// Recent per-project sweep errors, oldest first
    pub errors: HashMap<Uuid, Vec<String>>,
}

struct SweepOutcome {
    stuck: Vec<StuckTask>,
    /// Worker-active tasks whose record is fresh; their attempt counters
    /// reset
    fresh: Vec<Uuid>,
}

/// Background service that detects and restarts stuck tasks.
///
/// A task is stuck when its status says a worker is active (`in_progress` or
/// `ai_review`) but its durable plan record has not been touched for longer
/// than the configured cooldown. Detection never trusts in-memory state: the
/// record on disk is the only staleness source, so the scanner works even
/// for tasks whose worker died before this process started.
///
/// Restarts are dispatched concurrently and counted optimistically at
/// dispatch time; a sweep waits for its own dispatches to settle but never
/// blocks one stuck task's restart on another's.
pub struct RecoveryScanner {
    task_store: Arc<dyn TaskStore>,
    plan_store: Arc<dyn PlanStore>,
    spawner: Arc<dyn WorkerSpawner>,
    notifier: Arc<dyn RecoveryNotifier>,
    config: RwLock<RecoveryConfig>,
    attempts: RwLock<HashMap<Uuid, u32>>,
    project_errors: RwLock<HashMap<Uuid, VecDeque<String>>>,
    stats: Arc<RwLock<RecoveryStats>>,
    last_scan: RwLock<Option<DateTime<Utc>>>,
    running: AtomicBool,
    stop_flag: AtomicBool,
    stop_notify: Notify,
}

impl RecoveryScanner {
    pub fn new(
        task_store: Arc<dyn TaskStore>,
        plan_store: Arc<dyn PlanStore>,
        spawner: Arc<dyn WorkerSpawner>,
        notifier: Arc<dyn RecoveryNotifier>,
        config: RecoveryConfig,
    ) -> Self {
        Self {
            task_store,
            plan_store,
            spawner,
            notifier,
            config: RwLock::new(config),
            attempts: RwLock::new(HashMap::new()),
            project_errors: RwLock::new(HashMap::new()),
            stats: Arc::new(RwLock::new(RecoveryStats::default())),
            last_scan: RwLock::new(None),
            running: AtomicBool::new(false),
            stop_flag: AtomicBool::new(false),
            stop_notify: Notify::new(),
        }
    }

    /// Start the periodic sweep loop.
    ///
    /// Disabled configuration is not an error: the call logs and returns
    /// without starting anything. Starting an already-running scanner is a
    /// no-op. The first sweep runs immediately, then the loop sleeps for
    /// `scan_interval_ms` between sweeps, re-reading the value each time so
    /// runtime config updates take effect.
    ///
    /// # Errors
    ///
    /// The initial healthcheck must find both the task-listing and the
    /// worker-spawn capability reachable; either failure is returned and the
    /// scanner stays stopped. A scanner that cannot list or restart anything
    /// must not pretend to watch.
    pub async fn start(self: &Arc<Self>) -> Result<(), ScannerError> {
        if !self.config.read().await.enabled {
            info!("recovery scanning disabled, scanner not started");
            return Ok(());
        }
        if self.running.swap(true, Ordering::AcqRel) {
            debug!("recovery scanner already running");
            return Ok(());
        }
        if let Err(error) = self.healthcheck().await {
            self.running.store(false, Ordering::Release);
            warn!(error = %error, "healthcheck failed, scanner not started");
            return Err(error);
        }
        self.stop_flag.store(false, Ordering::Release);
        let scanner = Arc::clone(self);
        tokio::spawn(async move {
            scanner.run_loop().await;
        });
        Ok(())
    }

    /// Request the loop to stop. The interval timer is cancelled
    /// immediately; restarts already dispatched run to completion.
    pub fn stop(&self) {
        self.stop_flag.store(true, Ordering::Release);
        self.stop_notify.notify_one();
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Verify both collaborator capabilities are reachable.
    pub async fn healthcheck(&self) -> Result<(), ScannerError> {
        self.task_store.list_projects().await?;
        self.spawner.healthcheck().await?;
        Ok(())
    }

    /// Snapshot of the effective configuration.
    pub async fn config(&self) -> RecoveryConfig {
        *self.config.read().await
    }

    /// Apply a partial config update; set fields take effect on the next
    /// sweep.
    pub async fn update_config(&self, patch: RecoveryConfigPatch) -> RecoveryConfig {
        let mut config = self.config.write().await;
        if patch.apply(&mut config) {
            info!(
                enabled = config.enabled,
                cooldown_period_ms = config.cooldown_period_ms,
                max_recovery_attempts = config.max_recovery_attempts,
                scan_interval_ms = config.scan_interval_ms,
                "recovery config updated"
            );
        }
        *config
    }

    pub async fn stats(&self) -> RecoveryStats {
        *self.stats.read().await
    }

    /// Full operator-facing snapshot: running state, scan timing, counters,
    /// effective config, and the rolling error log.
    pub async fn health(&self) -> HealthStatus {
        let config = *self.config.read().await;
        let last_scan_at = *self.last_scan.read().await;
        let is_running = self.is_running();
        let interval = i64::try_from(config.scan_interval_ms).unwrap_or(i64::MAX);
        let next_scan_at = if is_running {
            last_scan_at.map(|at| at + chrono::Duration::milliseconds(interval))
        } else {
            None
        };
        HealthStatus {
            is_running,
            is_enabled: config.enabled,
            last_scan_at,
            next_scan_at,
            stats: *self.stats.read().await,
            config,
            errors: self.project_errors().await,
        }
    }

    /// Restart attempts spent on a task so far.
    pub async fn attempts_for(&self, task_id: Uuid) -> u32 {
        self.attempts.read().await.get(&task_id).copied().unwrap_or(0)
    }

    /// Clear a task's attempt counter, re-arming recovery for it.
    pub async fn reset_attempts(&self, task_id: Uuid) {
        self.attempts.write().await.remove(&task_id);
    }

    /// Recent sweep errors per project, oldest first.
    pub async fn project_errors(&self) -> HashMap<Uuid, Vec<String>> {
        self.project_errors
            .read()
            .await
            .iter()
            .map(|(id, log)| (*id, log.iter().cloned().collect()))
            .collect()
    }

    /// Read-only sweep: report stuck tasks without restarting anything or
    /// touching attempt counters.
    pub async fn detect_stuck(&self) -> Vec<StuckTask> {
        let config = *self.config.read().await;
        self.find_stuck(&config).await.stuck
    }

    /// Run one full sweep now: detect, restart what still has attempt
    /// budget, and return everything found stuck.
    #[instrument(skip(self))]
    pub async fn scan_now(&self) -> Vec<StuckTask> {
        let config = *self.config.read().await;
        let outcome = self.find_stuck(&config).await;

        // A fresh record clears the slate; the next stall starts a new
        // attempt budget.
        if !outcome.fresh.is_empty() {
            let mut attempts = self.attempts.write().await;
            for task_id in &outcome.fresh {
                if attempts.remove(task_id).is_some() {
                    debug!(task_id = %task_id, "attempt counter reset, record fresh again");
                }
            }
        }

        let mut dispatched = Vec::new();
        for stuck in &outcome.stuck {
            if stuck.exhausted {
                warn!(
                    task_id = %stuck.task_id,
                    attempts = stuck.attempts,
                    "recovery attempts exhausted, task needs manual intervention"
                );
                continue;
            }
            let attempt = {
                let mut attempts = self.attempts.write().await;
                let counter = attempts.entry(stuck.task_id).or_insert(0);
                *counter += 1;
                *counter
            };
            self.stats.write().await.total_attempts += 1;
            dispatched.push(self.dispatch_restart(stuck.clone(), attempt));
        }
        // Restarts run concurrently; the sweep settles them before its
        // bookkeeping so the stats it leaves behind are consistent.
        futures::future::join_all(dispatched).await;

        self.stats.write().await.tasks_currently_stuck = outcome.stuck.len();
        *self.last_scan.write().await = Some(Utc::now());

        outcome.stuck
    }

    /// Main loop body; exits when [`Self::stop`] was requested.
    async fn run_loop(self: Arc<Self>) {
        info!("recovery scanner started");
        loop {
            if self.stop_flag.load(Ordering::Acquire) {
                break;
            }
            let enabled = self.config.read().await.enabled;
            if enabled {
                let stuck = self.scan_now().await;
                if !stuck.is_empty() {
                    info!(count = stuck.len(), "sweep found stuck tasks");
                }
            } else {
                debug!("recovery disabled, sweep skipped");
            }
            let interval_ms = self.config.read().await.scan_interval_ms;
            tokio::select! {
                () = tokio::time::sleep(Duration::from_millis(interval_ms)) => {}
                () = self.stop_notify.notified() => {}
            }
        }
        self.running.store(false, Ordering::Release);
        info!("recovery scanner stopped");
    }

    /// Walk every project's tasks and classify the worker-active ones by
    /// record staleness. Failures are contained per project.
    async fn find_stuck(&self, config: &RecoveryConfig) -> SweepOutcome {
        let now = Utc::now();
        let mut outcome = SweepOutcome {
            stuck: Vec::new(),
            fresh: Vec::new(),
        };

        let projects = match self.task_store.list_projects().await {
            Ok(projects) => projects,
            Err(error) => {
                warn!(error = %error, "project listing failed, sweep skipped");
                return outcome;
            }
        };

        for project in projects {
            let tasks = match self.task_store.list_tasks(project.id).await {
                Ok(tasks) => tasks,
                Err(error) => {
                    self.record_project_error(project.id, format!("task listing failed: {error}"))
                        .await;
                    continue;
                }
            };
            for task in tasks {
                if !task.status.is_worker_active() {
                    continue;
                }
                self.classify_task(config, &project, &task, now, &mut outcome)
                    .await;
            }
        }
        outcome
    }

    async fn classify_task(
        &self,
        config: &RecoveryConfig,
        project: &Project,
        task: &Task,
        now: DateTime<Utc>,
        outcome: &mut SweepOutcome,
    ) {
        let path = self.plan_store.record_path(&project.state_root, &task.spec_id);
        let record = match self.plan_store.read_record(&path).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                debug!(
                    task_id = %task.id,
                    path = %path.display(),
                    "no plan record, staleness unknown, task skipped"
                );
                return;
            }
            Err(error) => {
                self.record_project_error(
                    project.id,
                    format!("plan record read failed for {}: {error}", task.spec_id),
                )
                .await;
                return;
            }
        };

        let stale_ms = record.age_ms(now);
        if stale_ms <= config.cooldown_period_ms {
            outcome.fresh.push(task.id);
            return;
        }

        let attempts = self.attempts_for(task.id).await;
        outcome.stuck.push(StuckTask {
            task_id: task.id,
            project_id: project.id,
            project_name: project.name.clone(),
            spec_id: task.spec_id.clone(),
            title: task.title.clone(),
            status: task.status,
            stale_ms,
            attempts,
            exhausted: attempts >= config.max_recovery_attempts,
            project_path: project.path.clone(),
        });
    }

    /// Spawn one restart call. `ai_review` tasks resume QA, everything else
    /// worker-active resumes execution from recorded progress.
    fn dispatch_restart(&self, stuck: StuckTask, attempt: u32) -> tokio::task::JoinHandle<()> {
        let spawner = Arc::clone(&self.spawner);
        let notifier = Arc::clone(&self.notifier);
        let stats = Arc::clone(&self.stats);
        tokio::spawn(async move {
            info!(
                task_id = %stuck.task_id,
                status = %stuck.status,
                stale_ms = stuck.stale_ms,
                attempt,
                "restarting stuck task"
            );
            let result = match stuck.status {
                TaskStatus::AiReview => {
                    spawner
                        .resume_qa(stuck.task_id, &stuck.project_path, &stuck.spec_id)
                        .await
                }
                _ => {
                    spawner
                        .resume_execution(
                            stuck.task_id,
                            &stuck.project_path,
                            &stuck.spec_id,
                            ResumeOptions::recovery(),
                        )
                        .await
                }
            };
            match result {
                Ok(()) => {
                    stats.write().await.successful_recoveries += 1;
                    notifier
                        .notify(RecoveryEvent::TaskRecovered {
                            task_id: stuck.task_id,
                            project_id: stuck.project_id,
                            status: stuck.status,
                            attempt,
                            at: Utc::now(),
                        })
                        .await;
                }
                Err(error) => {
                    warn!(task_id = %stuck.task_id, error = %error, "restart call failed");
                    stats.write().await.failed_recoveries += 1;
                    notifier
                        .notify(RecoveryEvent::RecoveryFailed {
                            task_id: stuck.task_id,
                            project_id: stuck.project_id,
                            status: stuck.status,
                            attempt,
                            error: error.to_string(),
                            at: Utc::now(),
                        })
                        .await;
                }
            }
        })
    }

    async fn record_project_error(&self, project_id: Uuid, message: String) {
        warn!(project_id = %project_id, error = %message, "project sweep error");
        let mut errors = self.project_errors.write().await;
        let log = errors.entry(project_id).or_default();
        if log.len() == MAX_PROJECT_ERRORS {
            log.pop_front();
        }
        log.push_back(message);
    }
}
