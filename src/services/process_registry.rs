//! Registry of auxiliary processes spawned on behalf of tasks.
//!
//! Workers leave behind dev servers and helper scripts; this registry tracks
//! their pids so they can be found, pruned when dead, and terminated when
//! their task or workspace is torn down. Entries persist to a JSON file so
//! the daemon can clean up processes registered by a previous run.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// How long a SIGTERM'd process gets before SIGKILL.
const DEFAULT_GRACE: Duration = Duration::from_secs(5);
/// Liveness poll step during the grace window.
const GRACE_POLL: Duration = Duration::from_millis(100);

/// Registry load failure.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("failed to read registry file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("registry file {path} is corrupt")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// What a tracked process is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessKind {
    DevServer,
    Script,
}

impl ProcessKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DevServer => "dev_server",
            Self::Script => "script",
        }
    }
}

impl std::fmt::Display for ProcessKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One tracked process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedProcess {
    pub id: Uuid,
    pub task_id: Uuid,
    pub workspace: PathBuf,
    pub pid: u32,
    pub kind: ProcessKind,
    pub label: String,
    pub registered_at: DateTime<Utc>,
}

/// Outcome of a termination request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminationReport {
    /// Processes that were alive and got signalled down
    pub terminated: usize,
    /// Entries whose process had already exited
    pub already_gone: usize,
}

/// Persistent registry of worker-spawned auxiliary processes.
///
/// Every mutation rewrites the backing file atomically (temp + rename),
/// best-effort: a persistence failure is logged and the in-memory registry
/// stays authoritative for this run.
pub struct ProcessRegistry {
    path: PathBuf,
    entries: RwLock<HashMap<Uuid, TrackedProcess>>,
    grace: Duration,
}

impl ProcessRegistry {
    /// Load the registry from `path`. A missing file is an empty registry,
    /// not an error.
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self, RegistryError> {
        let path = path.into();
        let entries = match tokio::fs::read_to_string(&path).await {
            Ok(content) => {
                let list: Vec<TrackedProcess> =
                    serde_json::from_str(&content).map_err(|source| RegistryError::Corrupt {
                        path: path.clone(),
                        source,
                    })?;
                debug!(path = %path.display(), entries = list.len(), "registry loaded");
                list.into_iter().map(|entry| (entry.id, entry)).collect()
            }
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(source) => {
                return Err(RegistryError::Read {
                    path: path.clone(),
                    source,
                })
            }
        };
        Ok(Self {
            path,
            entries: RwLock::new(entries),
            grace: DEFAULT_GRACE,
        })
    }

    /// Override the SIGTERM grace window.
    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Track a process. Returns the entry id.
    pub async fn register(
        &self,
        task_id: Uuid,
        workspace: impl Into<PathBuf>,
        pid: u32,
        kind: ProcessKind,
        label: impl Into<String>,
    ) -> Uuid {
        let entry = TrackedProcess {
            id: Uuid::new_v4(),
            task_id,
            workspace: workspace.into(),
            pid,
            kind,
            label: label.into(),
            registered_at: Utc::now(),
        };
        let id = entry.id;
        info!(
            task_id = %task_id,
            pid,
            kind = %entry.kind,
            label = %entry.label,
            "process registered"
        );
        self.entries.write().await.insert(id, entry);
        self.persist().await;
        id
    }

    /// Forget an entry without touching the process. Returns whether it
    /// existed.
    pub async fn deregister(&self, id: Uuid) -> bool {
        let removed = self.entries.write().await.remove(&id).is_some();
        if removed {
            self.persist().await;
        }
        removed
    }

    /// All entries, oldest registration first.
    pub async fn entries(&self) -> Vec<TrackedProcess> {
        let mut list: Vec<_> = self.entries.read().await.values().cloned().collect();
        list.sort_by_key(|entry| (entry.registered_at, entry.id));
        list
    }

    pub async fn entries_for_task(&self, task_id: Uuid) -> Vec<TrackedProcess> {
        self.entries()
            .await
            .into_iter()
            .filter(|entry| entry.task_id == task_id)
            .collect()
    }

    pub async fn entries_for_workspace(&self, workspace: &Path) -> Vec<TrackedProcess> {
        self.entries()
            .await
            .into_iter()
            .filter(|entry| entry.workspace == workspace)
            .collect()
    }

    /// Drop entries whose process no longer exists. Returns how many were
    /// dropped.
    pub async fn prune_dead(&self) -> usize {
        let dead: Vec<Uuid> = self
            .entries()
            .await
            .into_iter()
            .filter(|entry| !is_alive(entry.pid))
            .map(|entry| entry.id)
            .collect();
        if dead.is_empty() {
            return 0;
        }
        {
            let mut entries = self.entries.write().await;
            for id in &dead {
                entries.remove(id);
            }
        }
        info!(count = dead.len(), "dead process entries pruned");
        self.persist().await;
        dead.len()
    }

    /// Terminate and forget every process registered for a task.
    pub async fn terminate_task(&self, task_id: Uuid) -> TerminationReport {
        let matching = self.take_matching(|entry| entry.task_id == task_id).await;
        self.terminate_entries(matching).await
    }

    /// Terminate and forget every process registered under a workspace.
    pub async fn terminate_workspace(&self, workspace: &Path) -> TerminationReport {
        let matching = self.take_matching(|entry| entry.workspace == workspace).await;
        self.terminate_entries(matching).await
    }

    /// Terminate and forget everything.
    pub async fn shutdown_all(&self) -> TerminationReport {
        let matching = self.take_matching(|_| true).await;
        self.terminate_entries(matching).await
    }

    /// Remove and return entries matching the predicate, persisting the
    /// shrunken registry before any signalling starts.
    async fn take_matching(&self, matches: impl Fn(&TrackedProcess) -> bool) -> Vec<TrackedProcess> {
        let mut taken = Vec::new();
        {
            let mut entries = self.entries.write().await;
            let ids: Vec<Uuid> = entries
                .values()
                .filter(|entry| matches(entry))
                .map(|entry| entry.id)
                .collect();
            for id in ids {
                if let Some(entry) = entries.remove(&id) {
                    taken.push(entry);
                }
            }
        }
        if !taken.is_empty() {
            self.persist().await;
        }
        taken.sort_by_key(|entry| (entry.registered_at, entry.id));
        taken
    }

    /// SIGTERM each entry concurrently, give it the grace window, then
    /// SIGKILL whatever is still around.
    async fn terminate_entries(&self, entries: Vec<TrackedProcess>) -> TerminationReport {
        let grace = self.grace;
        let results = futures::future::join_all(
            entries
                .into_iter()
                .map(|entry| async move { terminate_one(&entry, grace).await }),
        )
        .await;

        let mut report = TerminationReport::default();
        for was_alive in results {
            if was_alive {
                report.terminated += 1;
            } else {
                report.already_gone += 1;
            }
        }
        report
    }

    /// Rewrite the backing file; failures are logged, never propagated.
    async fn persist(&self) {
        let list = self.entries().await;
        if let Err(error) = self.write_file(&list).await {
            warn!(
                path = %self.path.display(),
                error = %error,
                "registry persistence failed"
            );
        }
    }

    async fn write_file(&self, entries: &[TrackedProcess]) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let json = serde_json::to_string_pretty(entries)
            .map_err(|error| std::io::Error::new(std::io::ErrorKind::InvalidData, error))?;
        let temp = self.path.with_extension("json.tmp");
        tokio::fs::write(&temp, json).await?;
        tokio::fs::rename(&temp, &self.path).await
    }
}

/// Signal-0 liveness probe. EPERM means the process exists but belongs to
/// someone else, which still counts as alive.
fn is_alive(pid: u32) -> bool {
    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    match kill(Pid::from_raw(raw), None) {
        Ok(()) | Err(nix::errno::Errno::EPERM) => true,
        Err(_) => false,
    }
}

/// Returns whether the process was still alive when termination started.
async fn terminate_one(entry: &TrackedProcess, grace: Duration) -> bool {
    if !is_alive(entry.pid) {
        debug!(pid = entry.pid, label = %entry.label, "process already gone");
        return false;
    }
    let Ok(raw) = i32::try_from(entry.pid) else {
        return false;
    };
    let pid = Pid::from_raw(raw);

    info!(pid = entry.pid, label = %entry.label, "terminating process");
    if let Err(error) = kill(pid, Signal::SIGTERM) {
        warn!(pid = entry.pid, error = %error, "SIGTERM failed");
    }

    let deadline = tokio::time::Instant::now() + grace;
    while tokio::time::Instant::now() < deadline {
        if !is_alive(entry.pid) {
            return true;
        }
        tokio::time::sleep(GRACE_POLL).await;
    }

    warn!(pid = entry.pid, label = %entry.label, "grace expired, sending SIGKILL");
    if let Err(error) = kill(pid, Signal::SIGKILL) {
        warn!(pid = entry.pid, error = %error, "SIGKILL failed");
    }
    true
}
