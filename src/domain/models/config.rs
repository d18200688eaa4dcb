//! Configuration structures.
//!
//! Defaults here are the documented baseline; the loader layers YAML files
//! and `DROVER_`-prefixed environment variables on top.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

use super::task::Project;

/// Main configuration structure for Drover.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Recovery scanner configuration
    #[serde(default)]
    pub recovery: RecoveryConfig,

    /// Process registry configuration
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Worker resume command templates
    #[serde(default)]
    pub spawner: SpawnerConfig,

    /// Projects whose tasks this instance watches
    #[serde(default)]
    pub projects: Vec<ProjectConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            recovery: RecoveryConfig::default(),
            registry: RegistryConfig::default(),
            logging: LoggingConfig::default(),
            spawner: SpawnerConfig::default(),
            projects: vec![],
        }
    }
}

/// Recovery scanner knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RecoveryConfig {
    /// Whether the scanner may run at all
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// How stale a record must be before its task counts as stuck
    #[serde(default = "default_cooldown_period_ms")]
    pub cooldown_period_ms: u64,

    /// Restart attempts per task before giving up
    #[serde(default = "default_max_recovery_attempts")]
    pub max_recovery_attempts: u32,

    /// Time between scans
    #[serde(default = "default_scan_interval_ms")]
    pub scan_interval_ms: u64,
}

const fn default_enabled() -> bool {
    true
}

const fn default_cooldown_period_ms() -> u64 {
    300_000
}

const fn default_max_recovery_attempts() -> u32 {
    3
}

const fn default_scan_interval_ms() -> u64 {
    60_000
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            cooldown_period_ms: default_cooldown_period_ms(),
            max_recovery_attempts: default_max_recovery_attempts(),
            scan_interval_ms: default_scan_interval_ms(),
        }
    }
}

/// Partial runtime update for [`RecoveryConfig`]; only recognized fields are
/// applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RecoveryConfigPatch {
    pub enabled: Option<bool>,
    pub cooldown_period_ms: Option<u64>,
    pub max_recovery_attempts: Option<u32>,
    pub scan_interval_ms: Option<u64>,
}

impl RecoveryConfigPatch {
    /// Apply the set fields onto a config, returning whether anything
    /// changed.
    pub fn apply(&self, config: &mut RecoveryConfig) -> bool {
        let before = *config;
        if let Some(enabled) = self.enabled {
            config.enabled = enabled;
        }
        if let Some(ms) = self.cooldown_period_ms {
            config.cooldown_period_ms = ms;
        }
        if let Some(max) = self.max_recovery_attempts {
            config.max_recovery_attempts = max;
        }
        if let Some(ms) = self.scan_interval_ms {
            config.scan_interval_ms = ms;
        }
        *config != before
    }
}

/// Process registry persistence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RegistryConfig {
    /// Where tracked process entries are persisted
    #[serde(default = "default_registry_path")]
    pub persist_path: PathBuf,
}

fn default_registry_path() -> PathBuf {
    PathBuf::from(".drover/processes.json")
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            persist_path: default_registry_path(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: pretty or json
    #[serde(default = "default_log_format")]
    pub format: String,

    /// When set, also write daily-rotated JSON logs into this directory
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            dir: None,
        }
    }
}

/// Command templates the shipped spawner adapter runs to resume workers.
///
/// Placeholders `{task_id}`, `{project_path}` and `{spec_id}` are substituted
/// per call. Empty templates mean the capability is not configured.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SpawnerConfig {
    #[serde(default)]
    pub resume_execution: Vec<String>,
    #[serde(default)]
    pub resume_qa: Vec<String>,
}

/// One watched project as declared in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ProjectConfig {
    /// Stable id; assigned at load when omitted
    #[serde(default)]
    pub id: Option<Uuid>,
    pub name: String,
    /// Workspace root
    pub path: PathBuf,
    /// Durable state directory; defaults to `<path>/.drover`
    #[serde(default)]
    pub state_dir: Option<PathBuf>,
}

impl ProjectConfig {
    /// Materialize the domain project this entry describes.
    pub fn resolve(&self) -> Project {
        let id = self.id.unwrap_or_else(Uuid::new_v4);
        let state_root = self
            .state_dir
            .clone()
            .unwrap_or_else(|| self.path.join(".drover"));
        Project {
            id,
            name: self.name.clone(),
            path: self.path.clone(),
            state_root,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recovery_defaults() {
        let config = RecoveryConfig::default();
        assert!(config.enabled);
        assert_eq!(config.cooldown_period_ms, 300_000);
        assert_eq!(config.max_recovery_attempts, 3);
        assert_eq!(config.scan_interval_ms, 60_000);
    }

    #[test]
    fn test_patch_applies_only_set_fields() {
        let mut config = RecoveryConfig::default();
        let patch = RecoveryConfigPatch {
            cooldown_period_ms: Some(10_000),
            ..RecoveryConfigPatch::default()
        };
        assert!(patch.apply(&mut config));
        assert_eq!(config.cooldown_period_ms, 10_000);
        assert!(config.enabled);
        assert_eq!(config.max_recovery_attempts, 3);
    }

    #[test]
    fn test_empty_patch_changes_nothing() {
        let mut config = RecoveryConfig::default();
        assert!(!RecoveryConfigPatch::default().apply(&mut config));
        assert_eq!(config, RecoveryConfig::default());
    }

    #[test]
    fn test_project_config_resolution() {
        let entry = ProjectConfig {
            id: None,
            name: "demo".into(),
            path: PathBuf::from("/work/demo"),
            state_dir: None,
        };
        let project = entry.resolve();
        assert_eq!(project.state_root, PathBuf::from("/work/demo/.drover"));

        let pinned = ProjectConfig {
            id: Some(Uuid::nil()),
            name: "demo".into(),
            path: PathBuf::from("/work/demo"),
            state_dir: Some(PathBuf::from("/state/demo")),
        };
        let project = pinned.resolve();
        assert_eq!(project.id, Uuid::nil());
        assert_eq!(project.state_root, PathBuf::from("/state/demo"));
    }

    #[test]
    fn test_config_yaml_round_trip() {
        let yaml = r"
recovery:
  enabled: false
  scan_interval_ms: 5000
logging:
  level: debug
projects:
  - name: demo
    path: /work/demo
";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(!config.recovery.enabled);
        assert_eq!(config.recovery.scan_interval_ms, 5000);
        // Unset fields keep their defaults.
        assert_eq!(config.recovery.cooldown_period_ms, 300_000);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.projects.len(), 1);
    }
}
