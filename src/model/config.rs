use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Configuration from `config.toml` in the data directory
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub features: FeatureConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Local task file, relative to the data directory
    #[serde(default = "default_task_file")]
    pub file: String,
    /// Shared document mirrored on every save and watched for remote edits
    #[serde(default)]
    pub remote: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            file: default_task_file(),
            remote: None,
        }
    }
}

fn default_task_file() -> String {
    "tasks.json".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureConfig {
    /// Off = the simple variant: no occurrences on completion, no backfill
    #[serde(default = "default_true")]
    pub recurrence: bool,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        FeatureConfig { recurrence: true }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Rotating log files go here; stderr when unset
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            level: default_log_level(),
            dir: None,
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}
