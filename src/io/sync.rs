use std::fmt;

use crate::model::task::Task;

/// Remote sync state, shown by the presentation layer
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SyncStatus {
    /// The remote copy matches the last save
    Synced,
    /// A remote write or read is in flight
    Syncing,
    /// No remote configured; local storage only
    #[default]
    Offline,
    /// The last remote operation failed
    Error(String),
}

impl SyncStatus {
    pub fn label(&self) -> &'static str {
        match self {
            SyncStatus::Synced => "synced",
            SyncStatus::Syncing => "syncing",
            SyncStatus::Offline => "offline",
            SyncStatus::Error(_) => "error",
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, SyncStatus::Error(_))
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncStatus::Error(msg) => write!(f, "error: {}", msg),
            other => f.write_str(other.label()),
        }
    }
}

/// Pushed by the remote source whenever the shared document changes
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// The full remote collection; supersedes local state
    Snapshot(Vec<Task>),
    /// The remote document could not be read or parsed
    Failed(String),
}
