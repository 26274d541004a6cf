use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use log::{debug, warn};
use tempfile::NamedTempFile;

use crate::io::sync::SyncStatus;
use crate::model::task::Task;
use crate::ops::import::validate_tasks;

/// Error type for persistence operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("could not read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("could not serialize tasks: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Where the task collection lives between sessions. Loaded once at
/// startup and written in full after every mutation.
pub trait TaskStore {
    /// The stored collection; empty when nothing was saved yet.
    fn load(&mut self) -> Result<Vec<Task>, StoreError>;

    /// Replace the stored collection with `tasks`.
    fn save_all(&mut self, tasks: &[Task]) -> Result<(), StoreError>;

    /// Save without pushing to any remote mirror. Used for collections
    /// that came from the remote in the first place.
    fn save_local(&mut self, tasks: &[Task]) -> Result<(), StoreError> {
        self.save_all(tasks)
    }

    fn sync_status(&self) -> SyncStatus {
        SyncStatus::Offline
    }

    /// Short name for log messages
    fn describe(&self) -> String;
}

// ---------------------------------------------------------------------------
// JSON file
// ---------------------------------------------------------------------------

/// A pretty-printed JSON array on disk, the same shape `import` accepts.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonFileStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TaskStore for JsonFileStore {
    fn load(&mut self) -> Result<Vec<Task>, StoreError> {
        if !self.path.exists() {
            debug!("event=store_missing path={}", self.path.display());
            return Ok(Vec::new());
        }
        let text = fs::read_to_string(&self.path).map_err(|e| StoreError::Read {
            path: self.path.clone(),
            source: e,
        })?;
        parse_tasks(&text).map_err(|e| StoreError::Parse {
            path: self.path.clone(),
            source: e,
        })
    }

    fn save_all(&mut self, tasks: &[Task]) -> Result<(), StoreError> {
        let mut json = serde_json::to_string_pretty(tasks)?;
        json.push('\n');
        let write_err = |e| StoreError::Write {
            path: self.path.clone(),
            source: e,
        };
        if let Some(dir) = self.path.parent()
            && !dir.as_os_str().is_empty()
        {
            fs::create_dir_all(dir).map_err(write_err)?;
        }
        atomic_write(&self.path, json.as_bytes()).map_err(write_err)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Parse a stored collection. Blank content is an empty collection.
pub fn parse_tasks(text: &str) -> Result<Vec<Task>, serde_json::Error> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(text)
}

/// Write `content` to `path` atomically using a temp file + rename.
pub fn atomic_write(path: &Path, content: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(d) if !d.as_os_str().is_empty() => d,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

/// Keeps the collection in memory only: guest sessions and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tasks: Vec<Task>,
    fail_saves: bool,
    fail_loads: bool,
    /// Number of successful saves
    pub saves: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    pub fn with_tasks(tasks: Vec<Task>) -> Self {
        MemoryStore {
            tasks,
            ..Default::default()
        }
    }

    /// Make every following save fail (or succeed again).
    pub fn set_fail_saves(&mut self, fail: bool) {
        self.fail_saves = fail;
    }

    pub fn set_fail_loads(&mut self, fail: bool) {
        self.fail_loads = fail;
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }
}

impl TaskStore for MemoryStore {
    fn load(&mut self) -> Result<Vec<Task>, StoreError> {
        if self.fail_loads {
            return Err(StoreError::Unavailable("memory store load disabled".into()));
        }
        Ok(self.tasks.clone())
    }

    fn save_all(&mut self, tasks: &[Task]) -> Result<(), StoreError> {
        if self.fail_saves {
            return Err(StoreError::Unavailable("memory store save disabled".into()));
        }
        self.tasks = tasks.to_vec();
        self.saves += 1;
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

// ---------------------------------------------------------------------------
// Local + remote mirror
// ---------------------------------------------------------------------------

/// A local store mirrored to an optional remote one. The remote copy wins
/// at startup when it has any tasks; saves go to both, and the remote
/// outcome drives the sync status.
#[derive(Debug)]
pub struct MirroredStore<L, R> {
    local: L,
    remote: Option<R>,
    status: SyncStatus,
}

impl<L: TaskStore, R: TaskStore> MirroredStore<L, R> {
    pub fn new(local: L, remote: Option<R>) -> Self {
        MirroredStore {
            local,
            remote,
            status: SyncStatus::Offline,
        }
    }

    pub fn local(&self) -> &L {
        &self.local
    }

    pub fn local_mut(&mut self) -> &mut L {
        &mut self.local
    }

    pub fn remote(&self) -> Option<&R> {
        self.remote.as_ref()
    }

    pub fn remote_mut(&mut self) -> Option<&mut R> {
        self.remote.as_mut()
    }
}

impl<L: TaskStore, R: TaskStore> TaskStore for MirroredStore<L, R> {
    fn load(&mut self) -> Result<Vec<Task>, StoreError> {
        let Some(remote) = self.remote.as_mut() else {
            self.status = SyncStatus::Offline;
            return self.local.load();
        };

        self.status = SyncStatus::Syncing;
        match remote.load() {
            Ok(tasks) if !tasks.is_empty() => match validate_tasks(tasks) {
                Ok(valid) => {
                    self.status = SyncStatus::Synced;
                    if let Err(e) = self.local.save_all(&valid.tasks) {
                        warn!("event=local_refresh_failed store={} error={}", self.local.describe(), e);
                    }
                    debug!("event=load_remote store={} count={}", remote.describe(), valid.tasks.len());
                    Ok(valid.tasks)
                }
                Err(e) => {
                    warn!("event=remote_rejected store={} error={}", remote.describe(), e);
                    self.status = SyncStatus::Error(format!("rejected remote copy: {}", e));
                    self.local.load()
                }
            },
            Ok(_) => {
                self.status = SyncStatus::Synced;
                self.local.load()
            }
            Err(e) => {
                warn!("event=remote_load_failed store={} error={}", remote.describe(), e);
                self.status = SyncStatus::Error(e.to_string());
                self.local.load()
            }
        }
    }

    fn save_all(&mut self, tasks: &[Task]) -> Result<(), StoreError> {
        let local_result = self.local.save_all(tasks);
        if let Some(remote) = self.remote.as_mut() {
            self.status = match remote.save_all(tasks) {
                Ok(()) => SyncStatus::Synced,
                Err(e) => {
                    warn!("event=remote_save_failed store={} error={}", remote.describe(), e);
                    SyncStatus::Error(e.to_string())
                }
            };
        }
        local_result
    }

    fn save_local(&mut self, tasks: &[Task]) -> Result<(), StoreError> {
        self.local.save_all(tasks)
    }

    fn sync_status(&self) -> SyncStatus {
        self.status.clone()
    }

    fn describe(&self) -> String {
        match &self.remote {
            Some(remote) => format!("{} (mirror {})", self.local.describe(), remote.describe()),
            None => self.local.describe(),
        }
    }
}
