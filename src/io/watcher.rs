use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc;

use log::debug;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::io::store::parse_tasks;
use crate::io::sync::SyncEvent;

/// Watches the shared remote document and turns every change into a
/// [`SyncEvent`] carrying the full remote collection.
pub struct RemoteWatcher {
    _watcher: RecommendedWatcher,
    rx: mpsc::Receiver<SyncEvent>,
    path: PathBuf,
}

impl RemoteWatcher {
    /// Start watching `remote`. Returns a `RemoteWatcher` whose `poll()`
    /// method should be called each tick.
    pub fn start(remote: &Path) -> Result<Self, notify::Error> {
        let (tx, rx) = mpsc::channel();
        let target = remote.to_path_buf();
        let file_name = remote.file_name().map(|n| n.to_os_string());
        // Saves replace the file by rename, so watch the directory.
        let dir = match remote.parent() {
            Some(d) if !d.as_os_str().is_empty() => d.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let mut watcher = RecommendedWatcher::new(
            move |result: Result<Event, notify::Error>| {
                let event = match result {
                    Ok(e) => e,
                    Err(e) => {
                        let _ = tx.send(SyncEvent::Failed(e.to_string()));
                        return;
                    }
                };

                match event.kind {
                    EventKind::Create(_) | EventKind::Modify(_) => {}
                    _ => return,
                }

                let touched = event
                    .paths
                    .iter()
                    .any(|p| p.file_name().map(|n| n.to_os_string()) == file_name);
                if touched && target.exists() {
                    let _ = tx.send(read_snapshot(&target));
                }
            },
            Config::default(),
        )?;

        watcher.watch(&dir, RecursiveMode::NonRecursive)?;
        debug!("event=watch_started path={}", remote.display());
        Ok(RemoteWatcher {
            _watcher: watcher,
            rx,
            path: remote.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Non-blocking poll for pending sync events.
    /// Returns all queued events (may be empty).
    pub fn poll(&self) -> Vec<SyncEvent> {
        let mut events = Vec::new();
        while let Ok(evt) = self.rx.try_recv() {
            events.push(evt);
        }
        events
    }

    /// Wait up to `timeout` for the next event.
    pub fn wait(&self, timeout: std::time::Duration) -> Option<SyncEvent> {
        self.rx.recv_timeout(timeout).ok()
    }
}

/// Read the remote document as a full snapshot.
pub fn read_snapshot(path: &Path) -> SyncEvent {
    let text = match fs::read_to_string(path) {
        Ok(t) => t,
        Err(e) => return SyncEvent::Failed(format!("could not read {}: {}", path.display(), e)),
    };
    match parse_tasks(&text) {
        Ok(tasks) => SyncEvent::Snapshot(tasks),
        Err(e) => SyncEvent::Failed(format!("could not parse {}: {}", path.display(), e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_read_snapshot() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("shared.json");
        fs::write(
            &path,
            r#"[{"id": "a", "text": "Shared", "createdAt": "2025-05-01T09:00:00Z"}]"#,
        )
        .unwrap();
        match read_snapshot(&path) {
            SyncEvent::Snapshot(tasks) => assert_eq!(tasks[0].text, "Shared"),
            other => panic!("expected snapshot, got {:?}", other),
        }
    }

    #[test]
    fn test_read_snapshot_failures() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("shared.json");
        assert!(matches!(read_snapshot(&path), SyncEvent::Failed(_)));
        fs::write(&path, "{oops").unwrap();
        assert!(matches!(read_snapshot(&path), SyncEvent::Failed(_)));
    }

    #[test]
    fn test_poll_is_empty_without_changes() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("shared.json");
        let watcher = RemoteWatcher::start(&path).unwrap();
        assert_eq!(watcher.path(), path.as_path());
        assert!(watcher.poll().is_empty());
    }
}
