//! The composition root: owns the task tree and its store.
//!
//! Every successful mutation is persisted right away. A persistence failure
//! is logged and leaves the in-memory tree as the source of truth for the
//! rest of the session. Rejected mutations (empty text, unknown id) change
//! nothing and are logged at debug level.
//!
//! A collection that could not be loaded is never overwritten: after a
//! failed or invalid load the session runs in memory only until an import
//! or a remote snapshot supplies a whole new tree.

use chrono::{DateTime, TimeZone, Utc};
use log::{debug, error, info, warn};

use crate::io::store::TaskStore;
use crate::io::sync::{SyncEvent, SyncStatus};
use crate::model::task::{NewTask, Task, TaskPatch};
use crate::model::tree::TaskTree;
use crate::ops::completion::{self, ToggleOutcome};
use crate::ops::filter::{self, FilterCriteria};
use crate::ops::import::{self, ImportError};
use crate::ops::stats::{self, TaskStats};
use crate::ops::task_ops::{self, TaskError};
use crate::ops::{export, recurrence};

pub struct App<S: TaskStore> {
    tree: TaskTree,
    store: S,
    recurrence: bool,
    sync_status: SyncStatus,
    load_error: Option<String>,
}

impl<S: TaskStore> App<S> {
    /// Load the stored tasks and materialize missed recurring occurrences,
    /// saving only when backfill created any. A failed or invalid load
    /// starts from an empty tree and leaves the stored copy alone.
    pub fn open(mut store: S, recurrence_enabled: bool, now: DateTime<Utc>) -> Self {
        let loaded = store.load().map_err(|e| e.to_string()).and_then(|tasks| {
            import::validate_tasks(tasks)
                .map(|valid| valid.tasks)
                .map_err(|e| format!("stored tasks are invalid: {}", e))
        });
        let (tasks, load_error) = match loaded {
            Ok(tasks) => {
                info!(
                    "event=startup_load source={} count={}",
                    store.describe(),
                    tasks.len()
                );
                (tasks, None)
            }
            Err(e) => {
                error!("event=startup_load_failed source={} error={}", store.describe(), e);
                (Vec::new(), Some(e))
            }
        };

        let mut app = App {
            tree: TaskTree::new(tasks),
            sync_status: store.sync_status(),
            store,
            recurrence: recurrence_enabled,
            load_error,
        };

        if app.recurrence && app.load_error.is_none() {
            let created = recurrence::backfill(&mut app.tree, now);
            if !created.is_empty() {
                info!("event=backfill created={}", created.len());
                app.persist();
            }
        }
        app
    }

    // ---- Mutations ----

    /// Create a top-level task. Returns its ID.
    pub fn add(&mut self, draft: NewTask, now: DateTime<Utc>) -> Result<String, TaskError> {
        let result = task_ops::add_task(&mut self.tree, draft, now).map(|t| t.id.clone());
        self.finish("add", result)
    }

    /// Append a subtask under `parent_id`. Returns the new subtask's ID.
    pub fn add_subtask(
        &mut self,
        parent_id: &str,
        text: &str,
        now: DateTime<Utc>,
    ) -> Result<String, TaskError> {
        let result = task_ops::add_subtask(&mut self.tree, parent_id, text, now).map(|t| t.id.clone());
        self.finish("add_subtask", result)
    }

    pub fn remove(&mut self, task_id: &str) -> Result<Task, TaskError> {
        let result = task_ops::remove_task(&mut self.tree, task_id);
        self.finish("remove", result)
    }

    pub fn update(&mut self, task_id: &str, patch: TaskPatch) -> Result<(), TaskError> {
        let result = task_ops::update_task(&mut self.tree, task_id, patch);
        self.finish("update", result)
    }

    pub fn toggle_archived(&mut self, task_id: &str) -> Result<bool, TaskError> {
        let result = task_ops::toggle_archived(&mut self.tree, task_id);
        self.finish("toggle_archived", result)
    }

    /// Flip completion, cascade it to the subtree and, when the task became
    /// completed, create the next occurrence of its series.
    pub fn toggle_completion(
        &mut self,
        task_id: &str,
        now: DateTime<Utc>,
    ) -> Result<ToggleOutcome, TaskError> {
        let result = completion::toggle_completion(&mut self.tree, task_id, now, self.recurrence);
        self.finish("toggle_completion", result)
    }

    /// Replace the whole tree with an imported JSON array. Invalid input is
    /// rejected without touching the current tree. Returns the number of
    /// tasks imported, subtasks included.
    pub fn import_bulk(&mut self, json: &str) -> Result<usize, ImportError> {
        let parsed = match import::parse_import(json) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("event=import_rejected error={}", e);
                return Err(e);
            }
        };
        import::import_bulk(&mut self.tree, parsed.tasks);
        self.load_error = None;
        info!("event=import count={}", parsed.total_count);
        self.persist();
        Ok(parsed.total_count)
    }

    /// Remove every completed task at any depth. Returns how many were
    /// removed directly.
    pub fn clear_completed(&mut self) -> usize {
        let removed = task_ops::clear_completed(&mut self.tree);
        if removed == 0 {
            debug!("event=noop op=clear_completed reason=nothing completed");
        } else {
            self.persist();
        }
        removed
    }

    /// Apply a push from the remote source. A valid snapshot supersedes the
    /// whole local tree and is written to local storage only. An invalid
    /// snapshot or a failure only changes the sync status.
    pub fn apply_sync_event(&mut self, event: SyncEvent) {
        match event {
            SyncEvent::Snapshot(tasks) => {
                let tasks = match import::validate_tasks(tasks) {
                    Ok(valid) => valid.tasks,
                    Err(e) => {
                        warn!("event=remote_snapshot_rejected error={}", e);
                        self.sync_status = SyncStatus::Error(format!("rejected remote snapshot: {}", e));
                        return;
                    }
                };
                info!("event=remote_snapshot count={}", tasks.len());
                self.tree = TaskTree::new(tasks);
                self.load_error = None;
                if let Err(e) = self.store.save_local(&self.tree.tasks) {
                    error!("event=save_failed store={} error={}", self.store.describe(), e);
                }
                self.sync_status = SyncStatus::Synced;
            }
            SyncEvent::Failed(msg) => {
                warn!("event=remote_sync_failed error={}", msg);
                self.sync_status = SyncStatus::Error(msg);
            }
        }
    }

    // ---- Queries ----

    pub fn tasks(&self) -> &[Task] {
        self.tree.top_level()
    }

    pub fn tree(&self) -> &TaskTree {
        &self.tree
    }

    pub fn find(&self, task_id: &str) -> Option<&Task> {
        task_ops::find_task(&self.tree, task_id)
    }

    /// Resolve a full ID or unique ID prefix.
    pub fn resolve(&self, prefix: &str) -> Result<String, TaskError> {
        task_ops::resolve_id(&self.tree, prefix)
    }

    pub fn flatten(&self) -> Vec<&Task> {
        task_ops::flatten(&self.tree)
    }

    /// Top-level tasks matching `criteria`, in display order.
    pub fn view(&self, criteria: &FilterCriteria, now: DateTime<Utc>) -> Vec<&Task> {
        filter::filtered_sorted_view(self.tree.top_level(), criteria, now)
    }

    pub fn statistics(&self, now: DateTime<Utc>) -> TaskStats {
        stats::compute(&self.tree.tasks, now)
    }

    pub fn export_csv<Tz>(&self, tz: &Tz) -> String
    where
        Tz: TimeZone,
        Tz::Offset: std::fmt::Display,
    {
        export::export_csv(&self.tree.tasks, tz)
    }

    pub fn sync_status(&self) -> &SyncStatus {
        &self.sync_status
    }

    /// Why the stored collection could not be loaded, if it could not.
    /// While set, nothing is written to the store.
    pub fn load_error(&self) -> Option<&str> {
        self.load_error.as_deref()
    }

    pub fn recurrence_enabled(&self) -> bool {
        self.recurrence
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    // ---- Persistence ----

    fn finish<T>(&mut self, op: &str, result: Result<T, TaskError>) -> Result<T, TaskError> {
        match &result {
            Ok(_) => {
                debug!("event=mutation op={}", op);
                self.persist();
            }
            Err(e) => debug!("event=noop op={} reason={}", op, e),
        }
        result
    }

    fn persist(&mut self) {
        if let Some(reason) = &self.load_error {
            warn!("event=save_skipped store={} reason={}", self.store.describe(), reason);
            return;
        }
        if let Err(e) = self.store.save_all(&self.tree.tasks) {
            error!("event=save_failed store={} error={}", self.store.describe(), e);
        }
        self.sync_status = self.store.sync_status();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::store::{JsonFileStore, MemoryStore, MirroredStore};
    use std::fs;
    use crate::model::task::RepeatType;
    use chrono::TimeDelta;
    use pretty_assertions::assert_eq;

    fn now() -> DateTime<Utc> {
        "2025-05-10T12:00:00Z".parse().unwrap()
    }

    fn fixture() -> Vec<Task> {
        serde_json::from_str(
            r#"[
  {"id": "a", "text": "Write report", "createdAt": "2025-05-01T09:00:00Z",
   "subtasks": [{"id": "a1", "text": "Outline", "createdAt": "2025-05-01T09:00:00Z"}]},
  {"id": "b", "text": "Archive mail", "createdAt": "2025-05-02T09:00:00Z", "completed": true,
   "completedAt": "2025-05-03T09:00:00Z"}
]"#,
        )
        .unwrap()
    }

    fn open_with(tasks: Vec<Task>) -> App<MemoryStore> {
        App::open(MemoryStore::with_tasks(tasks), true, now())
    }

    #[test]
    fn test_open_loads_without_saving() {
        let app = open_with(fixture());
        assert_eq!(app.tasks().len(), 2);
        assert_eq!(app.load_error(), None);
        assert_eq!(app.store().saves, 0);
        assert_eq!(app.sync_status(), &SyncStatus::Offline);
    }

    #[test]
    fn test_open_with_failing_load_starts_empty() {
        let mut store = MemoryStore::with_tasks(fixture());
        store.set_fail_loads(true);
        let mut app = App::open(store, true, now());
        assert!(app.tasks().is_empty());
        assert!(app.load_error().is_some());

        // the session keeps working in memory but never overwrites the store
        let id = app.add(NewTask::new("Scratch"), now()).unwrap();
        assert!(app.find(&id).is_some());
        assert_eq!(app.store().saves, 0);
        assert_eq!(app.store().tasks(), fixture().as_slice());
    }

    #[test]
    fn test_unparseable_file_is_left_unchanged() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("tasks.json");
        let original = r#"[{"id": "a", "text": "Fine", "createdAt": "2025-05-01T09:00:00Z"},
 {"id": "b", "text": "Broken", "createdAt": "2025-05-01T09:00:00Z", "subtasks": 7}]"#;
        fs::write(&path, original).unwrap();

        let mut app = App::open(JsonFileStore::new(&path), true, now());
        assert!(app.tasks().is_empty());
        assert!(app.load_error().unwrap().contains("could not parse"));
        assert_eq!(fs::read_to_string(&path).unwrap(), original);

        app.add(NewTask::new("Would clobber"), now()).unwrap();
        app.clear_completed();
        assert_eq!(fs::read_to_string(&path).unwrap(), original);
    }

    #[test]
    fn test_invalid_stored_collection_is_not_loaded() {
        let mut dup = fixture();
        dup[1].id = "a1".into();
        let app = open_with(dup.clone());
        assert!(app.tasks().is_empty());
        assert!(app.load_error().unwrap().contains("more than once"));
        assert_eq!(app.store().tasks(), dup.as_slice());
    }

    #[test]
    fn test_import_recovers_from_failed_load() {
        let mut store = MemoryStore::with_tasks(fixture());
        store.set_fail_loads(true);
        let mut app = App::open(store, true, now());
        app.import_bulk(r#"[{"id": "z", "text": "Restored", "createdAt": "2025-05-01T09:00:00Z"}]"#)
            .unwrap();
        assert_eq!(app.load_error(), None);
        assert_eq!(app.store().tasks()[0].id, "z");
    }

    #[test]
    fn test_add_then_find_then_remove() {
        let mut app = open_with(Vec::new());
        let mut draft = NewTask::new("  Call plumber ");
        draft.tags = vec!["home".into(), " ".into()];
        let id = app.add(draft, now()).unwrap();

        let task = app.find(&id).unwrap();
        assert_eq!(task.text, "Call plumber");
        assert_eq!(task.tags, vec!["home"]);
        assert_eq!(task.created_at, now());
        assert_eq!(app.store().saves, 1);

        app.remove(&id).unwrap();
        assert!(app.find(&id).is_none());
        assert!(app.store().tasks().is_empty());
    }

    #[test]
    fn test_rejected_mutations_do_not_persist() {
        let mut app = open_with(fixture());
        assert_eq!(app.add(NewTask::new("   "), now()), Err(TaskError::EmptyText));
        assert!(app.add_subtask("missing", "x", now()).is_err());
        assert!(app.remove("missing").is_err());
        assert!(app.toggle_archived("missing").is_err());
        assert_eq!(app.tasks().len(), 2);
        assert_eq!(app.store().saves, 0);
    }

    #[test]
    fn test_save_failure_keeps_in_memory_state() {
        let mut app = open_with(fixture());
        app.store_mut().set_fail_saves(true);
        let id = app.add(NewTask::new("Still here"), now()).unwrap();
        assert!(app.find(&id).is_some());
        assert_eq!(app.store().tasks().len(), 2);
    }

    #[test]
    fn test_subtask_and_completion_cascade() {
        let mut app = open_with(fixture());
        let sub = app.add_subtask("a1", "Find sources", now()).unwrap();
        let outcome = app.toggle_completion("a", now()).unwrap();
        assert!(outcome.completed);
        assert!(app.find(&sub).unwrap().completed);
        assert!(app.find("a1").unwrap().completed);
    }

    #[test]
    fn test_update_merges_patch() {
        let mut app = open_with(fixture());
        let patch = TaskPatch {
            notes: Some("<i>draft</i>".into()),
            progress: Some(50),
            ..Default::default()
        };
        app.update("a", patch).unwrap();
        let task = app.find("a").unwrap();
        assert_eq!(task.notes, "<i>draft</i>");
        assert_eq!(task.progress, 50);
        assert_eq!(task.text, "Write report");
    }

    #[test]
    fn test_import_rejection_leaves_tree_untouched() {
        let mut app = open_with(fixture());
        assert!(app.import_bulk(r#"{"not": "an array"}"#).is_err());
        assert!(app.import_bulk("[").is_err());
        assert_eq!(app.tasks(), fixture().as_slice());
        assert_eq!(app.store().saves, 0);

        let count = app
            .import_bulk(r#"[{"id": "z", "text": "Fresh", "createdAt": "2025-05-01T09:00:00Z"}]"#)
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(app.tasks().len(), 1);
        assert_eq!(app.store().tasks()[0].id, "z");
    }

    #[test]
    fn test_clear_completed() {
        let mut app = open_with(fixture());
        assert_eq!(app.clear_completed(), 1);
        assert!(app.find("b").is_none());
        assert_eq!(app.clear_completed(), 0);
        assert_eq!(app.store().saves, 1);
    }

    #[test]
    fn test_open_backfills_missed_occurrences() {
        let mut template = Task::new("r".into(), "Take vitamins".into(), now() - TimeDelta::days(10));
        template.due_date = Some(now() - TimeDelta::days(3));
        template.repeat_type = RepeatType::Daily;
        template.repeat_until = Some(now() + TimeDelta::days(30));
        template.completed = true;
        template.completed_at = template.due_date;

        let app = App::open(MemoryStore::with_tasks(vec![template.clone()]), true, now());
        assert_eq!(app.tasks().len(), 4);
        assert_eq!(app.store().tasks().len(), 4);
        assert_eq!(app.store().saves, 1);

        let app = App::open(MemoryStore::with_tasks(vec![template]), false, now());
        assert_eq!(app.tasks().len(), 1);
        assert_eq!(app.store().saves, 0);
    }

    #[test]
    fn test_view_and_statistics() {
        let app = open_with(fixture());
        let view = app.view(&FilterCriteria::default(), now());
        assert_eq!(view[0].id, "a");
        let stats = app.statistics(now());
        assert_eq!(stats.total, 3);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.completion_rate, 33);
        assert_eq!(app.flatten().len(), 3);
    }

    #[test]
    fn test_sync_snapshot_replaces_tree_and_saves_locally() {
        let store = MirroredStore::new(MemoryStore::new(), Some(MemoryStore::new()));
        let mut app = App::open(store, true, now());
        app.add(NewTask::new("Local only"), now()).unwrap();
        assert_eq!(app.sync_status(), &SyncStatus::Synced);

        app.apply_sync_event(SyncEvent::Snapshot(fixture()));
        assert_eq!(app.tasks(), fixture().as_slice());
        assert_eq!(app.store().local().tasks(), fixture().as_slice());
        // the remote still holds what was last pushed
        assert_eq!(app.store().remote().unwrap().tasks()[0].text, "Local only");

        app.apply_sync_event(SyncEvent::Failed("unreachable".into()));
        assert!(app.sync_status().is_error());
        assert_eq!(app.tasks().len(), 2);
    }

    #[test]
    fn test_invalid_snapshots_are_rejected() {
        let mut app = open_with(fixture());
        let created = now();

        let blank = vec![Task::new("x".into(), "  ".into(), created)];
        app.apply_sync_event(SyncEvent::Snapshot(blank));
        assert!(app.sync_status().is_error());
        assert_eq!(app.tasks(), fixture().as_slice());

        let dup = vec![
            Task::new("x".into(), "one".into(), created),
            Task::new("x".into(), "dup".into(), created),
        ];
        app.apply_sync_event(SyncEvent::Snapshot(dup));
        assert!(app.sync_status().to_string().contains("more than once"));
        assert_eq!(app.tasks(), fixture().as_slice());
        assert_eq!(app.store().saves, 0);
        assert_eq!(app.resolve("a").unwrap(), "a");
    }
}
