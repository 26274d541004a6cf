use chrono::{DateTime, Utc};

use crate::model::task::Task;
use crate::model::tree::TaskTree;
use crate::ops::recurrence;
use crate::ops::task_ops::{TaskError, find_task_mut};

/// Result of toggling a task's completion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToggleOutcome {
    /// The task's completion state after the toggle
    pub completed: bool,
    /// ID of the recurring occurrence created, if any
    pub spawned: Option<String>,
}

/// Set completion on `task` and, unconditionally, on every descendant.
pub fn set_completion(task: &mut Task, completed: bool, now: DateTime<Utc>) {
    task.completed = completed;
    task.completed_at = if completed { Some(now) } else { None };
    for sub in task.subtasks.iter_mut() {
        set_completion(sub, completed, now);
    }
}

/// Flip completion of a task and cascade it through the subtree. When a
/// top-level task becomes completed and `recurrence` is on, the next
/// occurrence of its series is created. Repeat fields on subtasks are kept
/// but never spawn anything.
pub fn toggle_completion(
    tree: &mut TaskTree,
    task_id: &str,
    now: DateTime<Utc>,
    recurrence: bool,
) -> Result<ToggleOutcome, TaskError> {
    let top_level = tree.tasks.iter().any(|t| t.id == task_id);
    let task = find_task_mut(tree, task_id).ok_or_else(|| TaskError::NotFound(task_id.to_string()))?;
    let completed = !task.completed;
    set_completion(task, completed, now);

    let spawns = completed && recurrence && top_level && task.is_recurrence_template();
    let template = spawns.then(|| task.clone());
    let spawned = template.and_then(|t| recurrence::on_completion(tree, &t, now));

    Ok(ToggleOutcome { completed, spawned })
}
