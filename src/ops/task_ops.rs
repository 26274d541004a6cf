use std::collections::HashSet;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::model::task::{NewTask, Task, TaskPatch, clean_tags};
use crate::model::tree::TaskTree;

/// Error type for task operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TaskError {
    #[error("task text is empty")]
    EmptyText,
    #[error("task not found: {0}")]
    NotFound(String),
    #[error("id prefix '{0}' matches more than one task")]
    AmbiguousId(String),
}

// ---------------------------------------------------------------------------
// CRUD
// ---------------------------------------------------------------------------

/// Create a top-level task at the front of the list.
pub fn add_task(tree: &mut TaskTree, draft: NewTask, now: DateTime<Utc>) -> Result<&Task, TaskError> {
    let text = draft.text.trim();
    if text.is_empty() {
        return Err(TaskError::EmptyText);
    }

    let mut task = Task::new(generate_id(tree), text.to_string(), now);
    task.priority = draft.priority;
    task.due_date = draft.due_date;
    task.notes = draft.notes.trim().to_string();
    task.tags = clean_tags(&draft.tags);
    task.progress = draft.progress.min(100);
    task.repeat_type = draft.repeat_type;
    task.repeat_until = draft.repeat_until;

    tree.tasks.insert(0, task);
    Ok(&tree.tasks[0])
}

/// Append a subtask to the task identified by `parent_id`, at any depth.
pub fn add_subtask<'a>(
    tree: &'a mut TaskTree,
    parent_id: &str,
    text: &str,
    now: DateTime<Utc>,
) -> Result<&'a Task, TaskError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(TaskError::EmptyText);
    }
    let id = generate_id(tree);
    let parent = find_task_mut(tree, parent_id)
        .ok_or_else(|| TaskError::NotFound(parent_id.to_string()))?;

    let idx = parent.subtasks.len();
    parent.subtasks.push(Task::new(id, text.to_string(), now));
    Ok(&parent.subtasks[idx])
}

/// Remove a task wherever it sits in the tree. Its subtree goes with it.
pub fn remove_task(tree: &mut TaskTree, task_id: &str) -> Result<Task, TaskError> {
    remove_from_list(&mut tree.tasks, task_id).ok_or_else(|| TaskError::NotFound(task_id.to_string()))
}

/// Merge `patch` into the task, field by field. Unset fields are untouched.
pub fn update_task(tree: &mut TaskTree, task_id: &str, patch: TaskPatch) -> Result<(), TaskError> {
    if let Some(text) = &patch.text
        && text.trim().is_empty()
    {
        return Err(TaskError::EmptyText);
    }
    let task = find_task_mut(tree, task_id).ok_or_else(|| TaskError::NotFound(task_id.to_string()))?;
    apply_patch(task, patch);
    Ok(())
}

fn apply_patch(task: &mut Task, patch: TaskPatch) {
    if let Some(text) = patch.text {
        task.text = text.trim().to_string();
    }
    if let Some(priority) = patch.priority {
        task.priority = priority;
    }
    if let Some(due) = patch.due_date {
        task.due_date = due;
    }
    if let Some(notes) = patch.notes {
        task.notes = notes;
    }
    if let Some(tags) = patch.tags {
        task.tags = clean_tags(tags);
    }
    if let Some(progress) = patch.progress {
        task.progress = progress.min(100);
    }
    if let Some(archived) = patch.archived {
        task.archived = archived;
    }
    if let Some(repeat) = patch.repeat_type {
        task.repeat_type = repeat;
    }
    if let Some(until) = patch.repeat_until {
        task.repeat_until = until;
    }
}

/// Flip the archived flag. Children and completion are left alone.
/// Returns the new value.
pub fn toggle_archived(tree: &mut TaskTree, task_id: &str) -> Result<bool, TaskError> {
    let task = find_task_mut(tree, task_id).ok_or_else(|| TaskError::NotFound(task_id.to_string()))?;
    task.archived = !task.archived;
    Ok(task.archived)
}

/// Remove every completed task, at any depth, together with its subtree.
/// Returns how many completed tasks were removed directly (their
/// descendants are not counted separately).
pub fn clear_completed(tree: &mut TaskTree) -> usize {
    retain_incomplete(&mut tree.tasks)
}

fn retain_incomplete(tasks: &mut Vec<Task>) -> usize {
    let before = tasks.len();
    tasks.retain(|t| !t.completed);
    let mut removed = before - tasks.len();
    for task in tasks.iter_mut() {
        removed += retain_incomplete(&mut task.subtasks);
    }
    removed
}

// ---------------------------------------------------------------------------
// Traversal
// ---------------------------------------------------------------------------

/// Find a task by ID anywhere in the tree (depth-first, parents first).
pub fn find_task<'a>(tree: &'a TaskTree, task_id: &str) -> Option<&'a Task> {
    find_task_in_list(&tree.tasks, task_id)
}

/// Find a task by ID anywhere in the tree, return mutable ref.
pub fn find_task_mut<'a>(tree: &'a mut TaskTree, task_id: &str) -> Option<&'a mut Task> {
    find_task_mut_in_list(&mut tree.tasks, task_id)
}

fn find_task_in_list<'a>(tasks: &'a [Task], task_id: &str) -> Option<&'a Task> {
    for task in tasks {
        if task.id == task_id {
            return Some(task);
        }
        if let Some(t) = find_task_in_list(&task.subtasks, task_id) {
            return Some(t);
        }
    }
    None
}

fn find_task_mut_in_list<'a>(tasks: &'a mut [Task], task_id: &str) -> Option<&'a mut Task> {
    for task in tasks.iter_mut() {
        if task.id == task_id {
            return Some(task);
        }
        if let Some(t) = find_task_mut_in_list(&mut task.subtasks, task_id) {
            return Some(t);
        }
    }
    None
}

fn remove_from_list(tasks: &mut Vec<Task>, task_id: &str) -> Option<Task> {
    if let Some(idx) = tasks.iter().position(|t| t.id == task_id) {
        return Some(tasks.remove(idx));
    }
    for task in tasks.iter_mut() {
        if let Some(t) = remove_from_list(&mut task.subtasks, task_id) {
            return Some(t);
        }
    }
    None
}

/// Pre-order view of the whole tree: each task followed by its subtasks.
pub fn flatten(tree: &TaskTree) -> Vec<&Task> {
    flatten_tasks(&tree.tasks)
}

pub fn flatten_tasks(tasks: &[Task]) -> Vec<&Task> {
    let mut out = Vec::new();
    collect_preorder(tasks, &mut out);
    out
}

fn collect_preorder<'a>(tasks: &'a [Task], out: &mut Vec<&'a Task>) {
    for task in tasks {
        out.push(task);
        collect_preorder(&task.subtasks, out);
    }
}

/// Iterate over all tasks (including subtasks) in pre-order.
pub fn for_each_task(tasks: &[Task], f: &mut dyn FnMut(&Task)) {
    for task in tasks {
        f(task);
        for_each_task(&task.subtasks, f);
    }
}

/// Resolve a full ID or a unique ID prefix to the full ID.
pub fn resolve_id(tree: &TaskTree, prefix: &str) -> Result<String, TaskError> {
    if find_task(tree, prefix).is_some() {
        return Ok(prefix.to_string());
    }
    let mut matches = Vec::new();
    for_each_task(&tree.tasks, &mut |task: &Task| {
        if !prefix.is_empty() && task.id.starts_with(prefix) {
            matches.push(task.id.clone());
        }
    });
    match matches.len() {
        0 => Err(TaskError::NotFound(prefix.to_string())),
        1 => Ok(matches.remove(0)),
        _ => Err(TaskError::AmbiguousId(prefix.to_string())),
    }
}

/// First ID that appears more than once across the given trees.
pub fn find_duplicate_id(tasks: &[Task]) -> Option<String> {
    let mut seen = HashSet::new();
    let mut duplicate = None;
    for_each_task(tasks, &mut |task: &Task| {
        if duplicate.is_none() && !seen.insert(task.id.clone()) {
            duplicate = Some(task.id.clone());
        }
    });
    duplicate
}

/// Generate an ID not yet used anywhere in the tree.
pub(crate) fn generate_id(tree: &TaskTree) -> String {
    loop {
        let id = Uuid::new_v4().simple().to_string();
        if find_task(tree, &id).is_none() {
            return id;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
