use serde_json::Value;

use crate::model::task::{Task, clean_tags};
use crate::model::tree::TaskTree;
use crate::ops::task_ops::{find_duplicate_id, for_each_task};

/// Error type for import operations. Any error rejects the whole import.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("import is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("import must be a JSON array of tasks")]
    NotAnArray,
    #[error("record {index} is not a valid task: {source}")]
    InvalidRecord {
        index: usize,
        source: serde_json::Error,
    },
    #[error("record {index} has empty text")]
    EmptyText { index: usize },
    #[error("task id '{0}' appears more than once")]
    DuplicateId(String),
}

/// Result of an import operation
#[derive(Debug)]
pub struct ImportResult {
    /// Normalized top-level tasks, ready to replace the tree
    pub tasks: Vec<Task>,
    /// Total number of tasks (including subtasks)
    pub total_count: usize,
}

/// Parse and validate an import document: a JSON array of task records.
/// Nothing is mutated here, so a failed import leaves existing state alone.
pub fn parse_import(json: &str) -> Result<ImportResult, ImportError> {
    let value: Value = serde_json::from_str(json)?;
    let Value::Array(records) = value else {
        return Err(ImportError::NotAnArray);
    };

    let tasks = records
        .into_iter()
        .enumerate()
        .map(|(index, record)| {
            serde_json::from_value(record).map_err(|source| ImportError::InvalidRecord { index, source })
        })
        .collect::<Result<Vec<Task>, _>>()?;
    validate_tasks(tasks)
}

/// Normalize an already deserialized collection and check the tree
/// invariants: non-empty text everywhere and IDs unique across the tree.
/// Applied to imports, stored collections and remote snapshots alike.
pub fn validate_tasks(mut tasks: Vec<Task>) -> Result<ImportResult, ImportError> {
    for (index, task) in tasks.iter_mut().enumerate() {
        if !normalize(task) {
            return Err(ImportError::EmptyText { index });
        }
    }

    if let Some(id) = find_duplicate_id(&tasks) {
        return Err(ImportError::DuplicateId(id));
    }

    let mut total_count = 0;
    for_each_task(&tasks, &mut |_: &Task| total_count += 1);
    Ok(ImportResult { tasks, total_count })
}

/// Replace the whole tree with already validated tasks.
pub fn import_bulk(tree: &mut TaskTree, tasks: Vec<Task>) {
    tree.tasks = tasks;
}

// Trim text, drop blank tags and keep completion timestamps consistent.
// Returns false when the task (or a subtask) has no text.
fn normalize(task: &mut Task) -> bool {
    task.text = task.text.trim().to_string();
    if task.text.is_empty() {
        return false;
    }
    task.tags = clean_tags(&task.tags);
    if !task.completed {
        task.completed_at = None;
    }
    task.subtasks.iter_mut().all(normalize)
}
