use serde::{Deserialize, Serialize};

use super::task::Task;

/// The in-memory task collection: an ordered sequence of top-level tasks,
/// each owning its subtree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskTree {
    pub tasks: Vec<Task>,
}

impl TaskTree {
    pub fn new(tasks: Vec<Task>) -> Self {
        TaskTree { tasks }
    }

    /// Top-level tasks in display order
    pub fn top_level(&self) -> &[Task] {
        &self.tasks
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn into_tasks(self) -> Vec<Task> {
        self.tasks
    }
}
