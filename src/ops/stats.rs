use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::model::task::Task;
use crate::ops::filter::{is_due_soon, is_overdue};
use crate::ops::task_ops::for_each_task;

/// Counts over the whole tree, subtasks included
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStats {
    pub total: usize,
    pub completed: usize,
    pub overdue: usize,
    pub due_soon: usize,
    /// Whole percent of completed tasks; 0 for an empty tree
    pub completion_rate: u32,
}

pub fn compute(tasks: &[Task], now: DateTime<Utc>) -> TaskStats {
    let mut stats = TaskStats::default();
    for_each_task(tasks, &mut |task: &Task| {
        stats.total += 1;
        if task.completed {
            stats.completed += 1;
        }
        if is_overdue(task, now) {
            stats.overdue += 1;
        }
        if is_due_soon(task, now) {
            stats.due_soon += 1;
        }
    });
    stats.completion_rate = completion_rate(stats.completed, stats.total);
    stats
}

fn completion_rate(completed: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    (100.0 * completed as f64 / total as f64).round() as u32
}
