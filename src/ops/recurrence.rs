//! Recurring task series.
//!
//! A completed task with a repeat cadence, a due date and a repeat-until
//! bound is the template of a series. Each occurrence is a separate
//! top-level task: a copy of the template with a fresh ID and creation
//! time, no subtasks, not completed, and the next due date.
//!
//! Date arithmetic follows the local wall clock, so a daily task due at
//! 09:00 stays at 09:00 across DST changes. Monthly steps use calendar
//! months and clamp to the end of shorter months: Jan 31 + 1 month is
//! Feb 29 (leap year) or Feb 28.

use chrono::{DateTime, Days, Local, Months, Utc};
use log::{debug, info};

use crate::model::task::{RepeatType, Task};
use crate::model::tree::TaskTree;
use crate::ops::task_ops::generate_id;

/// Window within which an existing task counts as the same occurrence
const MATCH_WINDOW_MS: i64 = 24 * 60 * 60 * 1000;

/// Next due date of a series. `None` returns the input unchanged.
pub fn next_due_date(current: DateTime<Utc>, repeat: RepeatType) -> DateTime<Utc> {
    let local = current.with_timezone(&Local);
    let next = match repeat {
        RepeatType::None => return current,
        RepeatType::Daily => local.checked_add_days(Days::new(1)),
        RepeatType::Weekly => local.checked_add_days(Days::new(7)),
        RepeatType::Monthly => local.checked_add_months(Months::new(1)),
    };
    match next {
        Some(dt) => dt.with_timezone(&Utc),
        // Landed in a DST gap; step in UTC instead.
        None => match repeat {
            RepeatType::Daily => current.checked_add_days(Days::new(1)),
            RepeatType::Weekly => current.checked_add_days(Days::new(7)),
            RepeatType::Monthly => current.checked_add_months(Months::new(1)),
            RepeatType::None => None,
        }
        .unwrap_or(current),
    }
}

/// Build an occurrence of `template` due at `due`.
pub fn occurrence_from(template: &Task, id: String, due: DateTime<Utc>, now: DateTime<Utc>) -> Task {
    Task {
        id,
        text: template.text.clone(),
        completed: false,
        completed_at: None,
        priority: template.priority,
        due_date: Some(due),
        created_at: now,
        notes: template.notes.clone(),
        tags: template.tags.clone(),
        progress: template.progress,
        archived: template.archived,
        subtasks: Vec::new(),
        repeat_type: template.repeat_type,
        repeat_until: template.repeat_until,
    }
}

/// Create the next occurrence after `task` was completed. Returns the new
/// task's ID, or `None` when the task is not a series or the series ended.
pub fn on_completion(tree: &mut TaskTree, task: &Task, now: DateTime<Utc>) -> Option<String> {
    if !task.completed || !task.repeat_type.is_repeating() {
        return None;
    }
    let (Some(due), Some(until)) = (task.due_date, task.repeat_until) else {
        return None;
    };

    let next = next_due_date(due, task.repeat_type);
    if next > until {
        debug!(
            "event=series_end id={} repeat={} until={}",
            task.id,
            task.repeat_type,
            until.to_rfc3339()
        );
        return None;
    }

    let id = generate_id(tree);
    tree.tasks.insert(0, occurrence_from(task, id.clone(), next, now));
    info!(
        "event=occurrence_created id={} from={} due={}",
        id,
        task.id,
        next.to_rfc3339()
    );
    Some(id)
}

/// Materialize occurrences that fell due while the app was not running.
///
/// For each completed series template, walks candidate dates from the one
/// after its due date up to `min(now, repeat_until)`. A candidate is skipped
/// when a top-level task with the same text is due within 24 hours of it;
/// occurrences created here are visible to later checks. Returns the IDs of
/// the created tasks.
pub fn backfill(tree: &mut TaskTree, now: DateTime<Utc>) -> Vec<String> {
    let templates: Vec<Task> = tree
        .tasks
        .iter()
        .filter(|t| t.completed && t.completed_at.is_some() && t.is_recurrence_template())
        .map(|t| Task {
            subtasks: Vec::new(),
            ..t.clone()
        })
        .collect();

    let mut created = Vec::new();
    for template in &templates {
        let (Some(due), Some(until)) = (template.due_date, template.repeat_until) else {
            continue;
        };

        let mut candidate = next_due_date(due, template.repeat_type);
        while candidate <= now && candidate <= until {
            if !has_occurrence(&tree.tasks, &template.text, candidate) {
                let id = generate_id(tree);
                tree.tasks
                    .insert(0, occurrence_from(template, id.clone(), candidate, now));
                info!(
                    "event=occurrence_backfilled id={} from={} due={}",
                    id,
                    template.id,
                    candidate.to_rfc3339()
                );
                created.push(id);
            }

            let next = next_due_date(candidate, template.repeat_type);
            if next <= candidate {
                break;
            }
            candidate = next;
        }
    }
    created
}

fn has_occurrence(tasks: &[Task], text: &str, due: DateTime<Utc>) -> bool {
    tasks.iter().any(|t| {
        t.text == text
            && t.due_date
                .is_some_and(|d| (d - due).num_milliseconds().abs() < MATCH_WINDOW_MS)
    })
}
