use chrono::{DateTime, Local, Utc};
use serde::Serialize;

use crate::io::sync::SyncStatus;
use crate::model::task::{Priority, RepeatType, Task};
use crate::ops::filter::{is_due_soon, is_overdue};
use crate::ops::stats::TaskStats;
use crate::util::markup::strip_markup;
use crate::util::width::{pad_to_width, truncate_to_width};

/// Widest task text shown on a list line
const MAX_TEXT_CELLS: usize = 60;

/// Shown ID prefix length; any unique prefix is accepted back
pub const SHORT_ID_LEN: usize = 8;

// ---------------------------------------------------------------------------
// JSON output structs
// ---------------------------------------------------------------------------

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskJson {
    pub id: String,
    pub text: String,
    pub completed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub priority: Priority,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub notes: String,
    pub tags: Vec<String>,
    pub progress: u8,
    pub archived: bool,
    pub overdue: bool,
    pub due_soon: bool,
    #[serde(skip_serializing_if = "is_no_repeat")]
    pub repeat_type: RepeatType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repeat_until: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub subtasks: Vec<TaskJson>,
}

fn is_no_repeat(r: &RepeatType) -> bool {
    !r.is_repeating()
}

#[derive(Serialize)]
pub struct StatsJson {
    #[serde(flatten)]
    pub stats: TaskStats,
    pub sync: String,
}

#[derive(Serialize)]
pub struct MutationJson {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archived: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spawned: Option<String>,
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

pub fn task_to_json(task: &Task, now: DateTime<Utc>) -> TaskJson {
    TaskJson {
        id: task.id.clone(),
        text: task.text.clone(),
        completed: task.completed,
        completed_at: task.completed_at,
        priority: task.priority,
        due_date: task.due_date,
        created_at: task.created_at,
        notes: task.notes.clone(),
        tags: task.tags.clone(),
        progress: task.progress,
        archived: task.archived,
        overdue: is_overdue(task, now),
        due_soon: is_due_soon(task, now),
        repeat_type: task.repeat_type,
        repeat_until: task.repeat_until,
        subtasks: task.subtasks.iter().map(|t| task_to_json(t, now)).collect(),
    }
}

pub fn stats_to_json(stats: TaskStats, sync: &SyncStatus) -> StatsJson {
    StatsJson {
        stats,
        sync: sync.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Human-readable formatting
// ---------------------------------------------------------------------------

pub fn short_id(id: &str) -> &str {
    id.get(..SHORT_ID_LEN).unwrap_or(id)
}

fn priority_marker(priority: Priority) -> &'static str {
    match priority {
        Priority::Urgent => "!!!",
        Priority::High => "!! ",
        Priority::Medium => "!  ",
        Priority::Low => "   ",
    }
}

pub fn format_date(t: DateTime<Utc>) -> String {
    t.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

/// Format a single task as a one-line summary
pub fn format_task_line(task: &Task, now: DateTime<Utc>) -> String {
    let check = if task.completed { 'x' } else { ' ' };
    let mut line = format!(
        "[{}] {} {} {}",
        check,
        short_id(&task.id),
        priority_marker(task.priority),
        truncate_to_width(&task.text, MAX_TEXT_CELLS)
    );

    if let Some(due) = task.due_date {
        let flag = if is_overdue(task, now) {
            " OVERDUE"
        } else if is_due_soon(task, now) {
            " soon"
        } else {
            ""
        };
        line.push_str(&format!("  due {}{}", format_date(due), flag));
    }
    if task.repeat_type.is_repeating() {
        line.push_str(&format!("  ({})", task.repeat_type));
    }
    if task.progress > 0 && !task.completed {
        line.push_str(&format!("  {}%", task.progress));
    }
    if !task.tags.is_empty() {
        let tags: Vec<String> = task.tags.iter().map(|t| format!("#{}", t)).collect();
        line.push_str(&format!("  {}", tags.join(" ")));
    }
    if task.archived {
        line.push_str("  [archived]");
    }
    line
}

/// Format a task with its subtasks, indented
pub fn format_task_tree(task: &Task, indent: usize, now: DateTime<Utc>) -> Vec<String> {
    let mut lines = Vec::new();
    let prefix = "  ".repeat(indent);
    lines.push(format!("{}{}", prefix, format_task_line(task, now)));

    for sub in &task.subtasks {
        lines.extend(format_task_tree(sub, indent + 1, now));
    }
    lines
}

/// Format detailed task view
pub fn format_task_detail(task: &Task, now: DateTime<Utc>) -> Vec<String> {
    let mut lines = Vec::new();

    let check = if task.completed { 'x' } else { ' ' };
    lines.push(format!("[{}] {}", check, task.text));
    lines.push(format!("id: {}", task.id));
    lines.push(format!("priority: {}", task.priority));
    lines.push(format!("created: {}", format_date(task.created_at)));
    if let Some(due) = task.due_date {
        let flag = if is_overdue(task, now) { " (overdue)" } else { "" };
        lines.push(format!("due: {}{}", format_date(due), flag));
    }
    if let Some(done) = task.completed_at {
        lines.push(format!("completed: {}", format_date(done)));
    }
    if task.repeat_type.is_repeating() {
        let until = task
            .repeat_until
            .map(|u| format!(" until {}", format_date(u)))
            .unwrap_or_default();
        lines.push(format!("repeat: {}{}", task.repeat_type, until));
    }
    lines.push(format!("progress: {}%", task.progress));
    if !task.tags.is_empty() {
        lines.push(format!("tags: {}", task.tags.join(", ")));
    }
    if task.archived {
        lines.push("archived: yes".to_string());
    }

    let notes = strip_markup(&task.notes);
    if !notes.is_empty() {
        lines.push("notes:".to_string());
        for line in notes.lines() {
            lines.push(format!("  {}", line));
        }
    }

    if !task.subtasks.is_empty() {
        lines.push(String::new());
        lines.push("subtasks:".to_string());
        for sub in &task.subtasks {
            lines.extend(format_task_tree(sub, 1, now));
        }
    }

    lines
}

pub fn format_stats(stats: &TaskStats, sync: &SyncStatus) -> Vec<String> {
    [
        ("total:", stats.total.to_string()),
        ("completed:", stats.completed.to_string()),
        ("overdue:", stats.overdue.to_string()),
        ("due soon:", stats.due_soon.to_string()),
        ("completion:", format!("{}%", stats.completion_rate)),
        ("sync:", sync.to_string()),
    ]
    .into_iter()
    .map(|(label, value)| format!("{}{}", pad_to_width(label, 12), value))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        "2025-05-10T12:00:00Z".parse().unwrap()
    }

    fn sample() -> Task {
        serde_json::from_str(
            r#"{"id": "0123456789abcdef", "text": "File taxes", "priority": "urgent",
                "createdAt": "2025-05-01T09:00:00Z", "tags": ["money", "admin"],
                "notes": "<p>forms in <b>drawer</b></p>",
                "subtasks": [{"id": "fedcba9876543210", "text": "Find receipts",
                              "createdAt": "2025-05-01T09:00:00Z", "completed": true,
                              "completedAt": "2025-05-02T09:00:00Z"}]}"#,
        )
        .unwrap()
    }

    #[test]
    fn test_format_task_line() {
        assert_eq!(
            format_task_line(&sample(), now()),
            "[ ] 01234567 !!! File taxes  #money #admin"
        );
    }

    #[test]
    fn test_format_task_tree_indents_subtasks() {
        let lines = format_task_tree(&sample(), 0, now());
        assert_eq!(lines.len(), 2);
        assert!(lines[1].starts_with("  [x] fedcba98"));
    }

    #[test]
    fn test_format_task_detail_strips_markup() {
        let lines = format_task_detail(&sample(), now());
        assert!(lines.contains(&"  forms in drawer".to_string()));
        assert!(lines.contains(&"tags: money, admin".to_string()));
        assert!(lines.contains(&"subtasks:".to_string()));
    }

    #[test]
    fn test_overdue_flag() {
        let mut task = sample();
        task.due_date = Some(now() - chrono::TimeDelta::hours(2));
        assert!(format_task_line(&task, now()).contains("OVERDUE"));
        assert!(task_to_json(&task, now()).overdue);
    }

    #[test]
    fn test_task_json_shape() {
        let json = serde_json::to_value(task_to_json(&sample(), now())).unwrap();
        assert_eq!(json["priority"], "urgent");
        assert_eq!(json["subtasks"][0]["completed"], true);
        assert_eq!(json["createdAt"], "2025-05-01T09:00:00Z");
        assert_eq!(json["dueSoon"], false);
        assert!(json["subtasks"][0]["completedAt"].is_string());
        assert!(json.get("created_at").is_none());
        assert!(json.get("repeatType").is_none());
        assert!(json.get("dueDate").is_none());
    }

    #[test]
    fn test_format_stats() {
        let stats = TaskStats {
            total: 4,
            completed: 1,
            overdue: 0,
            due_soon: 2,
            completion_rate: 25,
        };
        let lines = format_stats(&stats, &SyncStatus::Offline);
        assert_eq!(lines[0], "total:      4");
        assert_eq!(lines[4], "completion: 25%");
        assert_eq!(lines[5], "sync:       offline");
    }

    #[test]
    fn test_short_id() {
        assert_eq!(short_id("abc"), "abc");
        assert_eq!(short_id("0123456789"), "01234567");
    }
}
