use std::fmt::Display;

use chrono::{DateTime, TimeZone, Utc};

use crate::model::task::Task;
use crate::ops::task_ops::flatten_tasks;

pub const CSV_HEADER: &str = "Text,Priority,Status,Created,Due Date,Progress,Tags,Notes";

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Render every task, subtasks included in pre-order, as CSV. Timestamps
/// are shown in `tz`.
pub fn export_csv<Tz>(tasks: &[Task], tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let mut out = String::from(CSV_HEADER);
    out.push('\n');
    for task in flatten_tasks(tasks) {
        let row = [
            quote(&task.text),
            task.priority.as_str().to_string(),
            if task.completed { "Completed" } else { "Pending" }.to_string(),
            format_time(task.created_at, tz),
            task.due_date.map(|d| format_time(d, tz)).unwrap_or_default(),
            format!("{}%", task.progress),
            quote(&task.tags.join(", ")),
            quote(&task.notes),
        ];
        out.push_str(&row.join(","));
        out.push('\n');
    }
    out
}

fn quote(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

fn format_time<Tz>(t: DateTime<Utc>, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    t.with_timezone(tz).format(DATE_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    fn fixture() -> Vec<Task> {
        serde_json::from_str(
            r#"[
  {"id": "a", "text": "He said \"hi\"", "priority": "high", "createdAt": "2025-05-01T09:30:00Z",
   "dueDate": "2025-05-03T17:00:00Z", "progress": 40, "tags": ["work", "call"],
   "notes": "ring back",
   "subtasks": [
     {"id": "a1", "text": "Find number", "createdAt": "2025-05-01T09:31:00Z", "completed": true,
      "completedAt": "2025-05-01T10:00:00Z"}
   ]},
  {"id": "b", "text": "Plain", "priority": "low", "createdAt": "2025-05-02T08:00:00Z"}
]"#,
        )
        .unwrap()
    }

    #[test]
    fn test_export_csv() {
        insta::assert_snapshot!(export_csv(&fixture(), &Utc), @r#"
        Text,Priority,Status,Created,Due Date,Progress,Tags,Notes
        "He said ""hi""",high,Pending,2025-05-01 09:30,2025-05-03 17:00,40%,"work, call","ring back"
        "Find number",medium,Completed,2025-05-01 09:31,,0%,"",""
        "Plain",low,Pending,2025-05-02 08:00,,0%,"",""
        "#);
    }

    #[test]
    fn test_export_uses_given_timezone() {
        let tz = FixedOffset::east_opt(2 * 3600).unwrap();
        let csv = export_csv(&fixture(), &tz);
        assert!(csv.contains("2025-05-01 11:30,2025-05-03 19:00"));
    }

    #[test]
    fn test_export_empty_has_header_only() {
        assert_eq!(export_csv(&[], &Utc), format!("{}\n", CSV_HEADER));
    }

    #[test]
    fn test_quotes_in_tags_and_notes_are_doubled() {
        let mut task = Task::new("x".into(), "t".into(), "2025-05-01T00:00:00Z".parse().unwrap());
        task.tags = vec!["say \"a\"".into()];
        task.notes = "\"quoted\"".into();
        let csv = export_csv(&[task], &Utc);
        assert!(csv.contains(r#""say ""a""",""""quoted""""#));
    }
}
