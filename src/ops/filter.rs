use std::cmp::Ordering;

use chrono::{DateTime, Utc};

use crate::model::task::{Priority, Task};

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

/// Tasks due within this many days (and not yet overdue) are "due soon"
pub const DUE_SOON_DAYS: i64 = 3;

/// Status filter of the list view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Completed,
    Pending,
    Overdue,
    DueSoon,
}

impl StatusFilter {
    /// Parse the filter names used by the UI (`""` is "all").
    pub fn parse_status(s: &str) -> Option<StatusFilter> {
        match s.trim() {
            "" | "all" => Some(StatusFilter::All),
            "completed" => Some(StatusFilter::Completed),
            "pending" => Some(StatusFilter::Pending),
            "overdue" => Some(StatusFilter::Overdue),
            "due-soon" => Some(StatusFilter::DueSoon),
            _ => None,
        }
    }
}

/// View criteria for the top-level list
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterCriteria {
    /// Case-insensitive substring of text, notes or a tag; empty matches all
    pub search: String,
    pub status: StatusFilter,
    /// `None` matches every priority
    pub priority: Option<Priority>,
}

/// Not completed and due strictly before `now`.
pub fn is_overdue(task: &Task, now: DateTime<Utc>) -> bool {
    !task.completed && task.due_date.is_some_and(|due| due < now)
}

/// Not completed and due within the next [`DUE_SOON_DAYS`] days, counting
/// partial days as whole ones.
pub fn is_due_soon(task: &Task, now: DateTime<Utc>) -> bool {
    if task.completed {
        return false;
    }
    let Some(due) = task.due_date else {
        return false;
    };
    let days = ceil_days((due - now).num_milliseconds());
    days > 0 && days <= DUE_SOON_DAYS
}

fn ceil_days(ms: i64) -> i64 {
    ms.div_euclid(DAY_MS) + i64::from(ms.rem_euclid(DAY_MS) != 0)
}

fn matches_search(task: &Task, needle: &str) -> bool {
    needle.is_empty()
        || task.text.to_lowercase().contains(needle)
        || task.notes.to_lowercase().contains(needle)
        || task.tags.iter().any(|tag| tag.to_lowercase().contains(needle))
}

fn matches_status(task: &Task, status: StatusFilter, now: DateTime<Utc>) -> bool {
    match status {
        StatusFilter::All => true,
        StatusFilter::Completed => task.completed,
        StatusFilter::Pending => !task.completed,
        StatusFilter::Overdue => is_overdue(task, now),
        StatusFilter::DueSoon => is_due_soon(task, now),
    }
}

/// Whether a top-level task passes every predicate of `criteria`.
pub fn matches(task: &Task, criteria: &FilterCriteria, now: DateTime<Utc>) -> bool {
    let needle = criteria.search.to_lowercase();
    matches_search(task, &needle)
        && matches_status(task, criteria.status, now)
        && criteria.priority.is_none_or(|p| task.priority == p)
}

/// Display order: incomplete first, then priority, then earliest due date
/// (dated before undated), then newest first.
pub fn compare_tasks(a: &Task, b: &Task) -> Ordering {
    a.completed
        .cmp(&b.completed)
        .then_with(|| a.priority.rank().cmp(&b.priority.rank()))
        .then_with(|| match (a.due_date, b.due_date) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| b.created_at.cmp(&a.created_at))
}

/// Filter the top-level tasks and sort them for display. Subtasks travel
/// with their parent and are not filtered on their own.
pub fn filtered_sorted_view<'a>(
    tasks: &'a [Task],
    criteria: &FilterCriteria,
    now: DateTime<Utc>,
) -> Vec<&'a Task> {
    let mut view: Vec<&Task> = tasks.iter().filter(|t| matches(t, criteria, now)).collect();
    view.sort_by(|a, b| compare_tasks(a, b));
    view
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    fn now() -> DateTime<Utc> {
        "2025-05-10T12:00:00Z".parse().unwrap()
    }

    fn task(id: &str, priority: Priority) -> Task {
        let mut t = Task::new(id.into(), format!("Task {}", id), "2025-05-01T00:00:00Z".parse().unwrap());
        t.priority = priority;
        t
    }

    fn ids(view: &[&Task]) -> Vec<String> {
        view.iter().map(|t| t.id.clone()).collect()
    }

    #[test]
    fn test_sort_by_priority() {
        let tasks = vec![
            task("a", Priority::Low),
            task("b", Priority::Urgent),
            task("c", Priority::Medium),
        ];
        let view = filtered_sorted_view(&tasks, &FilterCriteria::default(), now());
        assert_eq!(ids(&view), vec!["b", "c", "a"]);
    }

    #[test]
    fn test_incomplete_before_completed() {
        let mut done = task("done", Priority::Urgent);
        done.completed = true;
        let tasks = vec![done, task("open", Priority::Low)];
        let view = filtered_sorted_view(&tasks, &FilterCriteria::default(), now());
        assert_eq!(ids(&view), vec!["open", "done"]);
    }

    #[test]
    fn test_due_dates_sort_before_undated() {
        let mut late = task("late", Priority::High);
        late.due_date = Some(now() + TimeDelta::days(5));
        let mut soon = task("soon", Priority::High);
        soon.due_date = Some(now() + TimeDelta::days(1));
        let tasks = vec![task("none", Priority::High), late, soon];
        let view = filtered_sorted_view(&tasks, &FilterCriteria::default(), now());
        assert_eq!(ids(&view), vec!["soon", "late", "none"]);
    }

    #[test]
    fn test_newest_first_tiebreak() {
        let mut older = task("older", Priority::Medium);
        older.created_at = now() - TimeDelta::days(3);
        let mut newer = task("newer", Priority::Medium);
        newer.created_at = now() - TimeDelta::days(1);
        let tasks = vec![older, newer];
        let view = filtered_sorted_view(&tasks, &FilterCriteria::default(), now());
        assert_eq!(ids(&view), vec!["newer", "older"]);
    }

    #[test]
    fn test_search_text_notes_and_tags_case_insensitive() {
        let mut a = task("a", Priority::Medium);
        a.text = "Buy MILK".into();
        let mut b = task("b", Priority::Medium);
        b.notes = "ask about milkshake".into();
        let mut c = task("c", Priority::Medium);
        c.tags = vec!["Milk-run".into()];
        let d = task("d", Priority::Medium);
        let tasks = vec![a, b, c, d];

        let criteria = FilterCriteria {
            search: "milk".into(),
            ..Default::default()
        };
        let mut found = ids(&filtered_sorted_view(&tasks, &criteria, now()));
        found.sort();
        assert_eq!(found, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_status_filters() {
        let mut overdue = task("overdue", Priority::Medium);
        overdue.due_date = Some(now() - TimeDelta::hours(1));
        let mut soon = task("soon", Priority::Medium);
        soon.due_date = Some(now() + TimeDelta::days(2));
        let mut later = task("later", Priority::Medium);
        later.due_date = Some(now() + TimeDelta::days(10));
        let mut done = task("done", Priority::Medium);
        done.completed = true;
        done.due_date = Some(now() - TimeDelta::days(1));
        let tasks = vec![overdue, soon, later, done];

        let run = |status| {
            let criteria = FilterCriteria {
                status,
                ..Default::default()
            };
            ids(&filtered_sorted_view(&tasks, &criteria, now()))
        };
        assert_eq!(run(StatusFilter::Overdue), vec!["overdue"]);
        assert_eq!(run(StatusFilter::DueSoon), vec!["soon"]);
        assert_eq!(run(StatusFilter::Completed), vec!["done"]);
        assert_eq!(run(StatusFilter::Pending).len(), 3);
        assert_eq!(run(StatusFilter::All).len(), 4);
    }

    #[test]
    fn test_due_soon_boundaries() {
        let mut t = task("t", Priority::Medium);
        t.due_date = Some(now() + TimeDelta::days(3));
        assert!(is_due_soon(&t, now()));
        t.due_date = Some(now() + TimeDelta::days(3) + TimeDelta::milliseconds(1));
        assert!(!is_due_soon(&t, now()));
        t.due_date = Some(now() + TimeDelta::milliseconds(1));
        assert!(is_due_soon(&t, now()));
        t.due_date = Some(now());
        assert!(!is_due_soon(&t, now()));
        assert!(!is_overdue(&t, now()));
    }

    #[test]
    fn test_priority_filter() {
        let tasks = vec![task("a", Priority::Low), task("b", Priority::High)];
        let criteria = FilterCriteria {
            priority: Some(Priority::High),
            ..Default::default()
        };
        assert_eq!(ids(&filtered_sorted_view(&tasks, &criteria, now())), vec!["b"]);
        assert!(matches(&tasks[1], &criteria, now()));
        assert!(!matches(&tasks[0], &criteria, now()));
    }

    #[test]
    fn test_parse_status() {
        assert_eq!(StatusFilter::parse_status(""), Some(StatusFilter::All));
        assert_eq!(StatusFilter::parse_status("due-soon"), Some(StatusFilter::DueSoon));
        assert_eq!(StatusFilter::parse_status("soonish"), None);
    }
}
