use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::dates;

/// How pressing a task is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Urgent,
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    pub const ALL: [Priority; 4] = [
        Priority::Urgent,
        Priority::High,
        Priority::Medium,
        Priority::Low,
    ];

    /// Sort rank, most pressing first
    pub fn rank(self) -> u8 {
        match self {
            Priority::Urgent => 0,
            Priority::High => 1,
            Priority::Medium => 2,
            Priority::Low => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Urgent => "urgent",
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }

    pub fn parse_priority(s: &str) -> Option<Priority> {
        match s.trim().to_lowercase().as_str() {
            "urgent" => Some(Priority::Urgent),
            "high" => Some(Priority::High),
            "medium" => Some(Priority::Medium),
            "low" => Some(Priority::Low),
            _ => None,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Missing/null → medium, unrecognised → low.
impl<'de> Deserialize<'de> for Priority {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(match raw {
            None => Priority::Medium,
            Some(s) => Priority::parse_priority(&s).unwrap_or(Priority::Low),
        })
    }
}

/// Recurrence cadence of a task series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatType {
    #[default]
    None,
    Daily,
    Weekly,
    Monthly,
}

impl RepeatType {
    pub fn as_str(self) -> &'static str {
        match self {
            RepeatType::None => "none",
            RepeatType::Daily => "daily",
            RepeatType::Weekly => "weekly",
            RepeatType::Monthly => "monthly",
        }
    }

    pub fn parse_repeat(s: &str) -> Option<RepeatType> {
        match s.trim().to_lowercase().as_str() {
            "none" | "" => Some(RepeatType::None),
            "daily" => Some(RepeatType::Daily),
            "weekly" => Some(RepeatType::Weekly),
            "monthly" => Some(RepeatType::Monthly),
            _ => None,
        }
    }

    pub fn is_repeating(self) -> bool {
        self != RepeatType::None
    }
}

impl fmt::Display for RepeatType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for RepeatType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw
            .as_deref()
            .and_then(RepeatType::parse_repeat)
            .unwrap_or(RepeatType::None))
    }
}

/// A task with its owned subtree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Opaque identifier, unique across the whole tree
    pub id: String,
    /// Display text, trimmed and non-empty
    pub text: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub completed: bool,
    /// Set exactly while `completed` is true
    #[serde(default, deserialize_with = "dates::deserialize_opt")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default, deserialize_with = "dates::deserialize_opt")]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default = "Utc::now", deserialize_with = "dates::deserialize_or_now")]
    pub created_at: DateTime<Utc>,
    /// Free text, may contain rich-text markup
    #[serde(default, deserialize_with = "null_as_default")]
    pub notes: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
    /// Percent complete, 0-100
    #[serde(default, deserialize_with = "deserialize_progress")]
    pub progress: u8,
    #[serde(default, deserialize_with = "null_as_default")]
    pub archived: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub subtasks: Vec<Task>,
    #[serde(default)]
    pub repeat_type: RepeatType,
    #[serde(default, deserialize_with = "dates::deserialize_opt")]
    pub repeat_until: Option<DateTime<Utc>>,
}

impl Task {
    /// A fresh, incomplete task with default fields
    pub fn new(id: String, text: String, now: DateTime<Utc>) -> Self {
        Task {
            id,
            text,
            completed: false,
            completed_at: None,
            priority: Priority::Medium,
            due_date: None,
            created_at: now,
            notes: String::new(),
            tags: Vec::new(),
            progress: 0,
            archived: false,
            subtasks: Vec::new(),
            repeat_type: RepeatType::None,
            repeat_until: None,
        }
    }

    /// Whether completing this task can produce a further occurrence
    pub fn is_recurrence_template(&self) -> bool {
        self.repeat_type.is_repeating() && self.due_date.is_some() && self.repeat_until.is_some()
    }
}

/// Field values for a new top-level task
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewTask {
    pub text: String,
    pub priority: Priority,
    pub due_date: Option<DateTime<Utc>>,
    pub notes: String,
    pub tags: Vec<String>,
    pub progress: u8,
    pub repeat_type: RepeatType,
    pub repeat_until: Option<DateTime<Utc>>,
}

impl NewTask {
    pub fn new(text: impl Into<String>) -> Self {
        NewTask {
            text: text.into(),
            ..Default::default()
        }
    }
}

/// A partial update. `None` leaves the field untouched; the doubly
/// optional date fields use `Some(None)` to clear.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskPatch {
    pub text: Option<String>,
    pub priority: Option<Priority>,
    pub due_date: Option<Option<DateTime<Utc>>>,
    pub notes: Option<String>,
    pub tags: Option<Vec<String>>,
    pub progress: Option<u8>,
    pub archived: Option<bool>,
    pub repeat_type: Option<RepeatType>,
    pub repeat_until: Option<Option<DateTime<Utc>>>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        *self == TaskPatch::default()
    }
}

/// Drop blank tags, trimming the rest. Duplicates are kept.
pub fn clean_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    tags.into_iter()
        .map(|t| t.as_ref().trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// Browser forms produced NaN (→ null) and the occasional float.
fn deserialize_progress<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u8, D::Error> {
    let raw = Option::<f64>::deserialize(deserializer)?;
    Ok(match raw {
        Some(v) if v.is_finite() => v.round().clamp(0.0, 100.0) as u8,
        _ => 0,
    })
}
