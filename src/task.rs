//! Task data structures and their stored representations.
//!
//! This module defines the `Task` that lives on the board, the legacy
//! bare-string form older stores still contain, the completed-task record,
//! the brain-dump log entry and the categorization result returned by the
//! remote service. Field names follow the storage format, which predates this
//! crate, hence the explicit renames.

use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::fields::Quadrant;

/// A single item on the board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub text: String,
    /// The brain dump this task was extracted from, if any.
    #[serde(default, rename = "brainDumpId", alias = "sourceDumpId")]
    pub source_dump_id: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Task {
    /// Create a task with a fresh id.
    pub fn new(text: impl Into<String>, source_dump_id: Option<String>) -> Self {
        Task {
            id: new_task_id(),
            text: text.into(),
            source_dump_id,
            created_at: Utc::now(),
        }
    }
}

/// A task as found in storage: either the object form or a bare string.
///
/// Only the load path sees this; everything downstream works on [`Task`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TaskEntry {
    Legacy(String),
    Full(Task),
}

impl TaskEntry {
    pub fn is_legacy(&self) -> bool {
        matches!(self, TaskEntry::Legacy(_))
    }

    /// Normalise to the object form. Legacy strings get a fresh id.
    pub fn into_task(self) -> Task {
        match self {
            TaskEntry::Legacy(text) => Task::new(text, None),
            TaskEntry::Full(task) => task,
        }
    }
}

/// Archived record of a finished task. Independent of the board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedRecord {
    pub id: u64,
    #[serde(rename = "task", alias = "text")]
    pub text: String,
    pub quadrant: Quadrant,
    #[serde(rename = "date")]
    pub completed_date: NaiveDate,
    pub timestamp: DateTime<Utc>,
}

impl CompletedRecord {
    /// Build a record stamped with the current time and today's local date.
    pub fn new(id: u64, text: impl Into<String>, quadrant: Quadrant) -> Self {
        CompletedRecord {
            id,
            text: text.into(),
            quadrant,
            completed_date: Local::now().date_naive(),
            timestamp: Utc::now(),
        }
    }
}

/// The four string lists the categorization service returns. A missing or
/// `null` list reads as empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Categorization {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub triggers: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub marinate: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub deepwork: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub quickwins: Vec<String>,
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

impl Categorization {
    pub fn items(&self, quadrant: Quadrant) -> &[String] {
        match quadrant {
            Quadrant::Triggers => &self.triggers,
            Quadrant::Marinate => &self.marinate,
            Quadrant::Deepwork => &self.deepwork,
            Quadrant::Quickwins => &self.quickwins,
        }
    }

    pub fn total(&self) -> usize {
        Quadrant::ALL.iter().map(|q| self.items(*q).len()).sum()
    }
}

/// One brain-dump submission and what it was sorted into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrainDumpLog {
    /// Older stores have logs without ids; those are assigned on load.
    #[serde(default)]
    pub id: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub brain_dump: String,
    #[serde(default)]
    pub categorized_tasks: Categorization,
}

impl BrainDumpLog {
    /// True when the dump text or any categorized item contains `needle`
    /// (case-insensitive).
    pub fn matches(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        if self.brain_dump.to_lowercase().contains(&needle) {
            return true;
        }
        Quadrant::ALL.iter().any(|q| {
            self.categorized_tasks
                .items(*q)
                .iter()
                .any(|item| item.to_lowercase().contains(&needle))
        })
    }
}

pub fn new_task_id() -> String {
    format!("task_{}", Uuid::new_v4().simple())
}

pub fn new_dump_id() -> String {
    format!("dump_{}", Uuid::new_v4().simple())
}

pub fn new_template_id() -> String {
    format!("template_{}", Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_and_object_entries_share_text() {
        let entries: Vec<TaskEntry> = serde_json::from_str(
            r#"["foo", {"id":"task_1","text":"foo","brainDumpId":null,"createdAt":"2024-05-01T10:00:00Z"}]"#,
        )
        .unwrap();
        assert!(entries[0].is_legacy());
        assert!(!entries[1].is_legacy());
        let tasks: Vec<Task> = entries.into_iter().map(TaskEntry::into_task).collect();
        assert_eq!(tasks[0].text, tasks[1].text);
        assert_eq!(tasks[1].id, "task_1");
    }

    #[test]
    fn test_legacy_entry_normalises_with_fresh_id() {
        let task = TaskEntry::Legacy("call mum".into()).into_task();
        assert!(task.id.starts_with("task_"));
        assert_eq!(task.text, "call mum");
        assert_eq!(task.source_dump_id, None);
    }

    #[test]
    fn test_task_accepts_source_dump_id_alias() {
        let task: Task = serde_json::from_str(
            r#"{"id":"task_9","text":"x","sourceDumpId":"dump_3","createdAt":"2024-05-01T10:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(task.source_dump_id.as_deref(), Some("dump_3"));
        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["brainDumpId"], "dump_3");
    }

    #[test]
    fn test_completed_record_storage_names() {
        let rec = CompletedRecord::new(7, "ship it", Quadrant::Quickwins);
        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["task"], "ship it");
        assert_eq!(json["quadrant"], "quickwins");
        assert!(json["date"].as_str().unwrap().len() == 10);
    }

    #[test]
    fn test_categorization_defaults_missing_keys() {
        let cat: Categorization = serde_json::from_str(r#"{"triggers":["a"]}"#).unwrap();
        assert_eq!(cat.triggers, vec!["a"]);
        assert!(cat.deepwork.is_empty());
        assert_eq!(cat.total(), 1);
    }

    #[test]
    fn test_brain_dump_log_matches() {
        let log = BrainDumpLog {
            id: Some(new_dump_id()),
            timestamp: Utc::now(),
            brain_dump: "Need to renew passport".into(),
            categorized_tasks: Categorization {
                quickwins: vec!["Book dentist".into()],
                ..Default::default()
            },
        };
        assert!(log.matches("PASSPORT"));
        assert!(log.matches("dentist"));
        assert!(!log.matches("taxes"));
    }

    #[test]
    fn test_ids_are_unique_and_prefixed() {
        let a = new_task_id();
        let b = new_task_id();
        assert_ne!(a, b);
        assert!(new_dump_id().starts_with("dump_"));
        assert!(new_template_id().starts_with("template_"));
    }
}
