//! JSON exports and the read-only views over the completed log and brain-dump
//! history.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use log::info;

use crate::db::format_date_label;
use crate::error::{Error, Result};
use crate::fields::ExportKind;
use crate::session::Session;
use crate::task::{BrainDumpLog, CompletedRecord};
use crate::user::sanitize_user_name;

/// File name used when `--output` is not given. The user part is the
/// file-safe slug; the exact name is inside the templates bundle.
pub fn default_file_name(kind: ExportKind, user: &str, date: NaiveDate) -> String {
    let date = date.format("%Y-%m-%d");
    match kind {
        ExportKind::Completed => format!("completed-tasks-{}.json", date),
        ExportKind::History => format!("braindump-logs-{}.json", date),
        ExportKind::Templates => match sanitize_user_name(user) {
            slug if slug.is_empty() => format!("brainsort-templates-{}.json", date),
            slug => format!("brainsort-templates-{}-{}.json", slug, date),
        },
    }
}

/// Write one export as pretty JSON and return where it went.
pub fn write_export(session: &Session, kind: ExportKind, output: Option<&Path>, today: NaiveDate) -> Result<PathBuf> {
    let data = match kind {
        ExportKind::Completed => serde_json::to_string_pretty(session.completed())?,
        ExportKind::History => serde_json::to_string_pretty(session.logs())?,
        ExportKind::Templates => {
            if session.templates().is_empty() {
                return Err(Error::Validation(
                    "No templates to export! Create some templates first.".into(),
                ));
            }
            serde_json::to_string_pretty(&session.templates().bundle(session.user()))?
        }
    };

    let path = match output {
        Some(path) => path.to_path_buf(),
        None => PathBuf::from(default_file_name(kind, session.user(), today)),
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, data)?;
    info!("Exported {:?} to {}", kind, path.display());
    Ok(path)
}

/// Completed records grouped by completion date, newest date first and newest
/// record first within a date. Each group carries its display label.
pub fn group_completed(records: &[CompletedRecord], today: NaiveDate) -> Vec<(String, Vec<&CompletedRecord>)> {
    let mut by_date: BTreeMap<NaiveDate, Vec<&CompletedRecord>> = BTreeMap::new();
    for record in records {
        by_date.entry(record.completed_date).or_default().push(record);
    }
    by_date
        .into_iter()
        .rev()
        .map(|(date, mut group)| {
            group.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
            (format_date_label(date, today), group)
        })
        .collect()
}

/// Brain dumps newest first, optionally filtered by a case-insensitive search.
pub fn history<'a>(logs: &'a [BrainDumpLog], search: Option<&str>) -> Vec<&'a BrainDumpLog> {
    let search = search.map(str::trim).filter(|s| !s.is_empty());
    let mut list: Vec<&BrainDumpLog> = logs
        .iter()
        .filter(|l| search.map_or(true, |s| l.matches(s)))
        .collect();
    list.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    list
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::*;
    use crate::db::Store;
    use crate::fields::Quadrant;
    use crate::task::Categorization;

    fn record(id: u64, date: NaiveDate, secs: i64) -> CompletedRecord {
        let mut r = CompletedRecord::new(id, format!("task {}", id), Quadrant::Quickwins);
        r.completed_date = date;
        r.timestamp = Utc.timestamp_opt(secs, 0).unwrap();
        r
    }

    fn log(dump: &str, secs: i64) -> BrainDumpLog {
        BrainDumpLog {
            id: None,
            timestamp: Utc.timestamp_opt(secs, 0).unwrap(),
            brain_dump: dump.to_string(),
            categorized_tasks: Categorization {
                deepwork: vec![format!("{} deep", dump)],
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_default_file_names() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        assert_eq!(default_file_name(ExportKind::Completed, "Sam", date), "completed-tasks-2024-03-05.json");
        assert_eq!(default_file_name(ExportKind::History, "Sam", date), "braindump-logs-2024-03-05.json");
        assert_eq!(
            default_file_name(ExportKind::Templates, "Sam Lee", date),
            "brainsort-templates-sam_lee-2024-03-05.json"
        );
    }

    #[test]
    fn test_templates_file_name_is_a_single_path_component() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        let name = default_file_name(ExportKind::Templates, "../Sam/Lee", date);
        assert_eq!(name, "brainsort-templates-sam_lee-2024-03-05.json");
        assert_eq!(Path::new(&name).components().count(), 1);
        assert_eq!(
            default_file_name(ExportKind::Templates, "??", date),
            "brainsort-templates-2024-03-05.json"
        );
    }

    #[test]
    fn test_group_completed() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        let yesterday = today - Duration::days(1);
        let older = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        let records = vec![
            record(1, older, 10),
            record(2, yesterday, 20),
            record(3, today, 30),
            record(4, today, 40),
        ];
        let groups = group_completed(&records, today);
        let labels: Vec<_> = groups.iter().map(|(l, _)| l.as_str()).collect();
        assert_eq!(labels, vec!["Today", "Yesterday", "Thursday, February 29, 2024"]);
        let today_ids: Vec<_> = groups[0].1.iter().map(|r| r.id).collect();
        assert_eq!(today_ids, vec![4, 3]);
    }

    #[test]
    fn test_history_search_newest_first() {
        let logs = vec![log("taxes", 10), log("garden", 20), log("tax refund", 30)];
        let all = history(&logs, None);
        assert_eq!(all[0].brain_dump, "tax refund");
        let found: Vec<_> = history(&logs, Some("TAX")).iter().map(|l| l.brain_dump.clone()).collect();
        assert_eq!(found, vec!["tax refund", "taxes"]);
        assert_eq!(history(&logs, Some("garden deep")).len(), 1);
        assert_eq!(history(&logs, Some("  ")).len(), 3);
    }

    #[test]
    fn test_write_export() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(&dir.path().join("data")).unwrap();
        let mut session = Session::open(&store, "sam", "m/x").unwrap();
        session.add_task(Quadrant::Triggers, "ship it").unwrap();
        session.complete_task(Quadrant::Triggers, 0).unwrap();
        let today = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();

        let out = dir.path().join("out").join("done.json");
        let path = write_export(&session, ExportKind::Completed, Some(&out), today).unwrap();
        let value: serde_json::Value = serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(value[0]["task"], "ship it");
        assert_eq!(value[0]["quadrant"], "triggers");

        let templates = dir.path().join("t.json");
        assert!(matches!(
            write_export(&session, ExportKind::Templates, Some(&templates), today),
            Err(Error::Validation(_))
        ));
        session.create_template("Plan", "", "Plan {task}", vec![]).unwrap();
        write_export(&session, ExportKind::Templates, Some(&templates), today).unwrap();
        let bundle: serde_json::Value = serde_json::from_str(&fs::read_to_string(&templates).unwrap()).unwrap();
        assert_eq!(bundle["version"], "1.0");
        assert_eq!(bundle["user"], "sam");
        assert_eq!(bundle["templates"][0]["name"], "Plan");
    }
}
