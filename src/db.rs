//! File-backed key-value storage and small formatting helpers.
//!
//! Each user gets a namespace of JSON files in the data directory, one per key:
//! `user_<slug>-<hash>_<key>.json`. Values are always written whole (never
//! patched), using a temp file and rename so a crash cannot leave a
//! half-written blob. A blob that no longer parses is moved aside to
//! `<file>.corrupt-<timestamp>` before anything can overwrite it.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use chrono::{Duration, Local, NaiveDate};
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;
use crate::user::user_namespace;

pub const KEY_TASKS: &str = "currentTasks";
pub const KEY_COMPLETED: &str = "completedTasks";
pub const KEY_LOGS: &str = "brainDumpLogs";
pub const KEY_TEMPLATES: &str = "brainstorm_templates";
pub const KEY_MODEL: &str = "selectedModel";
pub const KEY_LAST_UPDATED: &str = "lastUpdated";

const LAST_USER_FILE: &str = "lastUser.json";

/// The data directory shared by all users.
#[derive(Debug, Clone)]
pub struct Store {
    root: PathBuf,
}

impl Store {
    /// Open (and create if needed) the data directory.
    pub fn open(root: &Path) -> Result<Self> {
        fs::create_dir_all(root)?;
        Ok(Store { root: root.to_path_buf() })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The key namespace for one user.
    pub fn user(&self, name: &str) -> UserStore {
        UserStore {
            root: self.root.clone(),
            prefix: user_namespace(name),
        }
    }

    /// Name of the user who was active last, if remembered.
    pub fn last_user(&self) -> Option<String> {
        read_json(&self.root.join(LAST_USER_FILE))
    }

    pub fn set_last_user(&self, name: &str) -> Result<()> {
        write_json(&self.root.join(LAST_USER_FILE), &name)
    }

    pub fn clear_last_user(&self) -> Result<()> {
        remove_if_exists(&self.root.join(LAST_USER_FILE))
    }
}

/// One user's slice of the store.
#[derive(Debug, Clone)]
pub struct UserStore {
    root: PathBuf,
    prefix: String,
}

impl UserStore {
    pub fn path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}{}.json", self.prefix, key))
    }

    /// Read a value. Missing keys and unparseable blobs both yield `None`;
    /// an unparseable blob is first renamed aside so a later `set` cannot
    /// destroy it.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        read_json(&self.path(key))
    }

    /// Replace a value.
    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        write_json(&self.path(key), value)
    }

    pub fn remove(&self, key: &str) -> Result<()> {
        remove_if_exists(&self.path(key))
    }

    pub fn exists(&self, key: &str) -> bool {
        self.path(key).exists()
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Option<T> {
    if !path.exists() {
        return None;
    }
    let mut buf = String::new();
    match File::open(path).and_then(|mut f| f.read_to_string(&mut buf)) {
        Ok(_) => match serde_json::from_str(&buf) {
            Ok(value) => Some(value),
            Err(e) => {
                match quarantine(path) {
                    Ok(aside) => warn!(
                        "Error parsing {}: {e}; moved it to {}",
                        path.display(),
                        aside.display()
                    ),
                    Err(move_err) => warn!(
                        "Error parsing {}: {e}; could not move it aside: {move_err}",
                        path.display()
                    ),
                }
                None
            }
        },
        Err(e) => {
            warn!("Error reading {}, ignoring it: {e}", path.display());
            None
        }
    }
}

/// Rename an unparseable blob to `<file>.corrupt-<timestamp>`.
fn quarantine(path: &Path) -> Result<PathBuf> {
    let stamp = Local::now().format("%Y%m%d-%H%M%S%.3f");
    let mut aside = path.as_os_str().to_owned();
    aside.push(format!(".corrupt-{}", stamp));
    let aside = PathBuf::from(aside);
    fs::rename(path, &aside)?;
    Ok(aside)
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    let data = serde_json::to_string_pretty(value)?;
    let mut f = File::create(&tmp)?;
    f.write_all(data.as_bytes())?;
    f.flush()?;
    fs::rename(&tmp, path)?;
    debug!("wrote {}", path.display());
    Ok(())
}

fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Label a completion date relative to today ("Today", "Yesterday", or the
/// long form such as "Monday, March 4, 2024").
pub fn format_date_label(date: NaiveDate, today: NaiveDate) -> String {
    if date == today {
        "Today".into()
    } else if date == today - Duration::days(1) {
        "Yesterday".into()
    } else {
        date.format("%A, %B %-d, %Y").to_string()
    }
}

/// Today's local date, the reference for all relative labels.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Truncate a string to a maximum width, adding ellipsis if needed.
pub fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        s.to_string()
    } else {
        let mut out = String::new();
        for (i, ch) in s.chars().enumerate() {
            if i + 1 >= width {
                out.push('…');
                break;
            }
            out.push(ch);
        }
        out
    }
}

/// Mask an API key for display, keeping the first 8 and last 4 characters.
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 12 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..8].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_store_roundtrip_and_isolation() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        let alice = store.user("Alice");
        let bob = store.user("Bob");

        alice.set(KEY_MODEL, "openai/gpt-4o").unwrap();
        assert_eq!(alice.get::<String>(KEY_MODEL).as_deref(), Some("openai/gpt-4o"));
        assert_eq!(bob.get::<String>(KEY_MODEL), None);
        let file_name = alice.path(KEY_MODEL).file_name().unwrap().to_string_lossy().to_string();
        assert!(file_name.starts_with("user_alice-"), "{}", file_name);
        assert!(file_name.ends_with("_selectedModel.json"), "{}", file_name);

        alice.remove(KEY_MODEL).unwrap();
        assert!(!alice.exists(KEY_MODEL));
        // Removing twice is fine.
        alice.remove(KEY_MODEL).unwrap();
    }

    #[test]
    fn test_similar_names_do_not_share_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        store.user("Bob Smith").set(KEY_MODEL, "openai/gpt-4o").unwrap();
        for other in ["bob_smith", "BOB-SMITH", "Bob  Smith"] {
            assert_eq!(store.user(other).get::<String>(KEY_MODEL), None, "{}", other);
        }
        assert_eq!(
            store.user(" Bob Smith ").get::<String>(KEY_MODEL).as_deref(),
            Some("openai/gpt-4o")
        );
    }

    #[test]
    fn test_corrupt_blob_is_moved_aside() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        let user = store.user("carol");
        fs::write(user.path(KEY_TASKS), "{not json").unwrap();
        assert!(user.get::<serde_json::Value>(KEY_TASKS).is_none());
        assert!(!user.exists(KEY_TASKS));

        user.set(KEY_TASKS, &serde_json::json!({})).unwrap();
        let kept: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().path())
            .filter(|p| p.to_string_lossy().contains(".corrupt-"))
            .collect();
        assert_eq!(kept.len(), 1);
        assert_eq!(fs::read_to_string(&kept[0]).unwrap(), "{not json");
    }

    #[test]
    fn test_write_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        let user = store.user("dave");
        user.set(KEY_COMPLETED, &vec![1, 2, 3]).unwrap();
        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec![format!("{}completedTasks.json", user_namespace("dave"))]);
    }

    #[test]
    fn test_last_user() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        assert_eq!(store.last_user(), None);
        store.set_last_user("Erin").unwrap();
        assert_eq!(store.last_user().as_deref(), Some("Erin"));
        store.clear_last_user().unwrap();
        assert_eq!(store.last_user(), None);
    }

    #[test]
    fn test_format_date_label() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        assert_eq!(format_date_label(today, today), "Today");
        assert_eq!(format_date_label(today - Duration::days(1), today), "Yesterday");
        assert_eq!(
            format_date_label(NaiveDate::from_ymd_opt(2024, 3, 4).unwrap() - Duration::days(1), today),
            "Sunday, March 3, 2024"
        );
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghij", 5), "abcd…");
    }

    #[test]
    fn test_mask_secret() {
        assert_eq!(mask_secret("sk-or-v1-abcdefghijklmnop"), "sk-or-v1...mnop");
        assert_eq!(mask_secret("short"), "*****");
    }
}
