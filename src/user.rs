//! User namespaces.
//!
//! There is no authentication: a user is just a name, and everything that user
//! stores lives in files prefixed by the user's namespace. The namespace pairs a
//! readable slug with a short hash of the exact name, so "Bob Smith" and
//! "bob_smith" never share files. The exact name is kept under its own key so
//! discovery can list users as they typed themselves.

use std::collections::BTreeSet;
use std::fs::{self, File};
use std::path::Path;

use log::warn;
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// Minimum length of a user name after trimming.
pub const MIN_NAME_LEN: usize = 2;

/// Key holding the exact user name inside a namespace.
pub const KEY_USER_NAME: &str = "userName";

/// Check a user name typed at the prompt and return it trimmed.
pub fn validate_user_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.chars().count() < MIN_NAME_LEN {
        return Err(Error::Validation(format!(
            "User name must be at least {} characters",
            MIN_NAME_LEN
        )));
    }
    Ok(name.to_string())
}

/// Convert a display name to a readable slug for file naming.
/// Lowercases, keeps alphanumerics and collapses everything else to single
/// underscores. Not unique on its own; see [`user_namespace`].
pub fn sanitize_user_name(display_name: &str) -> String {
    display_name
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect::<String>()
        .split('_')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

/// File prefix for everything stored under `name`: `user_<slug>-<hash>_`.
/// The hash covers the exact trimmed name, so distinct names get distinct
/// prefixes even when their slugs collide.
pub fn user_namespace(name: &str) -> String {
    let name = name.trim();
    let mut hasher = Sha256::new();
    hasher.update(name.as_bytes());
    let hash = format!("{:x}", hasher.finalize());
    let short_hash = &hash[..12];

    let slug = sanitize_user_name(name);
    if slug.is_empty() {
        format!("user_{}_", short_hash)
    } else {
        format!("user_{}-{}_", slug, short_hash)
    }
}

/// Discover the exact names of all users with data in `data_dir`, sorted.
pub fn discover_users(data_dir: &Path) -> Result<Vec<String>> {
    let mut users = BTreeSet::new();

    if !data_dir.exists() {
        return Ok(Vec::new());
    }

    let suffix = format!("_{}.json", KEY_USER_NAME);
    for entry in fs::read_dir(data_dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let Some(file_name) = path.file_name().and_then(|s| s.to_str()) else {
            continue;
        };
        if !file_name.starts_with("user_") || !file_name.ends_with(&suffix) {
            continue;
        }
        match File::open(&path)
            .map_err(Error::from)
            .and_then(|f| serde_json::from_reader::<_, String>(f).map_err(Error::from))
        {
            Ok(name) => {
                users.insert(name);
            }
            Err(e) => warn!("Skipping unreadable user name in {}: {e}", path.display()),
        }
    }

    Ok(users.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_user_name() {
        assert_eq!(sanitize_user_name("Ada Lovelace"), "ada_lovelace");
        assert_eq!(sanitize_user_name("Test-User_123"), "test_user_123");
        assert_eq!(sanitize_user_name("Special!@#$%Characters"), "special_characters");
        assert_eq!(sanitize_user_name("  Multiple   Spaces  "), "multiple_spaces");
        assert_eq!(sanitize_user_name(""), "");
    }

    #[test]
    fn test_validate_user_name() {
        assert_eq!(validate_user_name("  Jo ").unwrap(), "Jo");
        assert!(matches!(validate_user_name("J"), Err(Error::Validation(_))));
        assert!(matches!(validate_user_name("   "), Err(Error::Validation(_))));
        assert_eq!(validate_user_name("!!").unwrap(), "!!");
    }

    #[test]
    fn test_user_namespace_separates_colliding_slugs() {
        let names = ["Bob Smith", "bob_smith", "BOB-SMITH", "Bob  Smith"];
        let namespaces: BTreeSet<String> = names.iter().map(|n| user_namespace(n)).collect();
        assert_eq!(namespaces.len(), names.len());
        for ns in &namespaces {
            assert!(ns.starts_with("user_bob_smith-"), "{}", ns);
        }
    }

    #[test]
    fn test_user_namespace_is_stable_and_trimmed() {
        assert_eq!(user_namespace("Ada"), user_namespace("  Ada "));
        assert_ne!(user_namespace("Ada"), user_namespace("ada"));
        let ns = user_namespace("!!");
        assert!(ns.starts_with("user_") && ns.ends_with('_'));
        assert_eq!(ns.len(), "user_".len() + 12 + 1);
    }

    #[test]
    fn test_discover_users() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["Ada Lovelace", "bob", "Bob"] {
            let path = dir.path().join(format!("{}{}.json", user_namespace(name), KEY_USER_NAME));
            fs::write(path, serde_json::to_string(name).unwrap()).unwrap();
        }
        fs::write(dir.path().join(format!("{}currentTasks.json", user_namespace("Ada Lovelace"))), "{}")
            .unwrap();
        fs::write(dir.path().join("lastUser.json"), "\"bob\"").unwrap();
        fs::write(dir.path().join("notes.txt"), "[]").unwrap();

        let users = discover_users(dir.path()).unwrap();
        assert_eq!(users, vec!["Ada Lovelace".to_string(), "Bob".to_string(), "bob".to_string()]);
    }

    #[test]
    fn test_discover_users_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(discover_users(&dir.path().join("nope")).unwrap().is_empty());
    }
}
