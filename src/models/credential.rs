//! Credential records and the per-VU credential set

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::Path;
use tracing::{error, info};

/// Username/password pair used to log in
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub username: String,
    pub password: String,
}

impl Credential {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

// Keep passwords out of logs and panics.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Non-empty list of credentials that virtual users cycle through
#[derive(Clone, Debug)]
pub struct CredentialSet {
    users: Vec<Credential>,
    fallback: bool,
}

impl CredentialSet {
    /// Set holding only the given credential
    pub fn single(credential: Credential) -> Self {
        Self {
            users: vec![credential],
            fallback: true,
        }
    }

    /// Build from a list, falling back to `default` when the list is empty
    pub fn from_users(users: Vec<Credential>, default: Credential) -> Self {
        if users.is_empty() {
            Self::single(default)
        } else {
            Self {
                users,
                fallback: false,
            }
        }
    }

    /// Load the users file, falling back to `default` on any failure
    pub fn load_or_default(path: impl AsRef<Path>, default: Credential) -> Self {
        let path = path.as_ref();
        match load_users(path) {
            Ok(users) => {
                info!("Loaded {} user(s) from {}", users.len(), path.display());
                Self::from_users(users, default)
            }
            Err(e) => {
                error!("Failed to load {}: {:#}", path.display(), e);
                Self::single(default)
            }
        }
    }

    /// Credential for a 1-based virtual user id: index `(vu - 1) mod len`
    pub fn for_vu(&self, vu: u32) -> &Credential {
        let index = (vu.saturating_sub(1) as usize) % self.users.len();
        &self.users[index]
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    /// Whether the set is the single default credential
    pub fn is_fallback(&self) -> bool {
        self.fallback
    }

    pub fn iter(&self) -> impl Iterator<Item = &Credential> {
        self.users.iter()
    }
}

/// Read a JSON array of `{username, password}` records.
///
/// Records that are not objects, or whose `username` or `password` is not a
/// non-empty string, are dropped. Errors when the file is missing, is not a
/// JSON array, or holds no complete record.
pub fn load_users(path: &Path) -> Result<Vec<Credential>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read users file: {}", path.display()))?;

    let raw: Vec<Value> = serde_json::from_str(&content)
        .with_context(|| format!("Invalid users file: {}", path.display()))?;

    if raw.is_empty() {
        anyhow::bail!("Invalid or empty users file: {}", path.display());
    }

    let users: Vec<Credential> = raw.iter().filter_map(complete_record).collect();
    if users.is_empty() {
        anyhow::bail!(
            "No record with both username and password in {} ({} entries)",
            path.display(),
            raw.len()
        );
    }
    Ok(users)
}

fn complete_record(entry: &Value) -> Option<Credential> {
    Some(Credential::new(
        non_empty_str(entry, "username")?,
        non_empty_str(entry, "password")?,
    ))
}

fn non_empty_str<'a>(entry: &'a Value, key: &str) -> Option<&'a str> {
    entry
        .get(key)
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;
    use tokio_test::{assert_err, assert_ok};

    fn default_user() -> Credential {
        Credential::new("admin", "admin-pass")
    }

    fn users_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_vu_selection_cycles() {
        let set = CredentialSet::from_users(
            vec![
                Credential::new("u1", "p1"),
                Credential::new("u2", "p2"),
                Credential::new("u3", "p3"),
            ],
            default_user(),
        );

        assert_eq!(set.for_vu(1).username, "u1");
        assert_eq!(set.for_vu(2).username, "u2");
        assert_eq!(set.for_vu(3).username, "u3");
        assert_eq!(set.for_vu(4).username, "u1");
        assert_eq!(set.for_vu(8).username, "u2");
        assert!(!set.is_fallback());
    }

    #[test]
    fn test_vu_selection_is_deterministic() {
        let users: Vec<_> = (0..5)
            .map(|i| Credential::new(format!("u{i}"), "p"))
            .collect();
        let set = CredentialSet::from_users(users, default_user());

        for vu in 1..=20u32 {
            let expected = format!("u{}", (vu - 1) % 5);
            assert_eq!(set.for_vu(vu).username, expected);
            assert_eq!(set.for_vu(vu), set.for_vu(vu));
        }
    }

    #[test]
    fn test_load_valid_file() {
        let file = users_file(
            r#"[{"username":"u1","password":"p1"},{"username":"u2","password":"p2"}]"#,
        );
        let set = CredentialSet::load_or_default(file.path(), default_user());

        assert_eq!(set.len(), 2);
        assert_eq!(set.for_vu(2), &Credential::new("u2", "p2"));
    }

    #[test]
    fn test_incomplete_records_dropped() {
        let file = users_file(
            r#"[{"username":"u1"},{"username":"","password":"x"},{"username":"u3","password":"p3"}]"#,
        );
        let users = assert_ok!(load_users(file.path()));
        assert_eq!(users, vec![Credential::new("u3", "p3")]);
        assert_err!(load_users(users_file("[]").path()));
    }

    #[test]
    fn test_missing_file_falls_back() {
        let set = CredentialSet::load_or_default("/nonexistent/users.json", default_user());
        assert_eq!(set.len(), 1);
        assert!(set.is_fallback());
        assert_eq!(set.for_vu(7), &default_user());
    }

    #[test]
    fn test_malformed_file_falls_back() {
        for content in ["not json", r#"{"username":"u1"}"#, "[]"] {
            let file = users_file(content);
            let set = CredentialSet::load_or_default(file.path(), default_user());
            assert_eq!(set.len(), 1, "content: {content}");
            assert!(set.is_fallback());
        }
    }

    #[test]
    fn test_all_records_incomplete_falls_back() {
        let file = users_file(r#"[{"username":"u1"},{"password":"p2"}]"#);
        let err = assert_err!(load_users(file.path()));
        assert!(err.to_string().contains("No record with both username and password"));

        let set = CredentialSet::load_or_default(file.path(), default_user());
        assert_eq!(set.len(), 1);
        assert!(set.is_fallback());
        assert_eq!(set.for_vu(1), &default_user());
    }

    #[test]
    fn test_mistyped_record_keeps_valid_users() {
        let file = users_file(
            r#"[{"username":"u1","password":"p1"},
                {"username":"u2","password":"p2"},
                {"username":"u3","password":123456},
                "u4",
                null]"#,
        );
        let set = CredentialSet::load_or_default(file.path(), default_user());

        assert_eq!(set.len(), 2);
        assert!(!set.is_fallback());
        assert_eq!(set.for_vu(1), &Credential::new("u1", "p1"));
        assert_eq!(set.for_vu(2), &Credential::new("u2", "p2"));
    }

    #[test]
    fn test_debug_hides_password() {
        let rendered = format!("{:?}", Credential::new("u1", "secret"));
        assert!(rendered.contains("u1"));
        assert!(!rendered.contains("secret"));
    }
}
