//! Durable bearer-token storage.
//!
//! The server transports session credentials as two opaque cookies; the
//! client persists them in `credentials.json` with restricted permissions
//! (0600) so a process restart recovers the session. Tokens are opaque and
//! never validated or logged in full.

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Cookie name of the short-lived access token.
pub const ACCESS_TOKEN: &str = "access_token";
/// Cookie name of the long-lived refresh token.
pub const REFRESH_TOKEN: &str = "refresh_token";

pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .ok()
        .and_then(|d| u64::try_from(d.as_millis()).ok())
        .unwrap_or(u64::MAX)
}

/// One stored token with optional expiry (milliseconds since epoch).
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredToken {
    value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires: Option<u64>,
}

impl StoredToken {
    fn is_expired(&self) -> bool {
        self.expires.is_some_and(|expires| now_millis() >= expires)
    }
}

/// File-backed credential store shared by every component of one client.
///
/// Cheap to clone; all clones observe the same tokens.
#[derive(Clone)]
pub struct CredentialStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    path: PathBuf,
    tokens: Mutex<HashMap<String, StoredToken>>,
}

impl CredentialStore {
    /// Opens the store at `path`, loading existing tokens if the file
    /// exists.
    pub fn open(path: PathBuf) -> Result<Self> {
        let tokens = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read credentials from {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse credentials from {}", path.display()))?
        } else {
            HashMap::new()
        };
        Ok(Self {
            inner: Arc::new(StoreInner {
                path,
                tokens: Mutex::new(tokens),
            }),
        })
    }

    /// Returns the named token, treating expired entries as absent.
    pub fn get(&self, name: &str) -> Option<String> {
        let tokens = self.inner.tokens.lock().expect("credential store poisoned");
        tokens
            .get(name)
            .filter(|token| !token.is_expired())
            .map(|token| token.value.clone())
    }

    /// Stores a token, replacing any previous value.
    ///
    /// `expires` is an absolute timestamp in milliseconds since epoch;
    /// `None` keeps the token until cleared.
    pub fn set(&self, name: &str, value: &str, expires: Option<u64>) -> Result<()> {
        let mut tokens = self.inner.tokens.lock().expect("credential store poisoned");
        tokens.insert(
            name.to_string(),
            StoredToken {
                value: value.to_string(),
                expires,
            },
        );
        self.persist(&tokens)
    }

    /// Removes the named token.
    pub fn clear(&self, name: &str) -> Result<()> {
        let mut tokens = self.inner.tokens.lock().expect("credential store poisoned");
        tokens.remove(name);
        self.persist(&tokens)
    }

    /// Removes every stored token (logout, blocked account).
    pub fn clear_all(&self) -> Result<()> {
        let mut tokens = self.inner.tokens.lock().expect("credential store poisoned");
        tokens.clear();
        self.persist(&tokens)
    }

    /// Saves the store with restricted permissions (0600).
    fn persist(&self, tokens: &HashMap<String, StoredToken>) -> Result<()> {
        let path = &self.inner.path;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let contents = serde_json::to_string_pretty(tokens).context("Failed to serialize credentials")?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            let mut file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .mode(0o600)
                .open(path)
                .with_context(|| format!("Failed to open {} for writing", path.display()))?;
            file.write_all(contents.as_bytes())
                .with_context(|| format!("Failed to write to {}", path.display()))?;
        }

        #[cfg(not(unix))]
        {
            fs::write(path, contents)
                .with_context(|| format!("Failed to write to {}", path.display()))?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(dir: &tempfile::TempDir) -> CredentialStore {
        CredentialStore::open(dir.path().join("credentials.json")).unwrap()
    }

    /// Test: set/get round-trip and clear.
    #[test]
    fn test_set_get_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        assert_eq!(store.get(ACCESS_TOKEN), None);
        store.set(ACCESS_TOKEN, "tok-a", None).unwrap();
        store.set(REFRESH_TOKEN, "tok-r", None).unwrap();
        assert_eq!(store.get(ACCESS_TOKEN).as_deref(), Some("tok-a"));

        store.clear(ACCESS_TOKEN).unwrap();
        assert_eq!(store.get(ACCESS_TOKEN), None);
        assert_eq!(store.get(REFRESH_TOKEN).as_deref(), Some("tok-r"));

        store.clear_all().unwrap();
        assert_eq!(store.get(REFRESH_TOKEN), None);
    }

    /// Test: tokens survive reopening the store (process restart).
    #[test]
    fn test_tokens_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        store_in(&dir).set(REFRESH_TOKEN, "persisted", None).unwrap();

        let reopened = store_in(&dir);
        assert_eq!(reopened.get(REFRESH_TOKEN).as_deref(), Some("persisted"));
    }

    /// Test: expired entries read as absent.
    #[test]
    fn test_expired_token_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        store
            .set(ACCESS_TOKEN, "old", Some(now_millis() - 1_000))
            .unwrap();
        assert_eq!(store.get(ACCESS_TOKEN), None);

        store
            .set(ACCESS_TOKEN, "fresh", Some(now_millis() + 60_000))
            .unwrap();
        assert_eq!(store.get(ACCESS_TOKEN).as_deref(), Some("fresh"));
    }

    /// Test: clones share state.
    #[test]
    fn test_clones_share_state() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let clone = store.clone();

        store.set(ACCESS_TOKEN, "shared", None).unwrap();
        assert_eq!(clone.get(ACCESS_TOKEN).as_deref(), Some("shared"));
    }
}
