//! Farmed-session persistence.
//!
//! Sessions are farmed out-of-band (a human logs into the provider once and
//! exports the cookies); this module owns the JSON cookie files the executors
//! load before driving a browser step, and writes back refreshed cookies
//! afterwards.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::BrowserError;

/// One browser cookie from a farmed session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default = "default_path")]
    pub path: String,
}

fn default_path() -> String {
    "/".to_string()
}

impl SessionCookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: None,
            path: default_path(),
        }
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }
}

/// Directory of per-provider cookie files (`<provider>_cookies.json`).
pub struct SessionStore {
    dir: PathBuf,
}

impl SessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn file_for(&self, provider: &str) -> PathBuf {
        self.dir.join(format!("{provider}_cookies.json"))
    }

    /// Load the farmed session for a provider.
    ///
    /// A missing or unreadable file yields an empty session — the caller
    /// decides whether that is fatal for its flow.
    pub async fn load(&self, provider: &str) -> Vec<SessionCookie> {
        let path = self.file_for(provider);
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read session file");
                return Vec::new();
            }
        };

        match serde_json::from_str::<Vec<SessionCookie>>(&raw) {
            Ok(cookies) => {
                debug!(provider, count = cookies.len(), "Loaded session cookies");
                cookies
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Invalid session file");
                Vec::new()
            }
        }
    }

    /// Persist a (refreshed) session for a provider.
    pub async fn save(
        &self,
        provider: &str,
        cookies: &[SessionCookie],
    ) -> Result<(), BrowserError> {
        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            BrowserError::SessionFile(format!("Failed to create session directory: {e}"))
        })?;

        let path = self.file_for(provider);
        let raw = serde_json::to_string_pretty(cookies)
            .map_err(|e| BrowserError::SessionFile(format!("Failed to encode session: {e}")))?;
        tokio::fs::write(&path, raw).await.map_err(|e| {
            BrowserError::SessionFile(format!("Failed to write {}: {e}", path.display()))
        })?;

        debug!(provider, count = cookies.len(), "Saved session cookies");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path());

        let cookies = vec![
            SessionCookie::new("sid", "abc123").with_domain(".example.com"),
            SessionCookie::new("csrf", "tok"),
        ];
        store.save("uber", &cookies).await.unwrap();

        let loaded = store.load("uber").await;
        assert_eq!(loaded, cookies);
    }

    #[tokio::test]
    async fn missing_file_is_empty_session() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        assert!(store.load("uber").await.is_empty());
    }

    #[tokio::test]
    async fn corrupt_file_is_empty_session() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("uber_cookies.json"), "not json")
            .await
            .unwrap();
        let store = SessionStore::new(dir.path());
        assert!(store.load("uber").await.is_empty());
    }

    #[test]
    fn cookie_defaults() {
        let cookie: SessionCookie = serde_json::from_str(r#"{"name":"a","value":"b"}"#).unwrap();
        assert_eq!(cookie.path, "/");
        assert!(cookie.domain.is_none());
    }
}
