//! Recovery of in-progress source after an unexpected exit.
//!
//! One record lives under a fixed key in the state directory:
//! `{ "content": "...", "timestamp": "2026-10-19T08:00:00Z" }`.

use std::fs;
use std::io;
use std::path::PathBuf;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

pub const DRAFT_KEY: &str = "artifex-draft";

/// Drafts older than this are not offered for restore.
pub const DEFAULT_MAX_AGE: TimeDelta = TimeDelta::seconds(5);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draft {
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Draft {
    pub fn age(&self, now: DateTime<Utc>) -> TimeDelta {
        now.signed_duration_since(self.timestamp)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DraftError {
    #[error("failed to access draft at {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("draft at {} is not a valid record", path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// File-backed store for the draft record.
pub struct DraftStore {
    base_path: PathBuf,
    max_age: TimeDelta,
}

impl DraftStore {
    pub fn new(base_path: PathBuf) -> Self {
        Self {
            base_path,
            max_age: DEFAULT_MAX_AGE,
        }
    }

    pub fn with_max_age(mut self, max_age: TimeDelta) -> Self {
        self.max_age = max_age;
        self
    }

    pub fn path(&self) -> PathBuf {
        self.base_path.join(format!("{DRAFT_KEY}.json"))
    }

    fn io_error(&self, source: io::Error) -> DraftError {
        DraftError::Io {
            path: self.path(),
            source,
        }
    }

    pub fn save(&self, content: &str) -> Result<Draft, DraftError> {
        self.save_at(content, Utc::now())
    }

    pub fn save_at(&self, content: &str, timestamp: DateTime<Utc>) -> Result<Draft, DraftError> {
        let draft = Draft {
            content: content.to_string(),
            timestamp,
        };
        let json = serde_json::to_string(&draft).map_err(|source| DraftError::Corrupt {
            path: self.path(),
            source,
        })?;
        fs::create_dir_all(&self.base_path).map_err(|error| self.io_error(error))?;
        fs::write(self.path(), json).map_err(|error| self.io_error(error))?;
        log::debug!(target: "artifex::draft", "saved {} bytes to {}", content.len(), self.path().display());
        Ok(draft)
    }

    /// The stored draft regardless of age; `None` when nothing was saved.
    pub fn load(&self) -> Result<Option<Draft>, DraftError> {
        let text = match fs::read_to_string(self.path()) {
            Ok(text) => text,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(error) => return Err(self.io_error(error)),
        };
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|source| DraftError::Corrupt {
                path: self.path(),
                source,
            })
    }

    pub fn restore(&self) -> Result<Option<Draft>, DraftError> {
        self.restore_at(Utc::now())
    }

    /// The stored draft if it is no older than the threshold at `now`.
    pub fn restore_at(&self, now: DateTime<Utc>) -> Result<Option<Draft>, DraftError> {
        Ok(self.load()?.filter(|draft| {
            let fresh = draft.age(now) <= self.max_age;
            if !fresh {
                log::info!(
                    target: "artifex::draft",
                    "draft from {} is {}s old, not restoring",
                    draft.timestamp.to_rfc3339(),
                    draft.age(now).num_seconds()
                );
            }
            fresh
        }))
    }

    /// Removes the record; `false` when there was none.
    pub fn clear(&self) -> Result<bool, DraftError> {
        match fs::remove_file(self.path()) {
            Ok(()) => Ok(true),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(error) => Err(self.io_error(error)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(seconds: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + seconds, 0).unwrap()
    }

    #[test]
    fn record_layout() {
        let dir = tempfile::tempdir().unwrap();
        let store = DraftStore::new(dir.path().join("state"));
        store.save_at("export default 1;", at(0)).unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(dir.path().join("state/artifex-draft.json")).unwrap())
                .unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "content": "export default 1;", "timestamp": "2023-11-14T22:13:20Z" })
        );
    }

    #[test]
    fn fresh_drafts_restore() {
        let dir = tempfile::tempdir().unwrap();
        let store = DraftStore::new(dir.path().to_path_buf());
        store.save_at("draft", at(0)).unwrap();
        assert_eq!(store.restore_at(at(5)).unwrap().map(|draft| draft.content), Some("draft".into()));
        assert_eq!(store.restore_at(at(6)).unwrap(), None);
        assert!(store.load().unwrap().is_some());
    }

    #[test]
    fn max_age_is_configurable() {
        let dir = tempfile::tempdir().unwrap();
        let store = DraftStore::new(dir.path().to_path_buf()).with_max_age(TimeDelta::seconds(60));
        store.save_at("draft", at(0)).unwrap();
        assert!(store.restore_at(at(30)).unwrap().is_some());
    }

    #[test]
    fn missing_and_cleared_drafts() {
        let dir = tempfile::tempdir().unwrap();
        let store = DraftStore::new(dir.path().to_path_buf());
        assert_eq!(store.load().unwrap(), None);
        assert!(!store.clear().unwrap());
        store.save("x").unwrap();
        assert!(store.clear().unwrap());
        assert_eq!(store.restore().unwrap(), None);
    }

    #[test]
    fn corrupt_records_are_errors() {
        let dir = tempfile::tempdir().unwrap();
        let store = DraftStore::new(dir.path().to_path_buf());
        fs::write(store.path(), "{\"content\": 1}").unwrap();
        assert!(matches!(store.load(), Err(DraftError::Corrupt { .. })));
    }
}
