use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::storage::ensure_parent_dir;

pub const DEFAULT_SESSION_FILE: &str = "data/last_session.json";

/// Phiên chuẩn bị được mở gần nhất.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline_id: Option<String>,
    pub title: String,
    /// Epoch milliseconds when the session was tracked
    pub timestamp: i64,
    pub is_custom: bool,
    pub path: String,
}

/// Everything in [`SessionInfo`] except the time, which the tracker stamps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDraft {
    pub id: String,
    pub course_id: Option<String>,
    pub deadline_id: Option<String>,
    pub title: String,
    pub is_custom: bool,
    pub path: String,
}

/// Remembers the last accessed preparation session in a JSON file
#[derive(Debug, Clone)]
pub struct SessionTracker {
    path: PathBuf,
}

impl SessionTracker {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Store a newly accessed session, replacing the previous one
    pub fn track_session(&self, draft: SessionDraft) -> std::io::Result<SessionInfo> {
        let info = SessionInfo {
            id: draft.id,
            course_id: draft.course_id,
            deadline_id: draft.deadline_id,
            title: draft.title,
            timestamp: Utc::now().timestamp_millis(),
            is_custom: draft.is_custom,
            path: draft.path,
        };

        ensure_parent_dir(&self.path)?;
        let json = serde_json::to_string_pretty(&info)?;
        fs::write(&self.path, json)?;
        log::debug!("Tracked session {} ({})", info.id, info.path);
        Ok(info)
    }

    /// The most recent session, or `None` when nothing usable is stored
    pub fn last_session(&self) -> Option<SessionInfo> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return None,
            Err(err) => {
                log::warn!(
                    "Failed to read session file {}: {err}",
                    self.path.display()
                );
                return None;
            }
        };

        match serde_json::from_str::<SessionInfo>(&content) {
            Ok(info) => Some(info),
            Err(err) => {
                log::warn!(
                    "Failed to parse session file {}: {err}",
                    self.path.display()
                );
                None
            }
        }
    }

    pub fn clear_session(&self) -> std::io::Result<()> {
        match fs::remove_file(&self.path) {
            Err(err) if err.kind() != std::io::ErrorKind::NotFound => Err(err),
            _ => Ok(()),
        }
    }
}

impl Default for SessionTracker {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> SessionDraft {
        SessionDraft {
            id: "prep_1".to_string(),
            course_id: Some("1".to_string()),
            deadline_id: Some("prep_1".to_string()),
            title: "Preparation Session - Course 1".to_string(),
            is_custom: false,
            path: "/preparation/1/prep_1".to_string(),
        }
    }

    #[test]
    fn track_then_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = SessionTracker::new(dir.path().join("nested/last.json"));

        assert!(tracker.last_session().is_none());
        let stored = tracker.track_session(draft()).unwrap();
        assert!(stored.timestamp > 0);
        assert_eq!(tracker.last_session(), Some(stored));
    }

    #[test]
    fn stored_json_uses_camel_case_keys() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = SessionTracker::new(dir.path().join("last.json"));
        tracker.track_session(draft()).unwrap();

        let raw = fs::read_to_string(tracker.path()).unwrap();
        assert!(raw.contains("\"courseId\""));
        assert!(raw.contains("\"isCustom\": false"));
    }

    #[test]
    fn clear_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = SessionTracker::new(dir.path().join("last.json"));
        tracker.track_session(draft()).unwrap();

        tracker.clear_session().unwrap();
        assert!(tracker.last_session().is_none());
        tracker.clear_session().unwrap();
    }

    #[test]
    fn corrupt_file_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = SessionTracker::new(dir.path().join("last.json"));
        fs::write(tracker.path(), "{not json").unwrap();
        assert!(tracker.last_session().is_none());
    }
}
