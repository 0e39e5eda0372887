use std::fs;
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::storage::ensure_parent_dir;

pub const DEFAULT_CUSTOM_SESSIONS_FILE: &str = "data/custom_sessions.json";

/// A study session the student assembled by hand.
///
/// Only the fields this crate reads are typed; the rest of the record is kept
/// as-is so rewriting the file does not drop data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomSession {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_accessed: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// JSON array of custom sessions on disk
#[derive(Debug, Clone)]
pub struct CustomSessionStore {
    path: PathBuf,
}

impl CustomSessionStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All stored sessions; an unreadable file counts as empty.
    pub fn load(&self) -> Vec<CustomSession> {
        match fs::read_to_string(&self.path) {
            Ok(content) => match serde_json::from_str::<Vec<CustomSession>>(&content) {
                Ok(sessions) => sessions,
                Err(err) => {
                    log::warn!(
                        "Failed to parse custom sessions {}: {err}",
                        self.path.display()
                    );
                    Vec::new()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(err) => {
                log::warn!(
                    "Failed to read custom sessions {}: {err}",
                    self.path.display()
                );
                Vec::new()
            }
        }
    }

    pub fn save(&self, sessions: &[CustomSession]) -> std::io::Result<()> {
        ensure_parent_dir(&self.path)?;
        let json = serde_json::to_string_pretty(sessions)?;
        fs::write(&self.path, json)
    }

    pub fn find(&self, session_id: &str) -> Option<CustomSession> {
        self.load()
            .into_iter()
            .find(|session| session.id == session_id)
    }

    /// Stamp `lastAccessed` on a session and persist it. `Ok(None)` when no
    /// session has that id.
    pub fn touch(&self, session_id: &str) -> std::io::Result<Option<CustomSession>> {
        let mut sessions = self.load();
        let Some(session) = sessions.iter_mut().find(|session| session.id == session_id) else {
            return Ok(None);
        };

        session.last_accessed = Some(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true));
        let touched = session.clone();
        self.save(&sessions)?;
        Ok(Some(touched))
    }
}

impl Default for CustomSessionStore {
    fn default() -> Self {
        Self::new(DEFAULT_CUSTOM_SESSIONS_FILE)
    }
}
