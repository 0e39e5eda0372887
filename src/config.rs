use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::session::custom::DEFAULT_CUSTOM_SESSIONS_FILE;
use crate::session::tracker::DEFAULT_SESSION_FILE;
use crate::storage::chat_db::DEFAULT_DB_PATH;
use crate::storage::ensure_parent_dir;

pub const DEFAULT_CONFIG_PATH: &str = "config/study_coach.json";

/// Overrides `database_path` when set (also read from `.env`).
pub const DATABASE_ENV_VAR: &str = "STUDY_COACH_DB";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database_path: String,
    pub session_file: String,
    pub custom_sessions_file: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: DEFAULT_DB_PATH.to_string(),
            session_file: DEFAULT_SESSION_FILE.to_string(),
            custom_sessions_file: DEFAULT_CUSTOM_SESSIONS_FILE.to_string(),
        }
    }
}

impl AppConfig {
    /// Apply environment overrides on top of the file values
    pub fn with_env(mut self) -> Self {
        if let Ok(path) = std::env::var(DATABASE_ENV_VAR) {
            if !path.is_empty() {
                log::debug!("Using database path {path} from {DATABASE_ENV_VAR}");
                self.database_path = path;
            }
        }
        self
    }
}

pub fn load_config(path: &str) -> AppConfig {
    let path = Path::new(path);
    match fs::read_to_string(path) {
        Ok(content) => match serde_json::from_str::<AppConfig>(&content) {
            Ok(config) => config,
            Err(err) => {
                log::warn!("Failed to parse config file {}: {err}", path.display());
                AppConfig::default()
            }
        },
        Err(err) => {
            log::info!(
                "Config file {} not found ({err}); using defaults",
                path.display()
            );
            AppConfig::default()
        }
    }
}

pub fn save_config(path: &str, config: &AppConfig) -> std::io::Result<()> {
    ensure_parent_dir(path)?;
    let json = serde_json::to_string_pretty(config)?;
    fs::write(path, json)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");
        assert_eq!(load_config(path.to_str().unwrap()), AppConfig::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"database_path": "/tmp/other.db"}"#).unwrap();

        let config = load_config(path.to_str().unwrap());
        assert_eq!(config.database_path, "/tmp/other.db");
        assert_eq!(config.session_file, DEFAULT_SESSION_FILE);
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/config.json");
        let path = path.to_str().unwrap();
        let config = AppConfig {
            database_path: "chat.db".to_string(),
            ..AppConfig::default()
        };

        save_config(path, &config).unwrap();
        assert_eq!(load_config(path), config);
    }

    #[test]
    fn malformed_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "[1, 2").unwrap();
        assert_eq!(load_config(path.to_str().unwrap()), AppConfig::default());
    }
}
