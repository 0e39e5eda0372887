use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Result as SqlResult, Row, params};
use std::path::Path;

use super::database::Database;
use super::models::{
    ChatSession, MessageId, NewSession, PersistedMessage, RawTimestamp, SessionBatch,
    SessionUpdate,
};
use crate::common::{Role, UnknownRole};

pub const DEFAULT_DB_PATH: &str = "data/chat.db";

const SESSION_COLUMNS: &str =
    "session_id, user_id, title, course_id, deadline_id, created_at, updated_at, is_deleted";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Sql(#[from] rusqlite::Error),

    #[error(transparent)]
    UnknownRole(#[from] UnknownRole),
}

/// Database for chat sessions and their messages
pub struct ChatDatabase {
    db: Database,
}

impl ChatDatabase {
    /// Initialize chat database at default location
    pub fn new() -> SqlResult<Self> {
        Self::with_path(DEFAULT_DB_PATH)
    }

    /// Initialize chat database at custom path
    pub fn with_path<P: AsRef<Path>>(path: P) -> SqlResult<Self> {
        Self::from_database(Database::new(path)?)
    }

    pub fn in_memory() -> SqlResult<Self> {
        Self::from_database(Database::in_memory()?)
    }

    fn from_database(db: Database) -> SqlResult<Self> {
        let chat_db = Self { db };
        chat_db.init_schema()?;
        Ok(chat_db)
    }

    fn init_schema(&self) -> SqlResult<()> {
        let conn = self.db.connection();

        conn.execute(
            "CREATE TABLE IF NOT EXISTS chat_sessions (
                session_id TEXT PRIMARY KEY,
                user_id TEXT,
                title TEXT,
                course_id TEXT,
                deadline_id TEXT,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                is_deleted INTEGER NOT NULL DEFAULT 0
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS chat_messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL REFERENCES chat_sessions(session_id),
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                message_sequence INTEGER NOT NULL,
                created_at INTEGER NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_chat_sessions_user ON chat_sessions(user_id, updated_at)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_chat_messages_sequence
             ON chat_messages(session_id, message_sequence)",
            [],
        )?;

        Ok(())
    }

    // ========== Sessions ==========

    /// Create a new chat session
    pub fn create_session(&self, session: &NewSession) -> SqlResult<ChatSession> {
        insert_session(self.db.connection(), session, now_millis())
    }

    /// Update title / deleted flag; `None` if the session does not exist
    pub fn update_session(
        &self,
        session_id: &str,
        update: &SessionUpdate,
    ) -> SqlResult<Option<ChatSession>> {
        apply_update(self.db.connection(), session_id, update)
    }

    pub fn get_session(&self, session_id: &str) -> SqlResult<Option<ChatSession>> {
        fetch_session(self.db.connection(), session_id)
    }

    /// All live sessions of a student, most recently updated first
    pub fn get_student_sessions(&self, user_id: &str) -> SqlResult<Vec<ChatSession>> {
        let conn = self.db.connection();
        let mut stmt = conn.prepare(&format!(
            "SELECT {SESSION_COLUMNS}
             FROM chat_sessions
             WHERE user_id = ?1 AND is_deleted = 0
             ORDER BY updated_at DESC"
        ))?;

        let sessions = stmt
            .query_map(params![user_id], session_from_row)?
            .collect::<SqlResult<Vec<_>>>()?;

        Ok(sessions)
    }

    /// Live sessions of a student for one course deadline
    pub fn get_sessions_by_deadline(
        &self,
        user_id: &str,
        course_id: &str,
        deadline_id: &str,
    ) -> SqlResult<Vec<ChatSession>> {
        let conn = self.db.connection();
        let mut stmt = conn.prepare(&format!(
            "SELECT {SESSION_COLUMNS}
             FROM chat_sessions
             WHERE user_id = ?1 AND course_id = ?2 AND deadline_id = ?3 AND is_deleted = 0
             ORDER BY updated_at DESC"
        ))?;

        let sessions = stmt
            .query_map(params![user_id, course_id, deadline_id], session_from_row)?
            .collect::<SqlResult<Vec<_>>>()?;

        Ok(sessions)
    }

    /// Soft delete; returns whether a session was found
    pub fn delete_session(&self, session_id: &str) -> SqlResult<bool> {
        let conn = self.db.connection();
        let changed = conn.execute(
            "UPDATE chat_sessions SET is_deleted = 1, updated_at = ?2 WHERE session_id = ?1",
            params![session_id, now_millis()],
        )?;
        if changed > 0 {
            log::info!("Soft-deleted chat session {session_id}");
        }
        Ok(changed > 0)
    }

    // ========== Messages ==========

    /// Append a message; without an explicit sequence it goes after the last one
    pub fn save_message(
        &self,
        session_id: &str,
        role: Role,
        content: &str,
        message_sequence: Option<i64>,
    ) -> SqlResult<PersistedMessage> {
        let conn = self.db.connection();
        let sequence = match message_sequence {
            Some(sequence) => sequence,
            None => next_sequence(conn, session_id)?,
        };
        insert_message(conn, session_id, role, content, sequence, now_millis())
    }

    /// All messages of a session in sequence order
    pub fn get_messages(&self, session_id: &str) -> SqlResult<Vec<PersistedMessage>> {
        let conn = self.db.connection();
        let mut stmt = conn.prepare(
            "SELECT id, role, content, created_at
             FROM chat_messages
             WHERE session_id = ?1
             ORDER BY message_sequence ASC, id ASC",
        )?;

        let messages = stmt
            .query_map(params![session_id], |row| {
                Ok(PersistedMessage {
                    id: row.get(0)?,
                    role: row.get(1)?,
                    content: row.get(2)?,
                    timestamp: row.get(3)?,
                })
            })?
            .collect::<SqlResult<Vec<_>>>()?;

        Ok(messages)
    }

    pub fn message_count(&self, session_id: &str) -> SqlResult<usize> {
        count_messages(self.db.connection(), session_id)
    }

    /// Create or refresh a session and store the messages it does not have yet.
    ///
    /// Runs in one transaction. Returns how many messages were appended.
    pub fn save_session_with_messages(
        &mut self,
        batch: &SessionBatch,
    ) -> Result<usize, StorageError> {
        let now = now_millis();
        let tx = self.db.connection_mut().transaction()?;

        match fetch_session(&tx, &batch.session_id)? {
            None => {
                let title = batch
                    .title
                    .clone()
                    .unwrap_or_else(|| default_title(batch.study_mode));
                let session = NewSession {
                    session_id: batch.session_id.clone(),
                    user_id: batch.user_id.clone(),
                    title: Some(title),
                    course_id: batch.course_id.clone(),
                    deadline_id: batch.deadline_id.clone(),
                };
                insert_session(&tx, &session, now)?;
            }
            Some(existing) => {
                // A title with "..." already carries user content; keep it.
                let keeps_title = existing
                    .title
                    .as_deref()
                    .is_some_and(|title| title.contains("..."));
                let update = SessionUpdate {
                    title: batch.title.clone().filter(|_| !keeps_title),
                    is_deleted: None,
                    updated_at: Some(now),
                };
                apply_update(&tx, &batch.session_id, &update)?;
            }
        }

        let existing_count = count_messages(&tx, &batch.session_id)?;
        log::info!(
            "Session {}: {} existing messages, {} total messages to save",
            batch.session_id,
            existing_count,
            batch.messages.len()
        );

        let new_messages = batch.messages.get(existing_count..).unwrap_or_default();
        let mut sequence = existing_count as i64;
        for message in new_messages {
            let role: Role = message.role.parse()?;
            sequence += 1;
            let created_at = message.timestamp.timestamp_millis().unwrap_or(now);
            insert_message(
                &tx,
                &batch.session_id,
                role,
                &message.content,
                sequence,
                created_at,
            )?;
        }

        tx.commit()?;

        if new_messages.is_empty() {
            log::info!("No new messages to save for {}", batch.session_id);
        } else {
            log::info!(
                "Saved {} new messages to {}",
                new_messages.len(),
                batch.session_id
            );
        }
        Ok(new_messages.len())
    }
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

fn default_title(study_mode: bool) -> String {
    let prefix = if study_mode { "Study Mode: " } else { "" };
    format!("{prefix}Chat Session {}", Utc::now().format("%Y-%m-%d"))
}

fn session_from_row(row: &Row<'_>) -> SqlResult<ChatSession> {
    Ok(ChatSession {
        session_id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        course_id: row.get(3)?,
        deadline_id: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
        is_deleted: row.get::<_, i64>(7)? != 0,
    })
}

fn fetch_session(conn: &Connection, session_id: &str) -> SqlResult<Option<ChatSession>> {
    conn.query_row(
        &format!("SELECT {SESSION_COLUMNS} FROM chat_sessions WHERE session_id = ?1"),
        params![session_id],
        session_from_row,
    )
    .optional()
}

fn insert_session(conn: &Connection, session: &NewSession, now: i64) -> SqlResult<ChatSession> {
    let title = session
        .title
        .clone()
        .unwrap_or_else(|| default_title(false));
    conn.execute(
        "INSERT INTO chat_sessions
            (session_id, user_id, title, course_id, deadline_id, created_at, updated_at, is_deleted)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6, 0)",
        params![
            session.session_id,
            session.user_id,
            title,
            session.course_id,
            session.deadline_id,
            now
        ],
    )?;
    log::info!("Created chat session {}", session.session_id);

    Ok(ChatSession {
        session_id: session.session_id.clone(),
        user_id: session.user_id.clone(),
        title: Some(title),
        course_id: session.course_id.clone(),
        deadline_id: session.deadline_id.clone(),
        created_at: now,
        updated_at: now,
        is_deleted: false,
    })
}

fn apply_update(
    conn: &Connection,
    session_id: &str,
    update: &SessionUpdate,
) -> SqlResult<Option<ChatSession>> {
    let updated_at = update.updated_at.unwrap_or_else(now_millis);
    let changed = conn.execute(
        "UPDATE chat_sessions
         SET title = COALESCE(?2, title),
             is_deleted = COALESCE(?3, is_deleted),
             updated_at = ?4
         WHERE session_id = ?1",
        params![session_id, update.title, update.is_deleted, updated_at],
    )?;
    if changed == 0 {
        return Ok(None);
    }
    fetch_session(conn, session_id)
}

fn next_sequence(conn: &Connection, session_id: &str) -> SqlResult<i64> {
    conn.query_row(
        "SELECT COALESCE(MAX(message_sequence), 0) + 1 FROM chat_messages WHERE session_id = ?1",
        params![session_id],
        |row| row.get(0),
    )
}

fn count_messages(conn: &Connection, session_id: &str) -> SqlResult<usize> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM chat_messages WHERE session_id = ?1",
        params![session_id],
        |row| row.get(0),
    )?;
    Ok(count as usize)
}

fn insert_message(
    conn: &Connection,
    session_id: &str,
    role: Role,
    content: &str,
    sequence: i64,
    created_at: i64,
) -> SqlResult<PersistedMessage> {
    conn.execute(
        "INSERT INTO chat_messages (session_id, role, content, message_sequence, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![session_id, role.as_str(), content, sequence, created_at],
    )?;

    Ok(PersistedMessage {
        id: MessageId::Int(conn.last_insert_rowid()),
        role: role.as_str().to_string(),
        content: content.to_string(),
        timestamp: RawTimestamp::EpochMillis(created_at),
    })
}
