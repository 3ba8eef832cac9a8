use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::db::init_db;
use crate::error::{Result, SessionError};
use crate::types::{ChatSession, MessageRole, NewMessage, SessionSummary, StoredMessage};

const DEFAULT_TITLE_MAX_CHARS: usize = 50;

/// Thread-safe store for chat sessions and their messages.
///
/// Wraps a single SQLite connection in a `Mutex`; every operation holds the
/// lock for its whole duration.
pub struct SessionStore {
    db: Mutex<Connection>,
    title_max_chars: usize,
}

impl SessionStore {
    /// Wrap an already-open (and `init_db`-initialised) connection.
    pub fn new(conn: Connection) -> Self {
        Self {
            db: Mutex::new(conn),
            title_max_chars: DEFAULT_TITLE_MAX_CHARS,
        }
    }

    /// Open (or create) the database file at `path`, creating parent directories.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        init_db(&conn)?;
        Ok(Self::new(conn))
    }

    /// Fresh in-memory store, used by tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        init_db(&conn)?;
        Ok(Self::new(conn))
    }

    /// Cap for titles derived from a session's first user message.
    pub fn with_title_max_chars(mut self, max: usize) -> Self {
        self.title_max_chars = max;
        self
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.db.lock().map_err(|_| SessionError::LockPoisoned)
    }

    /// Create an empty session. Without a title it is named `Chat {n+1}`,
    /// `n` being the number of sessions already stored.
    #[instrument(skip(self))]
    pub fn create(&self, title: Option<&str>) -> Result<ChatSession> {
        let db = self.conn()?;
        let title = match title.map(str::trim).filter(|t| !t.is_empty()) {
            Some(t) => t.to_string(),
            None => {
                let count: i64 =
                    db.query_row("SELECT COUNT(*) FROM chat_sessions", [], |row| row.get(0))?;
                format!("Chat {}", count + 1)
            }
        };

        let id = Uuid::now_v7().to_string();
        let now = timestamp();
        db.execute(
            "INSERT INTO chat_sessions (id, title, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?3)",
            params![id, title, now],
        )?;
        debug!(%id, %title, "session created");

        Ok(ChatSession {
            id,
            title,
            messages: Vec::new(),
            created_at: now.clone(),
            updated_at: now,
        })
    }

    /// Retrieve a session and all its messages, `None` if it does not exist.
    #[instrument(skip(self))]
    pub fn get(&self, id: &str) -> Result<Option<ChatSession>> {
        let db = self.conn()?;
        let Some(mut session) = db
            .query_row(
                "SELECT id, title, created_at, updated_at FROM chat_sessions WHERE id = ?1",
                params![id],
                |row| {
                    Ok(ChatSession {
                        id: row.get(0)?,
                        title: row.get(1)?,
                        messages: Vec::new(),
                        created_at: row.get(2)?,
                        updated_at: row.get(3)?,
                    })
                },
            )
            .optional()?
        else {
            return Ok(None);
        };

        let mut stmt = db.prepare(
            "SELECT id, role, content, display, thinking, artifacts, created_at
             FROM chat_messages WHERE session_id = ?1 ORDER BY seq",
        )?;
        session.messages = stmt
            .query_map(params![id], row_to_message)?
            .collect::<rusqlite::Result<_>>()?;
        Ok(Some(session))
    }

    /// Return the session `id`, or a brand-new one (with a fresh id) when it
    /// does not exist.
    #[instrument(skip(self))]
    pub fn get_or_create(&self, id: &str) -> Result<ChatSession> {
        if let Some(session) = self.get(id)? {
            return Ok(session);
        }
        debug!("unknown session id, starting a new session");
        self.create(None)
    }

    /// All sessions, most recently updated first.
    #[instrument(skip(self))]
    pub fn list(&self) -> Result<Vec<SessionSummary>> {
        let db = self.conn()?;
        let mut stmt = db.prepare(
            "SELECT s.id, s.title, s.updated_at,
                    (SELECT COALESCE(m.display, m.content) FROM chat_messages m
                      WHERE m.session_id = s.id ORDER BY m.seq DESC LIMIT 1),
                    (SELECT COUNT(*) FROM chat_messages m WHERE m.session_id = s.id)
             FROM chat_sessions s
             ORDER BY s.updated_at DESC, s.rowid DESC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(SessionSummary {
                id: row.get(0)?,
                title: row.get(1)?,
                updated_at: row.get(2)?,
                last_message: row.get(3)?,
                message_count: row.get::<_, i64>(4)? as u32,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }

    /// Append a message and bump the session's `updated_at`.
    ///
    /// A user message that is the first in its session also retitles the
    /// session (see [`title_from_message`]).
    #[instrument(skip(self, message), fields(role = message.role.as_str()))]
    pub fn add_message(&self, session_id: &str, message: NewMessage) -> Result<StoredMessage> {
        let mut db = self.conn()?;
        let tx = db.transaction()?;

        let existing: Option<i64> = tx
            .query_row(
                "SELECT (SELECT COUNT(*) FROM chat_messages WHERE session_id = s.id)
                 FROM chat_sessions s WHERE s.id = ?1",
                params![session_id],
                |row| row.get(0),
            )
            .optional()?;
        let Some(existing) = existing else {
            return Err(SessionError::NotFound {
                id: session_id.to_string(),
            });
        };

        let stored = StoredMessage {
            id: Uuid::now_v7().to_string(),
            role: message.role,
            content: message.content,
            display: message.display,
            thinking: message.thinking,
            artifacts: message.artifacts,
            timestamp: timestamp(),
        };
        tx.execute(
            "INSERT INTO chat_messages
             (id, session_id, role, content, display, thinking, artifacts, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                stored.id,
                session_id,
                stored.role.as_str(),
                stored.content,
                stored.display,
                stored.thinking,
                serde_json::to_string(&stored.artifacts)?,
                stored.timestamp,
            ],
        )?;

        let new_title = (existing == 0 && stored.role == MessageRole::User)
            .then(|| title_from_message(&stored.content, self.title_max_chars))
            .flatten();
        match &new_title {
            Some(title) => tx.execute(
                "UPDATE chat_sessions SET title = ?1, updated_at = ?2 WHERE id = ?3",
                params![title, stored.timestamp, session_id],
            )?,
            None => tx.execute(
                "UPDATE chat_sessions SET updated_at = ?1 WHERE id = ?2",
                params![stored.timestamp, session_id],
            )?,
        };
        tx.commit()?;

        if let Some(title) = new_title {
            debug!(%title, "session retitled from first message");
        }
        Ok(stored)
    }

    /// The most recent `max` messages, oldest first.
    #[instrument(skip(self))]
    pub fn history(&self, session_id: &str, max: usize) -> Result<Vec<StoredMessage>> {
        let db = self.conn()?;
        ensure_exists(&db, session_id)?;
        let mut stmt = db.prepare(
            "SELECT id, role, content, display, thinking, artifacts, created_at FROM (
                 SELECT * FROM chat_messages WHERE session_id = ?1
                 ORDER BY seq DESC LIMIT ?2
             ) ORDER BY seq",
        )?;
        let rows = stmt.query_map(params![session_id, max as i64], row_to_message)?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }

    #[instrument(skip(self))]
    pub fn rename(&self, session_id: &str, title: &str) -> Result<()> {
        let db = self.conn()?;
        let changed = db.execute(
            "UPDATE chat_sessions SET title = ?1, updated_at = ?2 WHERE id = ?3",
            params![title.trim(), timestamp(), session_id],
        )?;
        if changed == 0 {
            return Err(SessionError::NotFound {
                id: session_id.to_string(),
            });
        }
        Ok(())
    }

    /// Delete a session and its messages.
    #[instrument(skip(self))]
    pub fn delete(&self, session_id: &str) -> Result<()> {
        let mut db = self.conn()?;
        let tx = db.transaction()?;
        tx.execute(
            "DELETE FROM chat_messages WHERE session_id = ?1",
            params![session_id],
        )?;
        let changed = tx.execute("DELETE FROM chat_sessions WHERE id = ?1", params![session_id])?;
        if changed == 0 {
            return Err(SessionError::NotFound {
                id: session_id.to_string(),
            });
        }
        tx.commit()?;
        Ok(())
    }

    /// Remove every session. Returns how many were deleted.
    #[instrument(skip(self))]
    pub fn clear(&self) -> Result<usize> {
        let mut db = self.conn()?;
        let tx = db.transaction()?;
        tx.execute("DELETE FROM chat_messages", [])?;
        let removed = tx.execute("DELETE FROM chat_sessions", [])?;
        tx.commit()?;
        debug!(removed, "all sessions cleared");
        Ok(removed)
    }
}

/// Title for a session started by `content`: its first `max_chars`
/// characters, trimmed, with `...` appended when the message was longer.
/// `None` for blank messages.
pub fn title_from_message(content: &str, max_chars: usize) -> Option<String> {
    let content = content.trim();
    if content.is_empty() {
        return None;
    }
    let truncated = content.chars().count() > max_chars;
    let head: String = content.chars().take(max_chars).collect();
    let head = head.trim_end();
    Some(if truncated {
        format!("{head}...")
    } else {
        head.to_string()
    })
}

fn timestamp() -> String {
    // Fixed-width UTC so lexicographic order matches chronological order.
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn ensure_exists(db: &Connection, session_id: &str) -> Result<()> {
    let found: Option<i64> = db
        .query_row(
            "SELECT 1 FROM chat_sessions WHERE id = ?1",
            params![session_id],
            |row| row.get(0),
        )
        .optional()?;
    match found {
        Some(_) => Ok(()),
        None => Err(SessionError::NotFound {
            id: session_id.to_string(),
        }),
    }
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredMessage> {
    let role: String = row.get(1)?;
    let artifacts: String = row.get(5)?;
    let artifacts = serde_json::from_str(&artifacts).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(StoredMessage {
        id: row.get(0)?,
        role: MessageRole::from_db(&role),
        content: row.get(2)?,
        display: row.get(3)?,
        thinking: row.get(4)?,
        artifacts,
        timestamp: row.get(6)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_message_is_the_title() {
        assert_eq!(title_from_message("  Hello there ", 50).as_deref(), Some("Hello there"));
    }

    #[test]
    fn long_message_is_truncated_with_ellipsis() {
        let msg = "a".repeat(60);
        let title = title_from_message(&msg, 50).unwrap();
        assert_eq!(title, format!("{}...", "a".repeat(50)));
    }

    #[test]
    fn truncation_counts_characters_not_bytes() {
        let title = title_from_message("ééééé", 3).unwrap();
        assert_eq!(title, "ééé...");
    }

    #[test]
    fn blank_message_gives_no_title() {
        assert_eq!(title_from_message("   \n", 50), None);
    }
}
