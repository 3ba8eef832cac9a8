use thiserror::Error;

/// Errors that can occur during session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The requested session does not exist in the database.
    #[error("session not found: {id}")]
    NotFound { id: String },

    /// A SQLite operation failed.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Stored artifact JSON could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A thread panicked while holding the connection lock.
    #[error("session store lock poisoned")]
    LockPoisoned,
}

pub type Result<T> = std::result::Result<T, SessionError>;

impl From<SessionError> for parley_core::ParleyError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NotFound { id } => parley_core::ParleyError::SessionNotFound { id },
            other => parley_core::ParleyError::Database(other.to_string()),
        }
    }
}
