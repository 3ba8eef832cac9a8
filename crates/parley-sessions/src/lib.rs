pub mod db;
pub mod error;
pub mod store;
pub mod types;

pub use error::SessionError;
pub use store::SessionStore;
pub use types::{ChatSession, MessageRole, NewMessage, SessionSummary, StoredMessage};
