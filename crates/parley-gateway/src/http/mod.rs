pub mod health;
pub mod prompt;
pub mod sessions;
pub mod stream;
