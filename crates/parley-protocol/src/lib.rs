pub mod frames;

pub use frames::{ChatMessage, ClientFrame, CompletePayload, MessageBody, StreamFrame};
