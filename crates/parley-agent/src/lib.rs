pub mod openai;
pub mod prompt;
pub mod provider;
pub mod runtime;
pub mod stream;

pub use prompt::PromptType;
pub use provider::{ChatRequest, ChatResponse, LlmProvider, Message, ProviderError, Role};
pub use runtime::{AgentRuntime, ProbeReport};
pub use stream::StreamEvent;
