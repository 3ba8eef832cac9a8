use serde::{Deserialize, Serialize};

/// Which system prompt a chat turn runs under.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptType {
    #[default]
    Default,
    Frontend,
    Backend,
}

impl PromptType {
    /// Parse a client-supplied label. Case-insensitive; unknown labels map to `Default`.
    pub fn parse(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "frontend" => PromptType::Frontend,
            "backend" => PromptType::Backend,
            _ => PromptType::Default,
        }
    }

    pub fn system_prompt(self) -> &'static str {
        match self {
            // All three share the engineering prompt for now.
            PromptType::Default | PromptType::Frontend | PromptType::Backend => ENGINEERING_PROMPT,
        }
    }
}

const ENGINEERING_PROMPT: &str = r#"You are a friendly assistant with deep software engineering experience. Hold a normal conversation when the user is chatting, and give technical help when they ask for it.

Guidelines:
- Answer greetings and general questions naturally; do not assume every message needs code.
- Ask a clarifying question when a technical request is ambiguous.
- Explain your approach briefly before showing an implementation.
- Prefer clear, idiomatic, well-structured code with sensible error handling.

Whenever you include code, wrap each file in a code artifact using exactly this layout:

<CODE_ARTIFACT>
```language
// filename: example.ext
code here
```
</CODE_ARTIFACT>

Put <CODE_ARTIFACT> and </CODE_ARTIFACT> on their own lines, always name the language after the opening fence, and start the block with a comment giving the filename. Keep prose outside the artifact.

If you reason step by step before answering, put that reasoning inside <think></think> so it can be shown separately from the answer."#;
