use std::sync::Arc;

use parley_core::config::{ProviderConfig, ProviderKind};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::openai::OpenAiProvider;
use crate::prompt::PromptType;
use crate::provider::{ChatRequest, ChatResponse, LlmProvider, Message, ProviderError};
use crate::stream::StreamEvent;

/// Result of listing the backend's models at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeReport {
    pub models: Vec<String>,
    /// Whether the configured model is among `models`.
    pub model_available: bool,
}

/// Holds the LLM provider and per-request settings.
/// Built once at startup and shared via Arc in AppState.
pub struct AgentRuntime {
    provider: Arc<dyn LlmProvider>,
    model: String,
    temperature: Option<f32>,
    max_tokens: u32,
}

impl AgentRuntime {
    pub fn new(provider: Arc<dyn LlmProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: None,
            max_tokens: 1500,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Build the runtime for the configured OpenAI or LM Studio endpoint.
    pub fn from_config(config: &ProviderConfig) -> parley_core::Result<Self> {
        let resolved = config.resolve()?;
        let name = match resolved.kind {
            ProviderKind::OpenAi => "openai",
            ProviderKind::LmStudio => "lmstudio",
        };
        info!(provider = name, base_url = %resolved.base_url, model = %resolved.model, "configuring LLM provider");
        let provider = OpenAiProvider::new(name, resolved.api_key, &resolved.base_url);
        Ok(Self::new(Arc::new(provider), resolved.model)
            .with_temperature(config.temperature)
            .with_max_tokens(config.max_tokens))
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Single prompt, full response (non-streaming).
    pub async fn chat(
        &self,
        prompt: &str,
        prompt_type: PromptType,
    ) -> Result<ChatResponse, ProviderError> {
        let req = self.build_request(vec![Message::user(prompt)], prompt_type, false);
        info!(model = %req.model, provider = %self.provider.name(), "processing chat request");
        self.provider.send(&req).await
    }

    /// Stream a reply to `history` (oldest first, ending with the user turn).
    pub async fn chat_stream(
        &self,
        history: Vec<Message>,
        prompt_type: PromptType,
        tx: mpsc::Sender<StreamEvent>,
    ) -> Result<(), ProviderError> {
        let req = self.build_request(history, prompt_type, true);
        info!(
            model = %req.model, provider = %self.provider.name(),
            messages = req.messages.len(), ?prompt_type, "processing streaming chat request"
        );
        self.provider.send_stream(&req, tx).await
    }

    /// List the backend's models and log whether the configured one is loaded.
    pub async fn probe(&self) -> Result<ProbeReport, ProviderError> {
        let models = self.provider.list_models().await?;
        let model_available = models.iter().any(|m| m == &self.model);

        if models.is_empty() {
            warn!(provider = %self.provider.name(), "no models loaded on the provider");
        } else if model_available {
            info!(provider = %self.provider.name(), model = %self.model, count = models.len(), "configured model is available");
        } else {
            warn!(
                provider = %self.provider.name(), model = %self.model,
                available = %models.join(", "), "configured model not found on the provider"
            );
        }

        Ok(ProbeReport {
            models,
            model_available,
        })
    }

    fn build_request(&self, messages: Vec<Message>, prompt_type: PromptType, stream: bool) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            system: prompt_type.system_prompt().to_string(),
            messages,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            stream,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::Role;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Echoes the last user message and records what it was sent.
    #[derive(Default)]
    struct Echo {
        seen: Mutex<Vec<ChatRequest>>,
    }

    #[async_trait]
    impl LlmProvider for Echo {
        fn name(&self) -> &str {
            "echo"
        }
        async fn send(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
            self.seen.lock().unwrap().push(req.clone());
            let last = req.messages.last().map(|m| m.content.clone()).unwrap_or_default();
            Ok(ChatResponse {
                content: format!("echo: {last}"),
                model: req.model.clone(),
                tokens_in: 1,
                tokens_out: 1,
                stop_reason: "stop".to_string(),
            })
        }
        async fn list_models(&self) -> Result<Vec<String>, ProviderError> {
            Ok(vec!["alpha".to_string(), "beta".to_string()])
        }
    }

    struct AlwaysFail;

    #[async_trait]
    impl LlmProvider for AlwaysFail {
        fn name(&self) -> &str {
            "always-fail"
        }
        async fn send(&self, _req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
            Err(ProviderError::Unavailable("intentional failure".to_string()))
        }
    }

    #[tokio::test]
    async fn chat_sends_system_prompt_and_settings() {
        let echo = Arc::new(Echo::default());
        let runtime = AgentRuntime::new(echo.clone(), "alpha")
            .with_temperature(0.2)
            .with_max_tokens(64);

        let resp = runtime.chat("hello", PromptType::Frontend).await.unwrap();
        assert_eq!(resp.content, "echo: hello");

        let seen = echo.seen.lock().unwrap();
        let req = &seen[0];
        assert_eq!(req.model, "alpha");
        assert_eq!(req.max_tokens, 64);
        assert_eq!(req.temperature, Some(0.2));
        assert!(!req.stream);
        assert!(req.system.contains("<CODE_ARTIFACT>"));
        assert_eq!(req.messages, vec![Message::user("hello")]);
    }

    #[tokio::test]
    async fn chat_stream_falls_back_to_single_delta() {
        let runtime = AgentRuntime::new(Arc::new(Echo::default()), "alpha");
        let (tx, mut rx) = mpsc::channel(8);
        let history = vec![
            Message::user("first"),
            Message::assistant("reply"),
            Message::user("second"),
        ];

        runtime.chat_stream(history, PromptType::Default, tx).await.unwrap();

        assert_eq!(
            rx.recv().await,
            Some(StreamEvent::TextDelta { text: "echo: second".into() })
        );
        assert!(matches!(rx.recv().await, Some(StreamEvent::Done { .. })));
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn chat_propagates_provider_errors() {
        let runtime = AgentRuntime::new(Arc::new(AlwaysFail), "alpha");
        let err = runtime.chat("hi", PromptType::Default).await.unwrap_err();
        assert!(matches!(err, ProviderError::Unavailable(_)));
    }

    #[tokio::test]
    async fn probe_reports_model_availability() {
        let runtime = AgentRuntime::new(Arc::new(Echo::default()), "beta");
        let report = runtime.probe().await.unwrap();
        assert!(report.model_available);
        assert_eq!(report.models.len(), 2);

        let runtime = AgentRuntime::new(Arc::new(Echo::default()), "gamma");
        assert!(!runtime.probe().await.unwrap().model_available);
    }

    #[tokio::test]
    async fn probe_without_listing_is_empty() {
        let runtime = AgentRuntime::new(Arc::new(AlwaysFail), "alpha");
        let report = runtime.probe().await.unwrap();
        assert!(report.models.is_empty());
        assert!(!report.model_available);
    }

    #[test]
    fn from_config_uses_lmstudio_defaults() {
        let config = ProviderConfig {
            kind: Some(ProviderKind::LmStudio),
            model: Some("local-model".into()),
            ..ProviderConfig::default()
        };
        let runtime = AgentRuntime::from_config(&config).unwrap();
        assert_eq!(runtime.provider_name(), "lmstudio");
        assert_eq!(runtime.model(), "local-model");
        assert_eq!(runtime.max_tokens, 1500);
        assert_eq!(runtime.temperature, Some(0.7));
        assert_eq!(Message::user("x").role, Role::User);
    }
}
