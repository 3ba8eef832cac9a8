use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{ParleyError, Result};

pub const DEFAULT_PORT: u16 = 3002;
pub const DEFAULT_BIND: &str = "127.0.0.1";
pub const DEFAULT_CORS_ORIGIN: &str = "http://localhost:3000";
pub const MAX_PAYLOAD_BYTES: usize = 128 * 1024; // 128 KB cap per inbound WS frame

const OPENAI_BASE_URL: &str = "https://api.openai.com";
const OPENAI_MODEL: &str = "gpt-3.5-turbo";
const LMSTUDIO_BASE_URL: &str = "http://localhost:1234";
const LMSTUDIO_API_KEY: &str = "lm-studio";
const LMSTUDIO_MODEL: &str = "gemma-3-1b-it";

/// Top-level config (parley.toml + PARLEY_* env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParleyConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Browser origin allowed by CORS (the web UI).
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            cors_origin: default_cors_origin(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAi,
    LmStudio,
}

impl ProviderKind {
    /// Parse a provider slug. Case-insensitive.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Some(ProviderKind::OpenAi),
            "lmstudio" | "lm-studio" => Some(ProviderKind::LmStudio),
            _ => None,
        }
    }
}

/// LLM endpoint settings. Unset values fall back to the legacy environment
/// variables (`AI_PROVIDER`, `OPENAI_KEY`, `LMSTUDIO_BASE_URL`, ...) and
/// then to per-provider defaults; see [`ProviderConfig::resolve`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub kind: Option<ProviderKind>,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub model: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// List models at startup and log whether the configured one is loaded.
    #[serde(default = "bool_true")]
    pub probe_on_start: bool,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: None,
            api_key: None,
            base_url: None,
            model: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            probe_on_start: true,
        }
    }
}

/// Provider settings with every fallback applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedProvider {
    pub kind: ProviderKind,
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

impl ProviderConfig {
    /// Resolve against the process environment.
    pub fn resolve(&self) -> Result<ResolvedProvider> {
        self.resolve_with(|key| std::env::var(key).ok())
    }

    /// Resolve using `env` to look up legacy variables.
    pub fn resolve_with<F>(&self, env: F) -> Result<ResolvedProvider>
    where
        F: Fn(&str) -> Option<String>,
    {
        let kind = match self.kind {
            Some(kind) => kind,
            None => match env("AI_PROVIDER") {
                Some(raw) => ProviderKind::parse(&raw).ok_or_else(|| {
                    ParleyError::Config(format!("unknown AI_PROVIDER: {raw}"))
                })?,
                None => ProviderKind::OpenAi,
            },
        };

        let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        let pick = |configured: &Option<String>, legacy: &str| {
            non_empty(configured.clone()).or_else(|| non_empty(env(legacy)))
        };

        let resolved = match kind {
            ProviderKind::OpenAi => ResolvedProvider {
                kind,
                api_key: pick(&self.api_key, "OPENAI_KEY").ok_or_else(|| {
                    ParleyError::Config(
                        "OpenAI API key is missing: set provider.api_key or OPENAI_KEY".to_string(),
                    )
                })?,
                base_url: non_empty(self.base_url.clone())
                    .unwrap_or_else(|| OPENAI_BASE_URL.to_string()),
                model: pick(&self.model, "OPENAI_MODEL").unwrap_or_else(|| OPENAI_MODEL.to_string()),
            },
            ProviderKind::LmStudio => ResolvedProvider {
                kind,
                api_key: pick(&self.api_key, "LMSTUDIO_API_KEY")
                    .unwrap_or_else(|| LMSTUDIO_API_KEY.to_string()),
                base_url: pick(&self.base_url, "LMSTUDIO_BASE_URL")
                    .unwrap_or_else(|| LMSTUDIO_BASE_URL.to_string()),
                model: pick(&self.model, "LMSTUDIO_MODEL")
                    .unwrap_or_else(|| LMSTUDIO_MODEL.to_string()),
            },
        };
        Ok(resolved)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Number of most recent messages sent to the model as context.
    #[serde(default = "default_history_window")]
    pub history_window: usize,
    /// Length cap for titles derived from a session's first message.
    #[serde(default = "default_title_max_chars")]
    pub title_max_chars: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            history_window: default_history_window(),
            title_max_chars: default_title_max_chars(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn bool_true() -> bool {
    true
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_cors_origin() -> String {
    DEFAULT_CORS_ORIGIN.to_string()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    1500
}
fn default_history_window() -> usize {
    10
}
fn default_title_max_chars() -> usize {
    50
}
fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.parley/parley.db", home)
}

impl ParleyConfig {
    /// Load config from a TOML file with env var overrides.
    ///
    /// Precedence, lowest first: built-in defaults, the TOML file (explicit
    /// path or ~/.parley/parley.toml), legacy `PORT`, `PARLEY_*` variables
    /// (`__` separates nesting levels, e.g. `PARLEY_PROVIDER__API_KEY`).
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        Self::figment(&path)
            .extract()
            .map_err(|e| ParleyError::Config(e.to_string()))
    }

    fn figment(path: &str) -> Figment {
        Figment::new()
            .merge(Toml::file(path))
            .merge(Env::raw().only(&["PORT"]).map(|_| "server.port".into()))
            .merge(Env::prefixed("PARLEY_").split("__"))
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.parley/parley.toml", home)
}
