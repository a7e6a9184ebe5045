use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_TIMEOUT_MS: u64 = 60_000;
pub const MAX_TIMEOUT_MS: u64 = 10 * 60_000;
pub const DEFAULT_RETRY_COUNT: u32 = 2;
pub const MAX_RETRY_COUNT: u32 = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// A fully assembled prompt for one unit of generation.
#[derive(Clone, Debug, Default)]
pub struct Prompt {
    pub messages: Vec<Message>,
}

impl Prompt {
    /// Flattens the conversation for channels that only accept a single text blob.
    pub fn as_text(&self) -> String {
        self.messages
            .iter()
            .map(|m| format!("{}: {}", m.role.as_str(), m.content))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    pub fn last_user_text(&self) -> &str {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or("")
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProviderKind {
    #[serde(rename = "openai")]
    OpenAiCompatible,
    #[serde(rename = "gemini")]
    Gemini,
    #[default]
    #[serde(rename = "host")]
    HostNative,
}

impl ProviderKind {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "openai" | "openai-compatible" | "openai_compatible" => Some(Self::OpenAiCompatible),
            "gemini" | "google" => Some(Self::Gemini),
            "host" | "host-native" | "native" => Some(Self::HostNative),
            _ => None,
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub endpoint: String,
    pub credential: String,
    pub model: String,
    pub temperature: f64,
    pub max_output_tokens: u32,
    pub timeout_ms: u64,
    pub retry_count: u32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: ProviderKind::HostNative,
            endpoint: String::new(),
            credential: String::new(),
            model: String::new(),
            temperature: 0.8,
            max_output_tokens: 2048,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            retry_count: DEFAULT_RETRY_COUNT,
        }
    }
}

impl ProviderConfig {
    /// Repairs out-of-range numeric fields read back from storage.
    pub fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        if !self.temperature.is_finite() || !(0.0..=2.0).contains(&self.temperature) {
            self.temperature = defaults.temperature;
        }
        if self.max_output_tokens == 0 {
            self.max_output_tokens = defaults.max_output_tokens;
        }
        if self.timeout_ms == 0 {
            self.timeout_ms = defaults.timeout_ms;
        }
        self.timeout_ms = self.timeout_ms.min(MAX_TIMEOUT_MS);
        self.retry_count = self.retry_count.min(MAX_RETRY_COUNT);
        self
    }

    pub fn credentials(&self) -> Vec<String> {
        self.credential
            .split(',')
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn is_external(&self) -> bool {
        !matches!(self.kind, ProviderKind::HostNative)
    }

    /// Copy safe to hand back to a UI.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if !copy.credential.is_empty() {
            copy.credential = "***".to_string();
        }
        copy
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("kind", &self.kind)
            .field("endpoint", &self.endpoint)
            .field("credential", &if self.credential.is_empty() { "" } else { "***" })
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_output_tokens", &self.max_output_tokens)
            .field("timeout_ms", &self.timeout_ms)
            .field("retry_count", &self.retry_count)
            .finish()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Generation {
    pub text: String,
    pub strategy: &'static str,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ProviderError {
    #[error("request timed out")]
    Timeout,
    #[error("network error: {0}")]
    Network(String),
    #[error("http {status}: {body}")]
    Http { status: u16, body: String },
    #[error("credential rejected")]
    InvalidCredential,
    #[error("unexpected response shape: {0}")]
    InvalidResponseShape(String),
    #[error("strategy not configured")]
    NotConfigured,
    #[error("cancelled")]
    Cancelled,
    #[error("all providers exhausted (last: {last})")]
    AllProvidersExhausted { last: Box<ProviderError> },
}

impl ProviderError {
    /// Errors worth another attempt against the same endpoint.
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::Timeout | ProviderError::Network(_) => true,
            ProviderError::Http { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    pub fn is_timeout(&self) -> bool {
        match self {
            ProviderError::Timeout => true,
            ProviderError::AllProvidersExhausted { last } => last.is_timeout(),
            _ => false,
        }
    }
}

/// One link of the fallback chain.
#[async_trait]
pub trait GenerationStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn generate(
        &self,
        prompt: &Prompt,
        config: &ProviderConfig,
        cancel: &CancellationToken,
    ) -> Result<String, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_split_and_trim() {
        let cfg = ProviderConfig {
            credential: " k1, ,k2 ".to_string(),
            ..ProviderConfig::default()
        };
        assert_eq!(cfg.credentials(), vec!["k1".to_string(), "k2".to_string()]);
    }

    #[test]
    fn debug_output_hides_credential() {
        let cfg = ProviderConfig {
            credential: "sk-secret".to_string(),
            ..ProviderConfig::default()
        };
        let rendered = format!("{:?}", cfg);
        assert!(!rendered.contains("sk-secret"));
        assert_eq!(cfg.redacted().credential, "***");
    }

    #[test]
    fn malformed_numbers_fall_back_to_defaults() {
        let raw = r#"{"kind":"gemini","temperature":9.5,"timeoutMs":0,"retryCount":40}"#;
        let cfg: ProviderConfig = serde_json::from_str(raw).unwrap();
        let cfg = cfg.sanitized();
        assert_eq!(cfg.kind, ProviderKind::Gemini);
        assert_eq!(cfg.temperature, 0.8);
        assert_eq!(cfg.timeout_ms, DEFAULT_TIMEOUT_MS);
        assert_eq!(cfg.retry_count, MAX_RETRY_COUNT);
    }

    #[test]
    fn transient_classification() {
        assert!(ProviderError::Timeout.is_transient());
        assert!(ProviderError::Http { status: 503, body: String::new() }.is_transient());
        assert!(ProviderError::Http { status: 429, body: String::new() }.is_transient());
        assert!(!ProviderError::Http { status: 400, body: String::new() }.is_transient());
        assert!(!ProviderError::InvalidCredential.is_transient());
        assert!(!ProviderError::InvalidResponseShape("x".into()).is_transient());
    }
}
