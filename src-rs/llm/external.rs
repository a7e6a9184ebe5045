use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::retry::RetryPolicy;
use super::rotation::Rotator;
use super::transport::{Transport, WireRequest, WireResponse};
use super::types::{GenerationStrategy, Message, Prompt, ProviderConfig, ProviderError, ProviderKind};
use super::{gemini_adapter, openai_adapter};

const MAX_ERROR_BODY_CHARS: usize = 512;

/// Request building and response parsing for one provider kind. Both halves
/// come from the same value so they cannot be mixed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WireFormat {
    OpenAi,
    Gemini,
}

impl WireFormat {
    pub fn for_kind(kind: ProviderKind) -> Option<Self> {
        match kind {
            ProviderKind::OpenAiCompatible => Some(Self::OpenAi),
            ProviderKind::Gemini => Some(Self::Gemini),
            ProviderKind::HostNative => None,
        }
    }

    pub fn build(self, cfg: &ProviderConfig, messages: &[Message], api_key: &str) -> WireRequest {
        match self {
            Self::OpenAi => openai_adapter::build_request(cfg, messages, api_key),
            Self::Gemini => gemini_adapter::build_request(cfg, messages, api_key),
        }
    }

    pub fn parse(self, raw: &Value) -> Result<String, ProviderError> {
        match self {
            Self::OpenAi => openai_adapter::parse_response(raw),
            Self::Gemini => gemini_adapter::parse_response(raw),
        }
    }

    pub fn decode(self, resp: WireResponse) -> Result<String, ProviderError> {
        let status = resp.status;
        if status == 401 || status == 403 {
            return Err(ProviderError::InvalidCredential);
        }
        if !(200..300).contains(&status) {
            let lowered = resp.body.to_lowercase();
            let status = if lowered.contains("resource_exhausted") || lowered.contains("rate limit") {
                429
            } else {
                status
            };
            return Err(ProviderError::Http {
                status,
                body: truncate(&resp.body, MAX_ERROR_BODY_CHARS),
            });
        }
        let raw: Value = serde_json::from_str(&resp.body)
            .map_err(|_| ProviderError::InvalidResponseShape("invalid json".into()))?;
        self.parse(&raw)
    }
}

/// The configured remote provider. The only strategy with a network round
/// trip, and so the only one that retries.
pub struct ExternalStrategy {
    transport: Arc<dyn Transport>,
    rotator: Rotator,
}

impl ExternalStrategy {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            rotator: Rotator::new(),
        }
    }

    async fn attempt(
        &self,
        format: WireFormat,
        request: WireRequest,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<String, ProviderError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ProviderError::Cancelled),
            outcome = tokio::time::timeout(timeout, self.transport.send(request)) => match outcome {
                Err(_) => Err(ProviderError::Timeout),
                Ok(Err(err)) => Err(err),
                Ok(Ok(resp)) => format.decode(resp),
            },
        }
    }
}

#[async_trait]
impl GenerationStrategy for ExternalStrategy {
    fn name(&self) -> &'static str {
        "external"
    }

    async fn generate(
        &self,
        prompt: &Prompt,
        config: &ProviderConfig,
        cancel: &CancellationToken,
    ) -> Result<String, ProviderError> {
        let format = WireFormat::for_kind(config.kind).ok_or(ProviderError::NotConfigured)?;
        let keys = config.credentials();
        if keys.is_empty() || (format == WireFormat::OpenAi && config.model.trim().is_empty()) {
            return Err(ProviderError::NotConfigured);
        }

        let policy = RetryPolicy::new(config.retry_count);
        let timeout = Duration::from_millis(config.timeout_ms);
        let mut attempt = 0u32;
        loop {
            let key = self.rotator.pick(&keys).ok_or(ProviderError::NotConfigured)?;
            let request = format.build(config, &prompt.messages, key);
            debug!(attempt, ?format, "sending provider request");

            match self.attempt(format, request, timeout, cancel).await {
                Ok(text) => return Ok(text),
                Err(ProviderError::Cancelled) => return Err(ProviderError::Cancelled),
                Err(err) if err.is_transient() && attempt < policy.max_retries => {
                    let delay = policy.delay_for(attempt);
                    warn!(attempt, delay_ms = delay.as_millis() as u64, error = %err, "transient provider failure, backing off");
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(ProviderError::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars).collect();
    out.push('…');
    out
}
