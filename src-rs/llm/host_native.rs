use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::types::{GenerationStrategy, Prompt, ProviderConfig, ProviderError};
use crate::host::{GenerateOptions, HostBridge, HostError};

/// Generation through the host application's own model connection.
pub struct HostNativeStrategy {
    host: Arc<dyn HostBridge>,
}

impl HostNativeStrategy {
    pub fn new(host: Arc<dyn HostBridge>) -> Self {
        Self { host }
    }
}

#[async_trait]
impl GenerationStrategy for HostNativeStrategy {
    fn name(&self) -> &'static str {
        "host"
    }

    async fn generate(
        &self,
        prompt: &Prompt,
        config: &ProviderConfig,
        cancel: &CancellationToken,
    ) -> Result<String, ProviderError> {
        let options = GenerateOptions {
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
        };
        let text = prompt.as_text();
        let timeout = Duration::from_millis(config.timeout_ms);
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ProviderError::Cancelled),
            outcome = tokio::time::timeout(timeout, self.host.generate(&text, &options)) => outcome,
        };
        match outcome {
            Err(_) => Err(ProviderError::Timeout),
            Ok(Err(HostError::Unavailable)) => Err(ProviderError::NotConfigured),
            Ok(Err(HostError::Rejected(status))) => Err(ProviderError::Http {
                status,
                body: String::new(),
            }),
            Ok(Err(HostError::Request(msg))) => Err(ProviderError::Network(msg)),
            Ok(Ok(reply)) if reply.trim().is_empty() => {
                Err(ProviderError::InvalidResponseShape("host returned empty text".into()))
            }
            Ok(Ok(reply)) => Ok(reply),
        }
    }
}
