use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::external::ExternalStrategy;
use super::host_native::HostNativeStrategy;
use super::placeholder::PlaceholderStrategy;
use super::transport::Transport;
use super::types::{Generation, GenerationStrategy, Prompt, ProviderConfig, ProviderError};
use crate::host::HostBridge;

/// Runs a prompt through an ordered fallback chain. Each strategy gets one
/// call; the first non-empty success wins.
pub struct ProviderClient {
    chain: Vec<Arc<dyn GenerationStrategy>>,
}

impl ProviderClient {
    pub fn new(chain: Vec<Arc<dyn GenerationStrategy>>) -> Self {
        Self { chain }
    }

    /// host-native → configured external provider → local placeholder.
    pub fn standard(host: Arc<dyn HostBridge>, transport: Arc<dyn Transport>) -> Self {
        Self::new(vec![
            Arc::new(HostNativeStrategy::new(host)),
            Arc::new(ExternalStrategy::new(transport)),
            Arc::new(PlaceholderStrategy),
        ])
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.chain.iter().map(|s| s.name()).collect()
    }

    pub async fn execute(
        &self,
        prompt: &Prompt,
        config: &ProviderConfig,
        cancel: &CancellationToken,
    ) -> Result<Generation, ProviderError> {
        let mut last = ProviderError::NotConfigured;
        for strategy in &self.chain {
            if cancel.is_cancelled() {
                return Err(ProviderError::Cancelled);
            }
            match strategy.generate(prompt, config, cancel).await {
                Ok(text) if !text.trim().is_empty() => {
                    debug!(strategy = strategy.name(), "generation succeeded");
                    return Ok(Generation {
                        text,
                        strategy: strategy.name(),
                    });
                }
                Ok(_) => {
                    warn!(strategy = strategy.name(), "strategy returned empty text, falling back");
                    last = ProviderError::InvalidResponseShape("empty text".into());
                }
                Err(ProviderError::Cancelled) => return Err(ProviderError::Cancelled),
                Err(ProviderError::NotConfigured) => {
                    debug!(strategy = strategy.name(), "strategy not configured, skipping");
                }
                Err(err) => {
                    info!(strategy = strategy.name(), error = %err, "strategy failed, falling back");
                    last = err;
                }
            }
        }
        Err(ProviderError::AllProvidersExhausted {
            last: Box::new(last),
        })
    }
}
