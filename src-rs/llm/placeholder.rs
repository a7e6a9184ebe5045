use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::types::{GenerationStrategy, Prompt, ProviderConfig, ProviderError};

const EXCERPT_CHARS: usize = 120;

/// Last link of the chain. Deterministic and offline, so it cannot fail.
pub struct PlaceholderStrategy;

impl PlaceholderStrategy {
    pub fn render(prompt: &Prompt) -> String {
        let request = prompt.last_user_text().trim();
        let excerpt: String = request.chars().take(EXCERPT_CHARS).collect();
        let ellipsis = if request.chars().count() > EXCERPT_CHARS { "…" } else { "" };
        if excerpt.is_empty() {
            "No generation service is reachable right now. Configure a provider and try again.".to_string()
        } else {
            format!(
                "No generation service is reachable right now.\n\nRequested: {}{}\n\nConfigure a provider and regenerate to replace this placeholder.",
                excerpt, ellipsis
            )
        }
    }
}

#[async_trait]
impl GenerationStrategy for PlaceholderStrategy {
    fn name(&self) -> &'static str {
        "placeholder"
    }

    async fn generate(
        &self,
        prompt: &Prompt,
        _config: &ProviderConfig,
        _cancel: &CancellationToken,
    ) -> Result<String, ProviderError> {
        Ok(Self::render(prompt))
    }
}
