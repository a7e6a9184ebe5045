use std::env;

use crate::llm::{ProviderConfig, ProviderKind};

fn load_keys_from_env(primary: &str, prefix: &str) -> Vec<String> {
    let mut keys = Vec::new();
    if let Ok(raw) = env::var(primary) {
        for item in raw.split(',') {
            let trimmed = item.trim();
            if !trimmed.is_empty() {
                keys.push(trimmed.to_string());
            }
        }
    }
    for idx in 2..=10 {
        let key = format!("{}_{}", prefix, idx);
        if let Ok(value) = env::var(&key) {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                keys.push(trimmed.to_string());
            }
        }
    }
    keys
}

pub fn load_api_keys() -> Vec<String> {
    load_keys_from_env("THEATER_API_KEY", "THEATER_API_KEY")
}

/// Provider config from the environment, used only when nothing is stored yet.
pub fn provider_seed_from_env() -> Option<ProviderConfig> {
    let kind = env::var("THEATER_PROVIDER")
        .ok()
        .and_then(|raw| ProviderKind::parse(&raw))?;
    let mut cfg = ProviderConfig {
        kind,
        ..ProviderConfig::default()
    };
    if let Ok(endpoint) = env::var("THEATER_API_ENDPOINT") {
        cfg.endpoint = endpoint.trim().to_string();
    }
    if let Ok(model) = env::var("THEATER_MODEL") {
        cfg.model = model.trim().to_string();
    }
    cfg.credential = load_api_keys().join(",");
    Some(cfg.sanitized())
}
