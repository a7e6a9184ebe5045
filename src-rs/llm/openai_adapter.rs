use serde_json::{json, Value};

use super::transport::WireRequest;
use super::types::{Message, ProviderConfig, ProviderError};

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

pub fn build_request(cfg: &ProviderConfig, messages: &[Message], api_key: &str) -> WireRequest {
    let base = if cfg.endpoint.trim().is_empty() {
        OPENAI_BASE_URL
    } else {
        cfg.endpoint.trim()
    };
    let base = base.trim_end_matches('/');
    let url = if base.ends_with("/chat/completions") {
        base.to_string()
    } else {
        format!("{}/chat/completions", base)
    };

    let turns: Vec<Value> = messages
        .iter()
        .map(|msg| json!({"role": msg.role.as_str(), "content": msg.content}))
        .collect();

    WireRequest {
        url,
        bearer: Some(api_key.to_string()),
        body: json!({
            "model": cfg.model,
            "messages": turns,
            "temperature": cfg.temperature,
            "max_tokens": cfg.max_output_tokens,
            "stream": false
        }),
    }
}

pub fn parse_response(raw: &Value) -> Result<String, ProviderError> {
    let content = raw
        .get("choices")
        .and_then(|v| v.as_array())
        .and_then(|list| list.first())
        .and_then(|choice| choice.get("message"))
        .and_then(|message| message.get("content"))
        .and_then(|v| v.as_str())
        .ok_or_else(|| ProviderError::InvalidResponseShape("missing choices[0].message.content".into()))?;
    if content.trim().is_empty() {
        return Err(ProviderError::InvalidResponseShape("empty message content".into()));
    }
    Ok(content.to_string())
}
