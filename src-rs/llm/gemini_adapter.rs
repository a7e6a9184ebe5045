use serde_json::{json, Value};

use super::transport::WireRequest;
use super::types::{Message, ProviderConfig, ProviderError, Role};

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const GEMINI_DEFAULT_MODEL: &str = "gemini-2.0-flash";

pub fn build_request(cfg: &ProviderConfig, messages: &[Message], api_key: &str) -> WireRequest {
    let base = if cfg.endpoint.trim().is_empty() {
        GEMINI_BASE_URL
    } else {
        cfg.endpoint.trim()
    };
    let model = if cfg.model.is_empty() {
        GEMINI_DEFAULT_MODEL
    } else {
        cfg.model.as_str()
    };
    let url = format!(
        "{}/v1beta/models/{}:generateContent?key={}",
        base.trim_end_matches('/'),
        model,
        api_key
    );
    WireRequest {
        url,
        bearer: None,
        body: build_payload(messages, cfg.temperature, cfg.max_output_tokens),
    }
}

fn build_payload(messages: &[Message], temperature: f64, max_output_tokens: u32) -> Value {
    let mut contents = Vec::new();
    let mut system_parts = Vec::new();

    for msg in messages {
        if msg.role == Role::System {
            system_parts.push(json!({"text": msg.content}));
            continue;
        }
        let role = if msg.role == Role::User { "user" } else { "model" };
        contents.push(json!({
            "role": role,
            "parts": [{"text": msg.content}]
        }));
    }

    let mut payload = json!({
        "contents": contents,
        "generationConfig": {
            "temperature": temperature,
            "maxOutputTokens": max_output_tokens
        }
    });

    if !system_parts.is_empty() {
        payload["systemInstruction"] = json!({ "parts": system_parts });
    }

    payload
}

pub fn parse_response(raw: &Value) -> Result<String, ProviderError> {
    let parts = raw
        .get("candidates")
        .and_then(|v| v.as_array())
        .and_then(|list| list.first())
        .and_then(|first| first.get("content"))
        .and_then(|content| content.get("parts"))
        .and_then(|v| v.as_array())
        .ok_or_else(|| ProviderError::InvalidResponseShape("missing candidates[0].content.parts".into()))?;

    let text: String = parts
        .iter()
        .filter_map(|part| part.get("text").and_then(|v| v.as_str()))
        .collect();
    if text.trim().is_empty() {
        return Err(ProviderError::InvalidResponseShape("empty candidate text".into()));
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_goes_in_query_and_system_is_separate() {
        let cfg = ProviderConfig {
            model: "gemini-test".to_string(),
            endpoint: "https://example.test/".to_string(),
            ..ProviderConfig::default()
        };
        let messages = vec![
            Message::new(Role::System, "be brief"),
            Message::new(Role::User, "hello"),
            Message::new(Role::Assistant, "hi"),
        ];
        let req = build_request(&cfg, &messages, "k-1");
        assert_eq!(
            req.url,
            "https://example.test/v1beta/models/gemini-test:generateContent?key=k-1"
        );
        assert!(req.bearer.is_none());
        assert_eq!(req.body["contents"][0]["parts"][0]["text"], "hello");
        assert_eq!(req.body["contents"][1]["role"], "model");
        assert_eq!(req.body["systemInstruction"]["parts"][0]["text"], "be brief");
        assert!(req.body.get("messages").is_none());
    }

    #[test]
    fn parses_joined_parts() {
        let raw = json!({"candidates": [{"content": {"parts": [{"text": "a"}, {"text": "b"}]}}]});
        assert_eq!(parse_response(&raw).unwrap(), "ab");
    }

    #[test]
    fn openai_shape_is_rejected() {
        let raw = json!({"choices": [{"message": {"content": "x"}}]});
        assert!(matches!(
            parse_response(&raw),
            Err(ProviderError::InvalidResponseShape(_))
        ));
    }
}
