//! Boundary to the chat application that embeds the add-on.
//!
//! The host owns the conversation, its own generation channel and the
//! system-level notification permission. Everything here is best-effort from
//! the core's point of view.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::notify::Notification;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextMessage {
    pub name: String,
    pub text: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ConversationContext {
    #[serde(default)]
    pub messages: Vec<ContextMessage>,
}

impl ConversationContext {
    /// The last `limit` messages, oldest first.
    pub fn recent(&self, limit: usize) -> &[ContextMessage] {
        let start = self.messages.len().saturating_sub(limit);
        &self.messages[start..]
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateOptions {
    pub temperature: f64,
    pub max_output_tokens: u32,
}

/// Output surfaced back into the host conversation after a successful task.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HostEntry {
    pub module: String,
    pub task_id: String,
    pub content: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HostError {
    #[error("host channel unavailable")]
    Unavailable,
    #[error("host request failed: {0}")]
    Request(String),
    #[error("host rejected request with status {0}")]
    Rejected(u16),
}

#[async_trait]
pub trait HostBridge: Send + Sync {
    async fn generate(&self, prompt: &str, options: &GenerateOptions) -> Result<String, HostError>;

    async fn conversation_context(&self) -> Result<ConversationContext, HostError>;

    async fn append_message(&self, entry: &HostEntry) -> Result<(), HostError>;

    async fn system_notify(&self, _notification: &Notification) -> Result<(), HostError> {
        Err(HostError::Unavailable)
    }
}

/// Used when the core runs without a host attached.
#[derive(Clone, Copy, Debug, Default)]
pub struct DetachedHost;

#[async_trait]
impl HostBridge for DetachedHost {
    async fn generate(&self, _prompt: &str, _options: &GenerateOptions) -> Result<String, HostError> {
        Err(HostError::Unavailable)
    }

    async fn conversation_context(&self) -> Result<ConversationContext, HostError> {
        Ok(ConversationContext::default())
    }

    async fn append_message(&self, _entry: &HostEntry) -> Result<(), HostError> {
        Ok(())
    }
}

#[derive(Deserialize)]
struct GenerateReply {
    text: String,
}

/// Talks to a host extension endpoint over HTTP.
pub struct HttpHostBridge {
    base_url: String,
    client: Client,
}

impl HttpHostBridge {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

fn request_error(err: reqwest::Error) -> HostError {
    HostError::Request(err.without_url().to_string())
}

#[async_trait]
impl HostBridge for HttpHostBridge {
    async fn generate(&self, prompt: &str, options: &GenerateOptions) -> Result<String, HostError> {
        let resp = self
            .client
            .post(self.url("/generate"))
            .json(&serde_json::json!({ "prompt": prompt, "options": options }))
            .send()
            .await
            .map_err(request_error)?;
        let status = resp.status();
        if status.as_u16() == 404 || status.as_u16() == 501 {
            return Err(HostError::Unavailable);
        }
        if !status.is_success() {
            return Err(HostError::Rejected(status.as_u16()));
        }
        let reply: GenerateReply = resp.json().await.map_err(request_error)?;
        Ok(reply.text)
    }

    async fn conversation_context(&self) -> Result<ConversationContext, HostError> {
        let resp = self
            .client
            .get(self.url("/context"))
            .send()
            .await
            .map_err(request_error)?;
        if !resp.status().is_success() {
            return Err(HostError::Rejected(resp.status().as_u16()));
        }
        resp.json::<ConversationContext>().await.map_err(request_error)
    }

    async fn append_message(&self, entry: &HostEntry) -> Result<(), HostError> {
        let resp = self
            .client
            .post(self.url("/messages"))
            .json(entry)
            .send()
            .await
            .map_err(request_error)?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(HostError::Rejected(resp.status().as_u16()))
        }
    }

    async fn system_notify(&self, notification: &Notification) -> Result<(), HostError> {
        let resp = self
            .client
            .post(self.url("/notify"))
            .json(notification)
            .send()
            .await
            .map_err(request_error)?;
        if resp.status().is_success() {
            Ok(())
        } else {
            // 403 means the user never granted notification permission.
            Err(HostError::Unavailable)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recent_takes_tail() {
        let ctx = ConversationContext {
            messages: (0..5)
                .map(|i| ContextMessage {
                    name: "u".into(),
                    text: i.to_string(),
                })
                .collect(),
        };
        let tail: Vec<&str> = ctx.recent(2).iter().map(|m| m.text.as_str()).collect();
        assert_eq!(tail, vec!["3", "4"]);
        assert_eq!(ctx.recent(50).len(), 5);
        assert!(ctx.recent(0).is_empty());
    }

    #[tokio::test]
    async fn detached_host_has_no_generation() {
        let host = DetachedHost;
        let opts = GenerateOptions {
            temperature: 0.5,
            max_output_tokens: 10,
        };
        assert_eq!(host.generate("x", &opts).await, Err(HostError::Unavailable));
        assert!(host.conversation_context().await.unwrap().messages.is_empty());
    }
}
