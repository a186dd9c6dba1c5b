//! Chat-completion capability.
//!
//! The engine only ever uses chat output as advisory text, so every
//! implementation here is interchangeable from a correctness standpoint.

use crate::error::{Error, Result};
use crate::memory::Message;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Token accounting reported by a provider
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// A completed chat response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub content: String,
    pub token_usage: Option<TokenUsage>,
}

impl ChatResponse {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            token_usage: None,
        }
    }
}

/// `Chat.Completions` capability
#[async_trait]
pub trait ChatCompletions: Send + Sync + std::fmt::Debug {
    /// Provider name for logging
    fn name(&self) -> &str;

    /// Complete a conversation
    async fn complete(&self, messages: &[Message], model: Option<&str>) -> Result<ChatResponse>;
}

/// Chat stub that always answers with the same text
#[derive(Debug, Clone)]
pub struct StaticChat {
    reply: String,
}

impl StaticChat {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
        }
    }
}

#[async_trait]
impl ChatCompletions for StaticChat {
    fn name(&self) -> &str {
        "static"
    }

    async fn complete(&self, messages: &[Message], _model: Option<&str>) -> Result<ChatResponse> {
        let prompt_tokens = messages
            .iter()
            .map(|m| m.content.split_whitespace().count() as u32)
            .sum();
        let completion_tokens = self.reply.split_whitespace().count() as u32;

        Ok(ChatResponse {
            content: self.reply.clone(),
            token_usage: Some(TokenUsage {
                prompt_tokens,
                completion_tokens,
                total_tokens: prompt_tokens + completion_tokens,
            }),
        })
    }
}

/// Chat used when no model is configured; every call fails
#[derive(Debug, Clone, Default)]
pub struct NoopChat;

impl NoopChat {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ChatCompletions for NoopChat {
    fn name(&self) -> &str {
        "noop"
    }

    async fn complete(&self, _messages: &[Message], _model: Option<&str>) -> Result<ChatResponse> {
        Err(Error::llm("no chat model configured"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_chat_echoes_reply() {
        let chat = StaticChat::new("restart the pool");
        let response = chat
            .complete(&[Message::user("what now?")], Some("gpt-3.5-turbo"))
            .await
            .unwrap();
        assert_eq!(response.content, "restart the pool");
        assert_eq!(response.token_usage.unwrap().total_tokens, 5);
    }

    #[tokio::test]
    async fn test_noop_chat_fails() {
        let err = NoopChat::new()
            .complete(&[Message::user("hi")], None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Llm(_)));
    }
}
