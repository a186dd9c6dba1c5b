//! Append-only conversation memory shared by the agents of one run.

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// Author of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
    Function,
    Developer,
}

/// A single `{role, content}` message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }
}

/// FIFO message log. Nothing is ever removed during a run.
#[derive(Debug, Default)]
pub struct Memory {
    messages: RwLock<Vec<Message>>,
}

impl Memory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn append(&self, message: Message) {
        self.messages.write().await.push(message);
    }

    pub async fn extend(&self, messages: impl IntoIterator<Item = Message>) {
        self.messages.write().await.extend(messages);
    }

    /// Snapshot of all messages in insertion order
    pub async fn messages(&self) -> Vec<Message> {
        self.messages.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.messages.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.messages.read().await.is_empty()
    }
}
