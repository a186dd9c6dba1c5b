//! Collaboration context: the handles shared by every agent during one run.

use crate::chat::ChatCompletions;
use crate::clock::{Clock, SystemClock};
use crate::config::{RcaConfig, DEFAULT_LLM_MAX_PROMPT_ITEMS, DEFAULT_LLM_MODEL};
use crate::error::{Error, Result};
use crate::memory::{Memory, Message};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

/// Shared state for one `collaborate` call
#[derive(Debug)]
pub struct CollaborationContext {
    chat: Arc<dyn ChatCompletions>,
    memory: Arc<Memory>,
    clock: Arc<dyn Clock>,
    trace_id: Uuid,
    tenant_id: Option<String>,
    model: String,
    max_prompt_items: usize,
    shared_data: RwLock<HashMap<String, serde_json::Value>>,
}

impl CollaborationContext {
    /// Create a context with a fresh trace id, empty memory and the system clock
    pub fn new(chat: Arc<dyn ChatCompletions>) -> Self {
        Self {
            chat,
            memory: Arc::new(Memory::new()),
            clock: Arc::new(SystemClock),
            trace_id: Uuid::new_v4(),
            tenant_id: None,
            model: DEFAULT_LLM_MODEL.to_string(),
            max_prompt_items: DEFAULT_LLM_MAX_PROMPT_ITEMS,
            shared_data: RwLock::new(HashMap::new()),
        }
    }

    /// Create a context with model, prompt cap and tenant taken from `config`
    pub fn from_config(chat: Arc<dyn ChatCompletions>, config: &RcaConfig) -> Self {
        let mut ctx = Self::new(chat);
        ctx.model = config.llm_model.clone();
        ctx.max_prompt_items = config.llm_max_prompt_items;
        ctx.tenant_id = config.tenant_id.clone();
        ctx
    }

    pub fn with_memory(mut self, memory: Arc<Memory>) -> Self {
        self.memory = memory;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    pub fn with_trace_id(mut self, trace_id: Uuid) -> Self {
        self.trace_id = trace_id;
        self
    }

    pub fn chat(&self) -> &Arc<dyn ChatCompletions> {
        &self.chat
    }

    pub fn memory(&self) -> &Arc<Memory> {
        &self.memory
    }

    pub fn trace_id(&self) -> Uuid {
        self.trace_id
    }

    pub fn tenant_id(&self) -> Option<&str> {
        self.tenant_id.as_deref()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Maximum number of evidence/finding lines quoted in one prompt
    pub fn max_prompt_items(&self) -> usize {
        self.max_prompt_items
    }

    /// Current time in unix seconds
    pub fn now(&self) -> i64 {
        self.clock.now()
    }

    pub async fn get_shared(&self, key: &str) -> Option<serde_json::Value> {
        self.shared_data.read().await.get(key).cloned()
    }

    pub async fn set_shared(&self, key: impl Into<String>, value: serde_json::Value) {
        self.shared_data.write().await.insert(key.into(), value);
    }

    /// Sorted keys of the shared data map
    pub async fn shared_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.shared_data.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Ask the chat model for advisory text.
    ///
    /// The exchange is appended to memory. A deadline that has already passed,
    /// or passes while waiting, yields [`Error::Deadline`].
    pub async fn advise(
        &self,
        system: &str,
        prompt: String,
        deadline: Option<tokio::time::Instant>,
    ) -> Result<String> {
        let messages = vec![Message::system(system), Message::user(prompt.clone())];
        let call = self.chat.complete(&messages, Some(&self.model));

        let response = match deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, call)
                .await
                .map_err(|_| Error::deadline())?,
            None => call.await,
        };

        match response {
            Ok(response) => {
                debug!(
                    trace_id = %self.trace_id,
                    provider = self.chat.name(),
                    tokens = response.token_usage.map(|u| u.total_tokens).unwrap_or(0),
                    "Chat completion received"
                );
                self.memory
                    .extend(vec![
                        Message::user(prompt),
                        Message::assistant(response.content.clone()),
                    ])
                    .await;
                Ok(response.content)
            }
            Err(e) => {
                warn!(
                    trace_id = %self.trace_id,
                    provider = self.chat.name(),
                    error = %e,
                    "Chat completion failed"
                );
                Err(e)
            }
        }
    }
}
