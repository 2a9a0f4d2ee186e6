//! LLM client module for interacting with language models.
//!
//! This module provides a trait-based abstraction over the model endpoint,
//! with an OpenAI-compatible LM Studio server as the implementation.

mod error;
mod lmstudio;

pub use error::LlmError;
pub use lmstudio::LmStudioClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Role in a chat conversation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A message in a chat conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    /// Create a simple text message.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        ChatMessage {
            role,
            content: content.into(),
        }
    }
}

/// Build the message list for a single-turn completion.
///
/// An empty system instruction is omitted rather than sent as a blank message.
pub fn build_messages(prompt: &str, system: &str) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(2);
    if !system.is_empty() {
        messages.push(ChatMessage::new(Role::System, system));
    }
    messages.push(ChatMessage::new(Role::User, prompt));
    messages
}

/// Trait for LLM clients.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send a chat completion request and return the first choice's text.
    ///
    /// `model` of `None` lets the client pick its configured default.
    async fn chat_completion(
        &self,
        model: Option<&str>,
        messages: &[ChatMessage],
    ) -> Result<String, LlmError>;

    /// Probe the endpoint. Bounded by a short timeout and never errors.
    async fn check_reachable(&self) -> bool;

    /// Single-turn completion with a system instruction.
    async fn complete(
        &self,
        prompt: &str,
        system: &str,
        model: Option<&str>,
    ) -> Result<String, LlmError> {
        let messages = build_messages(prompt, system);
        self.chat_completion(model, &messages).await
    }
}
