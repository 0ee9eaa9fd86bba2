use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::CompletionError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptRole {
    System,
    User,
    Assistant,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: PromptRole,
    pub content: String,
}

impl PromptMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: PromptRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: PromptRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: PromptRole::Assistant,
            content: content.into(),
        }
    }
}

/// A single request to the Completion Service.
#[derive(Clone, Debug, PartialEq)]
pub struct CompletionRequest {
    pub messages: Vec<PromptMessage>,
    pub temperature: f64,
    pub max_tokens: Option<u32>,
}

impl CompletionRequest {
    /// Zero-temperature request, so identical state gives stable output.
    pub fn deterministic(messages: Vec<PromptMessage>) -> Self {
        Self {
            messages,
            temperature: 0.0,
            max_tokens: None,
        }
    }

    /// Convenience for the single-prompt call sites.
    pub fn prompt(text: impl Into<String>) -> Self {
        Self::deterministic(vec![PromptMessage::user(text)])
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// All message contents joined, for assertions and debug logging.
    pub fn flattened(&self) -> String {
        self.messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Stateless text generation. Implemented by HTTP clients, wrappers and mocks.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    fn name(&self) -> &str;
    fn model(&self) -> &str;

    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError>;
}
