//! Core domain types and error definitions for tandem.
//!
//! This crate provides the fundamental types shared across the tandem workspace:
//!
//! - [`ChainError`] — Error type for formatting, generation, and delivery
//! - [`Message`] and [`MessageRole`] — Conversation message types
//! - [`RequestPayload`] — The formatted request handed to a generator
//! - [`GenerationChunk`] and [`GenerationResponse`] — Streaming and atomic generator output
//!
//! # Example
//!
//! ```rust
//! use tandem_core::{GenerationChunk, Message, RequestPayload};
//!
//! let payload = RequestPayload::new(vec![Message::user("Tell me a joke about bears")]);
//! assert_eq!(payload.text(), "Tell me a joke about bears");
//!
//! let chunk = GenerationChunk::new("W");
//! assert_eq!(chunk.content.as_deref(), Some("W"));
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while executing a chain.
///
/// `Authentication`, `ModelNotFound` and `Transport` are the primary
/// generator's failure kinds; see [`ChainError::is_recoverable`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    /// The prompt template is malformed or does not match the supplied variables.
    #[error("Invalid prompt template: {0}")]
    Template(String),

    /// The provider rejected the credential.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// The provider does not recognise the model identifier.
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    /// Network or protocol failure talking to the provider.
    #[error("Transport error: {0}")]
    Transport(String),

    /// A generator response carried no text.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// A stage received a value of the wrong kind from its upstream stage.
    #[error("Stage '{stage}' expected {expected}, got {found}")]
    StageInput {
        stage: String,
        expected: &'static str,
        found: &'static str,
    },

    /// The display surface refused an update.
    #[error("Display error: {0}")]
    Display(String),
}

impl ChainError {
    /// Returns `true` for the failure kinds a fallback generator may absorb.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ChainError::Authentication(_) | ChainError::ModelNotFound(_) | ChainError::Transport(_)
        )
    }

    /// Short machine-readable label, used in logs and SSE error events.
    pub fn kind(&self) -> &'static str {
        match self {
            ChainError::Template(_) => "template",
            ChainError::Authentication(_) => "authentication",
            ChainError::ModelNotFound(_) => "model_not_found",
            ChainError::Transport(_) => "transport",
            ChainError::MalformedResponse(_) => "malformed_response",
            ChainError::StageInput { .. } => "stage_input",
            ChainError::Display(_) => "display",
        }
    }
}

impl From<serde_json::Error> for ChainError {
    fn from(err: serde_json::Error) -> Self {
        ChainError::MalformedResponse(err.to_string())
    }
}

/// Role of a message in a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// Instructions for the model.
    System,
    /// Message from the user.
    User,
    /// Message from the assistant/LLM.
    Assistant,
}

/// A single message in a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// The role of the message sender.
    pub role: MessageRole,
    /// The content of the message.
    pub content: String,
}

impl Message {
    /// Creates a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: MessageRole::System, content: content.into() }
    }

    /// Creates a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: MessageRole::User, content: content.into() }
    }

    /// Creates a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: MessageRole::Assistant, content: content.into() }
    }
}

/// A fully formed request for a generator.
///
/// Immutable once built: the messages are only reachable through shared
/// references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestPayload {
    messages: Vec<Message>,
}

impl RequestPayload {
    /// Creates a payload from an ordered list of messages.
    pub fn new(messages: Vec<Message>) -> Self {
        Self { messages }
    }

    /// The messages in request order.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Rendered text of the payload: message contents joined by newlines.
    pub fn text(&self) -> String {
        self.messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Token usage reported by a provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// One increment of a streaming generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationChunk {
    /// Text carried by this increment. `None` marks a malformed chunk.
    pub content: Option<String>,
    /// Model name echoed by the provider, if any.
    #[serde(default)]
    pub model: Option<String>,
}

impl GenerationChunk {
    /// Creates a chunk carrying `content`.
    pub fn new(content: impl Into<String>) -> Self {
        Self { content: Some(content.into()), model: None }
    }

    /// Attaches the provider's model name.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

/// Complete output of an atomic generation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationResponse {
    /// Generated text. `None` marks a malformed response.
    pub content: Option<String>,
    /// Model name echoed by the provider, if any.
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub usage: TokenUsage,
    #[serde(default)]
    pub elapsed_ms: u64,
}

impl GenerationResponse {
    /// Creates a response carrying `content` with no metadata.
    pub fn new(content: impl Into<String>) -> Self {
        Self { content: Some(content.into()), ..Default::default() }
    }
}
