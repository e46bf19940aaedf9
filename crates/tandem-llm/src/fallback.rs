//! The canned fallback generator and its message registry.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream;
use tandem_core::{ChainError, GenerationChunk, GenerationResponse, RequestPayload};

use crate::generator::{ChunkStream, Generator};

/// The explainer streamed whenever the primary model cannot answer.
pub const CANNED_EXPLAINER: &str = include_str!("explainer.md");

const FALLBACK_NAME: &str = "fallback";

/// Lookup of canned responses by topic.
///
/// Two shapes are supported. [`canned`](Self::canned) holds only a default and
/// answers every topic with it; [`with_topic`](Self::with_topic) adds keyed
/// entries that take precedence for their topic.
#[derive(Debug, Clone)]
pub struct FallbackMessageRegistry {
    default: String,
    by_topic: HashMap<String, String>,
}

impl Default for FallbackMessageRegistry {
    fn default() -> Self {
        Self::canned()
    }
}

impl FallbackMessageRegistry {
    /// Creates a topic-invariant registry answering with `default`.
    pub fn new(default: impl Into<String>) -> Self {
        Self { default: default.into(), by_topic: HashMap::new() }
    }

    /// The topic-invariant registry holding the canned explainer.
    pub fn canned() -> Self {
        Self::new(CANNED_EXPLAINER)
    }

    /// Adds a message for one topic.
    pub fn with_topic(mut self, topic: impl Into<String>, message: impl Into<String>) -> Self {
        self.by_topic.insert(topic.into(), message.into());
        self
    }

    /// Returns the message for `topic`, or the default.
    pub fn get(&self, topic: &str) -> &str {
        self.by_topic.get(topic).unwrap_or(&self.default)
    }

    /// Returns `true` if every topic receives the same message.
    pub fn is_topic_invariant(&self) -> bool {
        self.by_topic.is_empty()
    }
}

/// A generator that ignores its payload and always yields one fixed response.
///
/// Streaming delivers the response one character per chunk; it never fails.
#[derive(Debug, Clone)]
pub struct FallbackGenerator {
    response: Arc<str>,
}

impl FallbackGenerator {
    /// Creates a generator that always answers with `response`.
    pub fn new(response: impl Into<String>) -> Self {
        Self { response: Arc::from(response.into()) }
    }

    /// The fixed response.
    pub fn response(&self) -> &str {
        &self.response
    }
}

#[async_trait]
impl Generator for FallbackGenerator {
    fn name(&self) -> &str {
        FALLBACK_NAME
    }

    fn generate(&self, _payload: &RequestPayload) -> ChunkStream {
        let chunks: Vec<Result<GenerationChunk, ChainError>> = self
            .response
            .chars()
            .map(|c| Ok(GenerationChunk::new(c).with_model(FALLBACK_NAME)))
            .collect();
        Box::pin(stream::iter(chunks))
    }

    async fn generate_sync(&self, _payload: &RequestPayload) -> Result<GenerationResponse, ChainError> {
        Ok(GenerationResponse {
            model: Some(FALLBACK_NAME.to_string()),
            ..GenerationResponse::new(self.response.as_ref())
        })
    }
}
