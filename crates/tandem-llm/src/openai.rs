//! OpenAI-compatible primary generator with streaming support.
//!
//! Works with the OpenAI API and any compatible endpoint (including Ollama's /v1 endpoint).

use std::time::Instant;

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        ChatCompletionStreamOptions, CreateChatCompletionRequest, CreateChatCompletionRequestArgs,
        CreateChatCompletionResponse, CreateChatCompletionStreamResponse,
    },
    Client,
};
use async_trait::async_trait;
use futures::{future, stream, StreamExt, TryStreamExt};
use tandem_core::{ChainError, GenerationChunk, GenerationResponse, MessageRole, RequestPayload, TokenUsage};
use tracing::{debug, info};

use crate::generator::{ChunkStream, Generator};

/// Maps a provider error onto the primary generator's failure kinds.
fn classify(err: OpenAIError) -> ChainError {
    match err {
        OpenAIError::ApiError(api) => match api.code.as_deref() {
            Some("invalid_api_key") => ChainError::Authentication(api.message),
            Some("model_not_found") => ChainError::ModelNotFound(api.message),
            _ => classify_message(api.message),
        },
        OpenAIError::Reqwest(e) => match e.status().map(|s| s.as_u16()) {
            Some(401) | Some(403) => ChainError::Authentication(e.to_string()),
            Some(404) => ChainError::ModelNotFound(e.to_string()),
            _ => ChainError::Transport(e.to_string()),
        },
        OpenAIError::StreamError(message) => classify_message(message),
        other => ChainError::Transport(other.to_string()),
    }
}

/// Streaming failures only carry a rendered message.
fn classify_message(message: String) -> ChainError {
    let lower = message.to_lowercase();
    if lower.contains("invalid_api_key") || lower.contains("401") || lower.contains("unauthorized") {
        return ChainError::Authentication(message);
    }
    if lower.contains("model_not_found") || lower.contains("404") || lower.contains("does not exist") {
        return ChainError::ModelNotFound(message);
    }
    ChainError::Transport(message)
}

/// Converts the payload's messages into chat-completion messages.
fn build_messages(payload: &RequestPayload) -> Result<Vec<ChatCompletionRequestMessage>, ChainError> {
    payload
        .messages()
        .iter()
        .map(|msg| {
            let built = match msg.role {
                MessageRole::System => ChatCompletionRequestSystemMessageArgs::default()
                    .content(msg.content.as_str())
                    .build()
                    .map(ChatCompletionRequestMessage::System),
                MessageRole::User => ChatCompletionRequestUserMessageArgs::default()
                    .content(msg.content.as_str())
                    .build()
                    .map(ChatCompletionRequestMessage::User),
                MessageRole::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
                    .content(msg.content.as_str())
                    .build()
                    .map(ChatCompletionRequestMessage::Assistant),
            };
            built.map_err(classify)
        })
        .collect()
}

/// Extracts content and metrics from a completion response.
///
/// A missing content field is left as `None` for the normalizer to reject.
fn extract_response(response: CreateChatCompletionResponse, elapsed_ms: u64) -> GenerationResponse {
    let usage = response
        .usage
        .map(|u| TokenUsage { input_tokens: u.prompt_tokens, output_tokens: u.completion_tokens })
        .unwrap_or_default();

    info!(
        "LLM: {}ms, tokens: {}/{} (in/out)",
        elapsed_ms, usage.input_tokens, usage.output_tokens
    );

    let content = response.choices.into_iter().next().and_then(|c| c.message.content);

    GenerationResponse {
        content,
        model: Some(response.model),
        usage,
        elapsed_ms,
    }
}

/// Turns one stream event into a chunk, skipping usage and role-only events.
fn extract_chunk(response: CreateChatCompletionStreamResponse) -> Option<GenerationChunk> {
    if let Some(usage) = &response.usage {
        info!("LLM stream tokens: {}/{} (in/out)", usage.prompt_tokens, usage.completion_tokens);
    }
    let content = response.choices.into_iter().next()?.delta.content?;
    if content.is_empty() {
        return None;
    }
    Some(GenerationChunk::new(content).with_model(response.model))
}

/// Primary generator for OpenAI-compatible chat completion APIs.
///
/// The model identifier and credential are passed to the provider unmodified;
/// their validity is only known once a request is made.
pub struct OpenAiGenerator {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiGenerator {
    /// Creates a generator for `model`, authenticating with `api_key`.
    pub fn new(model: &str, api_key: &str, api_base: Option<&str>) -> Self {
        let config = OpenAIConfig::new().with_api_key(api_key);
        let config = match api_base {
            Some(base) => config.with_api_base(base),
            None => config,
        };

        Self {
            client: Client::with_config(config),
            model: model.to_string(),
        }
    }

    /// The configured model identifier.
    pub fn model(&self) -> &str {
        &self.model
    }

    fn request(&self, payload: &RequestPayload, stream: bool) -> Result<CreateChatCompletionRequest, ChainError> {
        let mut builder = CreateChatCompletionRequestArgs::default();
        builder.model(&self.model).messages(build_messages(payload)?);
        if stream {
            builder.stream_options(ChatCompletionStreamOptions { include_usage: true });
        }
        builder.build().map_err(classify)
    }
}

#[async_trait]
impl Generator for OpenAiGenerator {
    fn name(&self) -> &str {
        &self.model
    }

    fn generate(&self, payload: &RequestPayload) -> ChunkStream {
        let request = match self.request(payload, true) {
            Ok(request) => request,
            Err(e) => return Box::pin(stream::once(future::ready(Err(e)))),
        };
        let client = self.client.clone();
        let model = self.model.clone();

        let opened = async move {
            debug!("Opening completion stream for model '{}'", model);
            let events = client.chat().create_stream(request).await.map_err(classify)?;
            Ok::<_, ChainError>(
                events
                    .map_err(classify)
                    .try_filter_map(|event| future::ready(Ok(extract_chunk(event)))),
            )
        };

        Box::pin(stream::once(opened).try_flatten())
    }

    async fn generate_sync(&self, payload: &RequestPayload) -> Result<GenerationResponse, ChainError> {
        let start = Instant::now();
        let request = self.request(payload, false)?;
        let response = self.client.chat().create(request).await.map_err(classify)?;
        Ok(extract_response(response, start.elapsed().as_millis() as u64))
    }
}
