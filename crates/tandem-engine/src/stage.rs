//! The stage abstraction and the values that flow between stages.

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures::{stream, Stream, StreamExt, TryStreamExt};
use tandem_core::{ChainError, GenerationChunk, GenerationResponse, RequestPayload};
use tandem_llm::Generator;
use tracing::info;

use crate::prompt::TemplateVars;

/// A value passed from one stage to the next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageValue {
    /// Template variables, the pipeline's input.
    Vars(TemplateVars),
    /// A formatted request.
    Payload(RequestPayload),
    /// One increment of a streaming generation.
    Chunk(GenerationChunk),
    /// A complete atomic generation.
    Response(GenerationResponse),
    /// Plain text.
    Text(String),
}

impl StageValue {
    /// Short name of the variant, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            StageValue::Vars(_) => "vars",
            StageValue::Payload(_) => "payload",
            StageValue::Chunk(_) => "chunk",
            StageValue::Response(_) => "response",
            StageValue::Text(_) => "text",
        }
    }

    /// Combines two streamed values into one. Only text and chunks combine.
    fn merge(self, next: StageValue, stage: &str) -> Result<StageValue, ChainError> {
        match (self, next) {
            (StageValue::Text(mut a), StageValue::Text(b)) => {
                a.push_str(&b);
                Ok(StageValue::Text(a))
            }
            (StageValue::Chunk(a), StageValue::Chunk(b)) => Ok(StageValue::Chunk(GenerationChunk {
                content: a.content.zip(b.content).map(|(a, b)| a + &b),
                model: b.model.or(a.model),
            })),
            (_, other) => Err(ChainError::StageInput {
                stage: stage.to_string(),
                expected: "a single value",
                found: other.kind(),
            }),
        }
    }
}

/// A lazy stream of stage values.
pub type ValueStream<'a> = Pin<Box<dyn Stream<Item = Result<StageValue, ChainError>> + Send + 'a>>;

/// One step of a [`Pipeline`](crate::Pipeline).
///
/// `process` handles a single input atomically. `process_stream` transforms
/// an upstream stream; the default buffers the whole upstream into one value
/// and calls `process`, which is right for stages that cannot emit partial
/// output.
#[async_trait]
pub trait Stage: Send + Sync {
    /// Returns the stage name for logging and errors.
    fn name(&self) -> &str;

    /// Processes one complete input.
    async fn process(&self, input: StageValue) -> Result<StageValue, ChainError>;

    /// Transforms an upstream stream into this stage's output stream.
    fn process_stream<'a>(&'a self, input: ValueStream<'a>) -> ValueStream<'a> {
        Box::pin(stream::once(async move {
            let value = gather(self.name(), input).await?;
            self.process(value).await
        }))
    }
}

/// Drains `input`, merging multiple values into one.
pub async fn gather(stage: &str, mut input: ValueStream<'_>) -> Result<StageValue, ChainError> {
    let mut gathered: Option<StageValue> = None;
    while let Some(value) = input.next().await {
        let value = value?;
        gathered = Some(match gathered {
            None => value,
            Some(prev) => prev.merge(value, stage)?,
        });
    }
    gathered.ok_or_else(|| ChainError::StageInput {
        stage: stage.to_string(),
        expected: "a value",
        found: "end of stream",
    })
}

/// Adapts a [`Generator`] into a pipeline stage.
///
/// Atomic execution calls `generate_sync`; streaming execution forwards each
/// chunk of `generate` as soon as it arrives.
#[derive(Clone)]
pub struct GeneratorStage {
    generator: Arc<dyn Generator>,
}

impl GeneratorStage {
    /// Wraps `generator`.
    pub fn new(generator: Arc<dyn Generator>) -> Self {
        Self { generator }
    }

    fn payload(&self, value: StageValue) -> Result<RequestPayload, ChainError> {
        match value {
            StageValue::Payload(payload) => Ok(payload),
            other => Err(ChainError::StageInput {
                stage: self.name().to_string(),
                expected: "payload",
                found: other.kind(),
            }),
        }
    }
}

#[async_trait]
impl Stage for GeneratorStage {
    fn name(&self) -> &str {
        self.generator.name()
    }

    async fn process(&self, input: StageValue) -> Result<StageValue, ChainError> {
        let payload = self.payload(input)?;
        info!("║ [{}] generating (atomic)", self.name());
        let response = self.generator.generate_sync(&payload).await?;
        Ok(StageValue::Response(response))
    }

    fn process_stream<'a>(&'a self, input: ValueStream<'a>) -> ValueStream<'a> {
        let opened = async move {
            let payload = self.payload(gather(self.name(), input).await?)?;
            info!("║ [{}] generating (stream)", self.name());
            Ok::<_, ChainError>(self.generator.generate(&payload).map_ok(StageValue::Chunk))
        };
        Box::pin(stream::once(opened).try_flatten())
    }
}
