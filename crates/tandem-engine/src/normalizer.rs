//! Output normalization: structured generator output → plain text.

use async_trait::async_trait;
use futures::{future, TryStreamExt};
use tandem_core::{ChainError, GenerationChunk, GenerationResponse};

use crate::stage::{Stage, StageValue, ValueStream};

/// Generator output that carries a text field.
pub trait GenerationOutput {
    /// Takes the text, if present.
    fn into_text(self) -> Option<String>;
}

impl GenerationOutput for GenerationChunk {
    fn into_text(self) -> Option<String> {
        self.content
    }
}

impl GenerationOutput for GenerationResponse {
    fn into_text(self) -> Option<String> {
        self.content
    }
}

/// Extracts plain text, dropping model echoes, usage and timing.
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputNormalizer;

impl OutputNormalizer {
    /// Returns the text of `output`, or `MalformedResponse` if it has none.
    pub fn normalize<T: GenerationOutput>(&self, output: T) -> Result<String, ChainError> {
        output
            .into_text()
            .ok_or_else(|| ChainError::MalformedResponse("generator output has no text field".into()))
    }

    fn normalize_value(&self, value: StageValue) -> Result<StageValue, ChainError> {
        let text = match value {
            StageValue::Chunk(chunk) => self.normalize(chunk)?,
            StageValue::Response(response) => self.normalize(response)?,
            StageValue::Text(text) => text,
            other => {
                return Err(ChainError::StageInput {
                    stage: "normalizer".to_string(),
                    expected: "chunk or response",
                    found: other.kind(),
                })
            }
        };
        Ok(StageValue::Text(text))
    }
}

#[async_trait]
impl Stage for OutputNormalizer {
    fn name(&self) -> &str {
        "normalizer"
    }

    async fn process(&self, input: StageValue) -> Result<StageValue, ChainError> {
        self.normalize_value(input)
    }

    fn process_stream<'a>(&'a self, input: ValueStream<'a>) -> ValueStream<'a> {
        Box::pin(input.and_then(move |value| future::ready(self.normalize_value(value))))
    }
}

#[cfg(test)]
mod tests {
    use futures::{stream, StreamExt};
    use tandem_core::TokenUsage;

    use super::*;

    #[test]
    fn drops_metadata() {
        let response = GenerationResponse {
            content: Some("Why don't bears wear shoes?".into()),
            model: Some("gpt-4o-mini".into()),
            usage: TokenUsage { input_tokens: 12, output_tokens: 9 },
            elapsed_ms: 420,
        };
        assert_eq!(OutputNormalizer.normalize(response).unwrap(), "Why don't bears wear shoes?");
        assert_eq!(OutputNormalizer.normalize(GenerationChunk::new("W").with_model("m")).unwrap(), "W");
    }

    #[test]
    fn missing_text_is_malformed() {
        let chunk = GenerationChunk { content: None, model: Some("gpt-4o-mini".into()) };
        assert!(matches!(OutputNormalizer.normalize(chunk), Err(ChainError::MalformedResponse(_))));
        assert!(matches!(
            OutputNormalizer.normalize(GenerationResponse::default()),
            Err(ChainError::MalformedResponse(_))
        ));
    }

    #[tokio::test]
    async fn stream_stops_at_malformed_chunk() {
        let input: ValueStream<'static> = Box::pin(stream::iter(vec![
            Ok(StageValue::Chunk(GenerationChunk::new("a"))),
            Ok(StageValue::Chunk(GenerationChunk { content: None, model: None })),
        ]));
        let normalizer = OutputNormalizer;
        let mut out = normalizer.process_stream(input);

        assert_eq!(out.next().await, Some(Ok(StageValue::Text("a".into()))));
        assert!(matches!(out.next().await, Some(Err(ChainError::MalformedResponse(_)))));
    }
}
