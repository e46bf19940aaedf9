//! The generator abstraction shared by every generation stage.

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures::Stream;
use tandem_core::{ChainError, GenerationChunk, GenerationResponse, RequestPayload};

use crate::with_fallback::WithFallback;

/// A lazy, single-pass stream of generation chunks.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<GenerationChunk, ChainError>> + Send>>;

/// A component that turns a [`RequestPayload`] into generated text.
///
/// Implementations must keep [`generate`](Generator::generate) lazy: building
/// the stream performs no I/O, and any failure surfaces as the stream's first
/// item.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Returns a name for logging.
    fn name(&self) -> &str;

    /// Opens a lazy stream of chunks for `payload`.
    fn generate(&self, payload: &RequestPayload) -> ChunkStream;

    /// Produces the complete response for `payload` in one call.
    async fn generate_sync(&self, payload: &RequestPayload) -> Result<GenerationResponse, ChainError>;
}

#[async_trait]
impl<G: Generator + ?Sized> Generator for Arc<G> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn generate(&self, payload: &RequestPayload) -> ChunkStream {
        (**self).generate(payload)
    }

    async fn generate_sync(&self, payload: &RequestPayload) -> Result<GenerationResponse, ChainError> {
        (**self).generate_sync(payload).await
    }
}

/// Fluent configuration for generators.
pub trait GeneratorExt: Generator + Sized + 'static {
    /// Wraps `self` so that a first-pull failure is answered by `fallback`.
    fn with_fallback<F: Generator + 'static>(self, fallback: F) -> WithFallback {
        WithFallback::new(Arc::new(self), Arc::new(fallback))
    }
}

impl<G: Generator + Sized + 'static> GeneratorExt for G {}
