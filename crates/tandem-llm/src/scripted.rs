//! A generator that replays a fixed script, for demos and tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use futures::stream;
use tandem_core::{ChainError, GenerationChunk, GenerationResponse, RequestPayload};

use crate::generator::{ChunkStream, Generator};

/// Replays scripted chunks and an optional trailing failure.
///
/// Failures are delivered as stream items, never at call time, the way a
/// real provider reports them once its connection is attempted.
#[derive(Debug, Default)]
pub struct ScriptedGenerator {
    chunks: Vec<String>,
    failure: Option<ChainError>,
    calls: AtomicUsize,
    last_payload: Mutex<Option<RequestPayload>>,
}

impl ScriptedGenerator {
    /// Succeeds with `text`, one character per chunk.
    pub fn succeeding(text: &str) -> Self {
        Self::from_chunks(text.chars().map(String::from))
    }

    /// Succeeds with the given chunks, in order.
    pub fn from_chunks<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            chunks: chunks.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Fails with `err` on the first pull.
    pub fn failing(err: ChainError) -> Self {
        Self { failure: Some(err), ..Default::default() }
    }

    /// Fails with `err` after the scripted chunks.
    pub fn then_fail(mut self, err: ChainError) -> Self {
        self.failure = Some(err);
        self
    }

    /// Number of `generate` and `generate_sync` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The payload of the most recent call.
    pub fn last_payload(&self) -> Option<RequestPayload> {
        self.payload_slot().clone()
    }

    fn payload_slot(&self) -> MutexGuard<'_, Option<RequestPayload>> {
        self.last_payload.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, payload: &RequestPayload) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.payload_slot() = Some(payload.clone());
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    fn name(&self) -> &str {
        "scripted"
    }

    fn generate(&self, payload: &RequestPayload) -> ChunkStream {
        self.record(payload);
        let items: Vec<Result<GenerationChunk, ChainError>> = self
            .chunks
            .iter()
            .map(|c| Ok(GenerationChunk::new(c.as_str())))
            .chain(self.failure.clone().map(Err))
            .collect();
        Box::pin(stream::iter(items))
    }

    async fn generate_sync(&self, payload: &RequestPayload) -> Result<GenerationResponse, ChainError> {
        self.record(payload);
        match &self.failure {
            Some(err) => Err(err.clone()),
            None => Ok(GenerationResponse::new(self.chunks.concat())),
        }
    }
}
