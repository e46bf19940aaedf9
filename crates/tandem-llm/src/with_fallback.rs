//! Fallback wrapping: one generator standing in for another on failure.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures::Stream;
use tandem_core::{ChainError, GenerationChunk, GenerationResponse, RequestPayload};
use tracing::{debug, error, warn};

use crate::generator::{ChunkStream, Generator};

/// Where a [`FallbackStream`] is in its execution.
///
/// `NotStarted → PrimaryActive → {Done, FailedToFallback}`, then
/// `FailedToFallback → FallbackActive → Done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackPhase {
    /// Nothing has been pulled yet.
    NotStarted,
    /// Chunks are drawn from the primary generator.
    PrimaryActive,
    /// The primary failed on its first pull; the fallback is being opened.
    FailedToFallback,
    /// Chunks are drawn from the fallback generator.
    FallbackActive,
    /// Terminal.
    Done,
}

enum State {
    NotStarted,
    PrimaryActive { stream: ChunkStream, yielded: bool },
    FailedToFallback(ChainError),
    FallbackActive(ChunkStream),
    Done,
}

/// Composes a primary and a fallback generator.
///
/// If the primary fails with a recoverable error before yielding its first
/// chunk, the same payload is handed to the fallback and its output is
/// delivered instead. Failures after the first chunk are not recovered.
#[derive(Clone)]
pub struct WithFallback {
    primary: Arc<dyn Generator>,
    fallback: Arc<dyn Generator>,
}

impl WithFallback {
    /// Wraps `primary` with `fallback`.
    pub fn new(primary: Arc<dyn Generator>, fallback: Arc<dyn Generator>) -> Self {
        Self { primary, fallback }
    }

    /// Starts one execution. Each call gets a fresh state machine.
    pub fn stream(&self, payload: &RequestPayload) -> FallbackStream {
        FallbackStream {
            state: State::NotStarted,
            primary: Arc::clone(&self.primary),
            fallback: Arc::clone(&self.fallback),
            payload: payload.clone(),
            fell_back: false,
        }
    }
}

#[async_trait]
impl Generator for WithFallback {
    fn name(&self) -> &str {
        self.primary.name()
    }

    fn generate(&self, payload: &RequestPayload) -> ChunkStream {
        Box::pin(self.stream(payload))
    }

    async fn generate_sync(&self, payload: &RequestPayload) -> Result<GenerationResponse, ChainError> {
        match self.primary.generate_sync(payload).await {
            Err(err) if err.is_recoverable() => {
                warn!(
                    "Primary generator '{}' failed ({}), falling back to '{}'",
                    self.primary.name(),
                    err,
                    self.fallback.name()
                );
                self.fallback.generate_sync(payload).await
            }
            other => other,
        }
    }
}

/// One execution of a [`WithFallback`] generator.
///
/// The primary stream is opened on the first poll, so a provider that only
/// fails once it is asked for output is still caught at the first-pull
/// boundary.
pub struct FallbackStream {
    state: State,
    primary: Arc<dyn Generator>,
    fallback: Arc<dyn Generator>,
    payload: RequestPayload,
    fell_back: bool,
}

impl FallbackStream {
    /// The current phase of the state machine.
    pub fn phase(&self) -> FallbackPhase {
        match self.state {
            State::NotStarted => FallbackPhase::NotStarted,
            State::PrimaryActive { .. } => FallbackPhase::PrimaryActive,
            State::FailedToFallback(_) => FallbackPhase::FailedToFallback,
            State::FallbackActive(_) => FallbackPhase::FallbackActive,
            State::Done => FallbackPhase::Done,
        }
    }

    /// Returns `true` once the fallback has taken over this execution.
    pub fn fell_back(&self) -> bool {
        self.fell_back
    }
}

impl Stream for FallbackStream {
    type Item = Result<GenerationChunk, ChainError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            match &mut this.state {
                State::NotStarted => {
                    debug!("Opening primary generator '{}'", this.primary.name());
                    this.state = State::PrimaryActive {
                        stream: this.primary.generate(&this.payload),
                        yielded: false,
                    };
                }
                State::PrimaryActive { stream, yielded } => match stream.as_mut().poll_next(cx) {
                    Poll::Pending => return Poll::Pending,
                    Poll::Ready(Some(Ok(chunk))) => {
                        *yielded = true;
                        return Poll::Ready(Some(Ok(chunk)));
                    }
                    Poll::Ready(Some(Err(err))) if !*yielded && err.is_recoverable() => {
                        this.state = State::FailedToFallback(err);
                    }
                    Poll::Ready(Some(Err(err))) => {
                        error!("Primary generator '{}' failed: {}", this.primary.name(), err);
                        this.state = State::Done;
                        return Poll::Ready(Some(Err(err)));
                    }
                    Poll::Ready(None) => {
                        this.state = State::Done;
                        return Poll::Ready(None);
                    }
                },
                State::FailedToFallback(err) => {
                    warn!(
                        "Primary generator '{}' failed before its first chunk ({}), falling back to '{}'",
                        this.primary.name(),
                        err,
                        this.fallback.name()
                    );
                    // Dropping the primary stream discards anything it had buffered.
                    this.fell_back = true;
                    this.state = State::FallbackActive(this.fallback.generate(&this.payload));
                }
                State::FallbackActive(stream) => match stream.as_mut().poll_next(cx) {
                    Poll::Pending => return Poll::Pending,
                    Poll::Ready(Some(item)) => return Poll::Ready(Some(item)),
                    Poll::Ready(None) => {
                        this.state = State::Done;
                        return Poll::Ready(None);
                    }
                },
                State::Done => return Poll::Ready(None),
            }
        }
    }
}

impl std::fmt::Debug for FallbackStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FallbackStream")
            .field("phase", &self.phase())
            .field("primary", &self.primary.name())
            .field("fallback", &self.fallback.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use futures::{StreamExt, TryStreamExt};
    use tandem_core::Message;

    use super::*;
    use crate::{FallbackGenerator, GeneratorExt, ScriptedGenerator};

    fn payload() -> RequestPayload {
        RequestPayload::new(vec![Message::user("Tell me a joke about bears")])
    }

    fn text(chunks: &[GenerationChunk]) -> String {
        chunks.iter().filter_map(|c| c.content.as_deref()).collect()
    }

    #[tokio::test]
    async fn primary_success_never_touches_fallback() {
        let primary = Arc::new(ScriptedGenerator::succeeding("Why don't bears wear shoes?"));
        let fallback = Arc::new(ScriptedGenerator::succeeding("canned"));
        let wrapped = WithFallback::new(primary.clone(), fallback.clone());

        let mut stream = wrapped.stream(&payload());
        assert_eq!(stream.phase(), FallbackPhase::NotStarted);

        let mut chunks = Vec::new();
        while let Some(chunk) = stream.next().await {
            chunks.push(chunk.unwrap());
            assert_eq!(stream.phase(), FallbackPhase::PrimaryActive);
        }

        assert_eq!(text(&chunks), "Why don't bears wear shoes?");
        assert_eq!(stream.phase(), FallbackPhase::Done);
        assert!(!stream.fell_back());
        assert_eq!(primary.calls(), 1);
        assert_eq!(fallback.calls(), 0);
    }

    #[tokio::test]
    async fn first_pull_failure_switches_to_fallback() {
        for err in [
            ChainError::Authentication("invalid api key".into()),
            ChainError::ModelNotFound("no such model".into()),
            ChainError::Transport("connection refused".into()),
        ] {
            let primary = Arc::new(ScriptedGenerator::failing(err));
            let wrapped = primary.clone().with_fallback(FallbackGenerator::new("canned"));

            let mut stream = wrapped.stream(&payload());
            let first = stream.next().await.unwrap().unwrap();
            assert_eq!(first.content.as_deref(), Some("c"));
            assert_eq!(stream.phase(), FallbackPhase::FallbackActive);
            assert!(stream.fell_back());

            let rest: Vec<GenerationChunk> = stream.try_collect().await.unwrap();
            assert_eq!(text(&rest), "anned");
            assert_eq!(primary.calls(), 1);
        }
    }

    #[tokio::test]
    async fn failure_is_detected_at_pull_time_not_call_time() {
        let primary = Arc::new(ScriptedGenerator::failing(ChainError::Transport("down".into())));
        let fallback = Arc::new(FallbackGenerator::new("ok"));
        let wrapped = WithFallback::new(primary.clone(), fallback);

        let stream = wrapped.stream(&payload());
        assert_eq!(primary.calls(), 0);
        assert_eq!(stream.phase(), FallbackPhase::NotStarted);
        drop(stream);

        let chunks: Vec<GenerationChunk> = wrapped.generate(&payload()).try_collect().await.unwrap();
        assert_eq!(text(&chunks), "ok");
    }

    #[tokio::test]
    async fn fallback_receives_original_payload() {
        let primary = Arc::new(ScriptedGenerator::failing(ChainError::Authentication("bad".into())));
        let fallback = Arc::new(ScriptedGenerator::succeeding("x"));
        let wrapped = WithFallback::new(primary, fallback.clone());

        let _: Vec<GenerationChunk> = wrapped.generate(&payload()).try_collect().await.unwrap();
        assert_eq!(fallback.last_payload(), Some(payload()));
    }

    #[tokio::test]
    async fn late_failure_propagates_after_primary_output() {
        let primary = Arc::new(
            ScriptedGenerator::succeeding("Why").then_fail(ChainError::Transport("reset".into())),
        );
        let fallback = Arc::new(ScriptedGenerator::succeeding("canned"));
        let wrapped = WithFallback::new(primary, fallback.clone());

        let mut stream = wrapped.stream(&payload());
        let mut seen = String::new();
        let mut failure = None;
        while let Some(item) = stream.next().await {
            match item {
                Ok(chunk) => seen.push_str(chunk.content.as_deref().unwrap_or_default()),
                Err(err) => failure = Some(err),
            }
        }

        assert_eq!(seen, "Why");
        assert_eq!(failure, Some(ChainError::Transport("reset".into())));
        assert_eq!(stream.phase(), FallbackPhase::Done);
        assert_eq!(fallback.calls(), 0);
    }

    #[tokio::test]
    async fn unrecoverable_first_failure_propagates() {
        let primary = Arc::new(ScriptedGenerator::failing(ChainError::MalformedResponse("no text".into())));
        let fallback = Arc::new(ScriptedGenerator::succeeding("canned"));
        let wrapped = WithFallback::new(primary, fallback.clone());

        let result: Result<Vec<GenerationChunk>, ChainError> = wrapped.generate(&payload()).try_collect().await;
        assert!(matches!(result, Err(ChainError::MalformedResponse(_))));
        assert_eq!(fallback.calls(), 0);
    }

    #[tokio::test]
    async fn sync_falls_back_on_recoverable_error() {
        let primary = Arc::new(ScriptedGenerator::failing(ChainError::Authentication("bad".into())));
        let wrapped = primary.with_fallback(FallbackGenerator::new("canned"));

        let response = wrapped.generate_sync(&payload()).await.unwrap();
        assert_eq!(response.content.as_deref(), Some("canned"));
    }

    #[tokio::test]
    async fn each_stream_is_a_fresh_execution() {
        let primary = Arc::new(ScriptedGenerator::failing(ChainError::Transport("down".into())));
        let wrapped = primary.clone().with_fallback(FallbackGenerator::new("ab"));

        for _ in 0..2 {
            let chunks: Vec<GenerationChunk> = wrapped.generate(&payload()).try_collect().await.unwrap();
            assert_eq!(text(&chunks), "ab");
        }
        assert_eq!(primary.calls(), 2);
    }
}
