//! Incremental delivery of pipeline output to a display surface.

use std::time::Duration;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use tandem_core::ChainError;
use tracing::{debug, info};

/// A display surface that redraws the full accumulated text.
///
/// Each call replaces whatever was shown before; sinks never see deltas.
#[async_trait]
pub trait DisplaySink: Send {
    /// Shows `text`, the whole output accumulated so far.
    async fn show(&mut self, text: &str) -> Result<(), ChainError>;
}

/// A sink that records every redraw.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    frames: Vec<String>,
}

impl MemorySink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every redraw received, oldest first.
    pub fn frames(&self) -> &[String] {
        &self.frames
    }

    /// The most recent redraw.
    pub fn last(&self) -> Option<&str> {
        self.frames.last().map(String::as_str)
    }
}

#[async_trait]
impl DisplaySink for MemorySink {
    async fn show(&mut self, text: &str) -> Result<(), ChainError> {
        self.frames.push(text.to_string());
        Ok(())
    }
}

/// Pulls text fragments one at a time and forwards the accumulated text.
///
/// After every forwarded fragment the driver sleeps for `delay`, even when
/// the next fragment is already available. Nothing is prefetched while a
/// fragment is being shown.
#[derive(Debug, Clone, Copy)]
pub struct StreamDriver {
    delay: Duration,
}

impl StreamDriver {
    /// Creates a driver pausing `delay` between increments.
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    /// The inter-increment delay.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Drives `fragments` into `sink` and returns the final accumulated text.
    ///
    /// Accumulation starts empty on every call. Empty fragments are skipped
    /// so that each redraw strictly extends the previous one. The first
    /// error, from the source or the sink, ends the drive.
    pub async fn drive<S, K>(&self, mut fragments: S, sink: &mut K) -> Result<String, ChainError>
    where
        S: Stream<Item = Result<String, ChainError>> + Unpin,
        K: DisplaySink + ?Sized,
    {
        let mut accumulated = String::new();
        let mut increments = 0usize;

        while let Some(fragment) = fragments.next().await {
            let fragment = fragment?;
            if fragment.is_empty() {
                continue;
            }
            accumulated.push_str(&fragment);
            increments += 1;
            debug!("Redraw #{} ({} chars)", increments, accumulated.len());
            sink.show(&accumulated).await?;
            tokio::time::sleep(self.delay).await;
        }

        info!("Delivered {} increments, {} chars", increments, accumulated.chars().count());
        Ok(accumulated)
    }
}

/// Drives `fragments` into `sink` with `delay` between increments.
pub async fn drive<S, K>(fragments: S, sink: &mut K, delay: Duration) -> Result<String, ChainError>
where
    S: Stream<Item = Result<String, ChainError>> + Unpin,
    K: DisplaySink + ?Sized,
{
    StreamDriver::new(delay).drive(fragments, sink).await
}

#[cfg(test)]
mod tests {
    use futures::stream;
    use tokio::time::Instant;

    use super::*;

    fn fragments(parts: &[&str]) -> impl Stream<Item = Result<String, ChainError>> + Unpin {
        stream::iter(parts.iter().map(|p| Ok(p.to_string())).collect::<Vec<_>>())
    }

    struct ClosedSink;

    #[async_trait]
    impl DisplaySink for ClosedSink {
        async fn show(&mut self, _text: &str) -> Result<(), ChainError> {
            Err(ChainError::Display("client went away".into()))
        }
    }

    #[tokio::test]
    async fn redraws_full_accumulated_text() {
        let mut sink = MemorySink::new();
        let text = drive(fragments(&["W", "h", "y"]), &mut sink, Duration::ZERO).await.unwrap();

        assert_eq!(text, "Why");
        assert_eq!(sink.frames(), ["W", "Wh", "Why"]);
        assert_eq!(sink.last(), Some("Why"));
    }

    #[tokio::test]
    async fn each_frame_extends_the_previous() {
        let mut sink = MemorySink::new();
        drive(fragments(&["Hel", "", "lo", ", ", "bear"]), &mut sink, Duration::ZERO).await.unwrap();

        for pair in sink.frames().windows(2) {
            assert!(pair[1].len() > pair[0].len());
            assert!(pair[1].starts_with(&pair[0]));
        }
        assert_eq!(sink.frames().len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn sleeps_after_every_increment() {
        let delay = Duration::from_millis(30);
        let start = Instant::now();

        let mut sink = MemorySink::new();
        StreamDriver::new(delay).drive(fragments(&["a", "b", "c"]), &mut sink).await.unwrap();

        assert!(start.elapsed() >= delay * 3);
    }

    #[tokio::test]
    async fn source_error_stops_the_drive() {
        let source = stream::iter(vec![
            Ok("Why".to_string()),
            Err(ChainError::Transport("reset".into())),
            Ok("never".to_string()),
        ]);
        let mut sink = MemorySink::new();

        let err = drive(source, &mut sink, Duration::ZERO).await.unwrap_err();
        assert_eq!(err, ChainError::Transport("reset".into()));
        assert_eq!(sink.frames(), ["Why"]);
    }

    #[tokio::test]
    async fn sink_error_stops_the_drive() {
        let err = drive(fragments(&["a", "b"]), &mut ClosedSink, Duration::ZERO).await.unwrap_err();
        assert!(matches!(err, ChainError::Display(_)));
    }

    #[tokio::test]
    async fn accumulation_resets_per_drive() {
        let driver = StreamDriver::new(Duration::ZERO);
        let mut sink = MemorySink::new();
        driver.drive(fragments(&["one"]), &mut sink).await.unwrap();
        driver.drive(fragments(&["two"]), &mut sink).await.unwrap();
        assert_eq!(sink.frames(), ["one", "two"]);
    }
}
