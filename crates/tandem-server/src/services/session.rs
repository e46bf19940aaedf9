//! One session execution: request resolution, streaming and atomic runs.

use std::time::Instant;

use async_trait::async_trait;
use axum::response::sse::Event;
use tandem_config::ChainConfig;
use tandem_core::ChainError;
use tandem_engine::{DisplaySink, Pipeline, StreamDriver};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::dto::{RunRequest, SseData};

pub type DataSender = mpsc::Sender<SseData>;

/// Applies the request's overrides on top of the loaded configuration.
///
/// Returns the execution config and the topic to run.
pub fn resolve(base: &ChainConfig, req: &RunRequest) -> (ChainConfig, String) {
    let mut config = base.clone();
    if let Some(model) = &req.model {
        config.model = model.clone();
    }
    if let Some(key) = &req.api_key {
        config.api_key = key.clone();
    }
    let topic = req.topic.clone().unwrap_or_else(|| config.topic.clone());
    (config, topic)
}

/// Converts an event payload into an SSE event.
pub fn to_event(data: &SseData) -> Event {
    let json = serde_json::to_string(data).unwrap_or_else(|e| {
        error!("Failed to encode SSE payload: {}", e);
        "{}".to_string()
    });
    Event::default().event(data.event()).data(json)
}

/// Forwards every redraw to an SSE client.
pub struct SseSink {
    tx: DataSender,
}

impl SseSink {
    pub fn new(tx: DataSender) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl DisplaySink for SseSink {
    async fn show(&mut self, text: &str) -> Result<(), ChainError> {
        self.tx
            .send(SseData::Redraw { text: text.to_string() })
            .await
            .map_err(|_| ChainError::Display("client disconnected".into()))
    }
}

/// Streams one execution into `tx`, ending with an `end` or `error` event.
pub async fn stream_session(config: &ChainConfig, topic: &str, tx: DataSender) {
    let start = Instant::now();
    let mut sink = SseSink::new(tx.clone());

    let result = match Pipeline::from_config(config, topic) {
        Ok(pipeline) => {
            StreamDriver::new(config.delay())
                .drive(pipeline.run_stream(topic), &mut sink)
                .await
        }
        Err(e) => Err(e),
    };
    let elapsed_ms = start.elapsed().as_millis() as u64;

    let data = match result {
        Ok(text) => {
            info!("║ Streamed {} chars in {} ms", text.chars().count(), elapsed_ms);
            info!("╚══════════════════════════════════════════════════════════════");
            SseData::End { chars: text.chars().count(), text, elapsed_ms }
        }
        Err(ChainError::Display(msg)) => {
            warn!("Session ended early: {}", msg);
            return;
        }
        Err(e) => {
            error!("Session failed ({}): {}", e.kind(), e);
            SseData::Error { error: e.to_string(), kind: e.kind() }
        }
    };
    let _ = tx.send(data).await;
}

/// Runs one execution atomically.
pub async fn invoke_session(config: &ChainConfig, topic: &str) -> Result<String, ChainError> {
    Pipeline::from_config(config, topic)?.run_sync(topic).await
}
