//! Data transfer objects for HTTP message serialization.

use serde::{Deserialize, Serialize};

// === Session Form ===

/// Form defaults for a new session.
#[derive(Debug, Clone, Serialize)]
pub struct InitResponse {
    pub title: String,
    pub prompt_template: String,
    pub topic: String,
    pub model: String,
    /// Never the configured credential.
    pub api_key_placeholder: String,
    pub delay_ms: u64,
}

/// One execution request. Missing fields use the loaded configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RunRequest {
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
}

// === Results ===

/// Response body of an atomic execution.
#[derive(Debug, Serialize)]
pub struct InvokeResponse {
    pub text: String,
}

/// SSE event payloads.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum SseData {
    /// Full accumulated text, replacing the previous redraw.
    Redraw { text: String },
    /// Final text once the stream is exhausted.
    End { text: String, chars: usize, elapsed_ms: u64 },
    Error { error: String, kind: &'static str },
}

impl SseData {
    /// SSE event name.
    pub fn event(&self) -> &'static str {
        match self {
            SseData::Redraw { .. } => "redraw",
            SseData::End { .. } => "end",
            SseData::Error { .. } => "error",
        }
    }
}
