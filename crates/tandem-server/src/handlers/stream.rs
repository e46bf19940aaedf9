//! SSE streaming endpoint with full-redraw events.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::info;

use crate::dto::RunRequest;
use crate::error::AppError;
use crate::services::session::{self, to_event};
use crate::ServerState;

/// Streams one execution as `redraw` events followed by `end` or `error`.
///
/// Rejected with 409 while another execution is in flight.
pub async fn stream(
    State(state): State<Arc<ServerState>>,
    Json(req): Json<RunRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let guard = state.claim()?;
    let (config, topic) = session::resolve(&state.config, &req);

    info!("Stream request (model: {}): {}", config.model, topic);

    let (tx, rx) = mpsc::channel(100);

    tokio::spawn(async move {
        let _guard = guard;
        session::stream_session(&config, &topic, tx).await;
    });

    let events = ReceiverStream::new(rx).map(|data| Ok::<_, Infallible>(to_event(&data)));
    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}
