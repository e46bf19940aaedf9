//! Atomic execution endpoint.

use std::sync::Arc;

use axum::{extract::State, Json};
use tracing::info;

use crate::dto::{InvokeResponse, RunRequest};
use crate::error::AppError;
use crate::services::session;
use crate::ServerState;

/// Runs one execution and returns the whole text.
pub async fn invoke(
    State(state): State<Arc<ServerState>>,
    Json(req): Json<RunRequest>,
) -> Result<Json<InvokeResponse>, AppError> {
    let _guard = state.claim()?;
    let (config, topic) = session::resolve(&state.config, &req);

    info!("Invoke request (model: {}): {}", config.model, topic);

    let text = session::invoke_session(&config, &topic).await?;
    Ok(Json(InvokeResponse { text }))
}
