//! Init endpoint returning the session form defaults.

use std::sync::Arc;

use axum::{extract::State, Json};
use tandem_config::DEFAULT_API_KEY;

use crate::dto::InitResponse;
use crate::ServerState;

const TITLE: &str = "Fallback chain streaming";

/// Returns the defaults the session form starts from.
pub async fn init(State(state): State<Arc<ServerState>>) -> Json<InitResponse> {
    let config = &state.config;
    Json(InitResponse {
        title: TITLE.to_string(),
        prompt_template: config.prompt_template.clone(),
        topic: config.topic.clone(),
        model: config.model.clone(),
        api_key_placeholder: DEFAULT_API_KEY.to_string(),
        delay_ms: config.delay_ms,
    })
}
