//! HTTP server entry point and Axum router setup.
//!
//! Loads the chain configuration, configures routes, and serves the
//! interactive session on `TANDEM_ADDR` (default `0.0.0.0:8000`).

mod dto;
mod error;
mod handlers;
mod services;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::body::Body;
use axum::http::{Request, Response};
use axum::routing::{get, post};
use axum::Router;
use tandem_config::ChainConfig;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::error::AppError;

const DEFAULT_ADDR: &str = "0.0.0.0:8000";
const ADDR_VAR: &str = "TANDEM_ADDR";
const CONFIG_VAR: &str = "TANDEM_CONFIG";

/// Shared server state accessible from all handlers.
pub struct ServerState {
    pub config: ChainConfig,
    running: Arc<Mutex<()>>,
}

impl ServerState {
    pub fn new(config: ChainConfig) -> Self {
        Self {
            config,
            running: Arc::new(Mutex::new(())),
        }
    }

    /// Claims the single execution slot, held until the guard drops.
    pub fn claim(&self) -> Result<OwnedMutexGuard<()>, AppError> {
        self.running
            .clone()
            .try_lock_owned()
            .map_err(|_| AppError::Conflict("an execution is already in progress".into()))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .compact()
        .init();

    let config = load_config()?;
    info!("Template: {}", config.prompt_template);
    info!("Default topic: {}", config.topic);
    info!("Delay: {} ms", config.delay_ms);

    let state = Arc::new(ServerState::new(config));

    let addr = std::env::var(ADDR_VAR).unwrap_or_else(|_| DEFAULT_ADDR.to_string());
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app(state)).await?;

    Ok(())
}

/// Reads the optional config file, then applies environment overrides.
fn load_config() -> Result<ChainConfig> {
    let config = match std::env::var(CONFIG_VAR) {
        Ok(path) => {
            info!("Loading config from {}", path);
            ChainConfig::from_file(&path)?
        }
        Err(_) => ChainConfig::default(),
    }
    .apply_env()?;
    config.validate()?;
    Ok(config)
}

/// Builds the router over `state`.
fn app(state: Arc<ServerState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|req: &Request<Body>| {
            tracing::info_span!(
                "request",
                method = %req.method(),
                uri = %req.uri(),
                version = ?req.version(),
            )
        })
        .on_response(|res: &Response<Body>, latency: Duration, _span: &tracing::Span| {
            info!(
                latency = %format!("{} ms", latency.as_millis()),
                status = %res.status().as_u16(),
                "finished processing request"
            );
        });

    let logged_routes = Router::new()
        .route("/init", get(handlers::init::init))
        .route("/stream", post(handlers::stream::stream))
        .route("/invoke", post(handlers::invoke::invoke))
        .layer(trace_layer);

    Router::new()
        .merge(logged_routes)
        .route("/health", get(handlers::health))
        .layer(cors)
        .with_state(state)
}
