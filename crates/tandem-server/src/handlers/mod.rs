//! HTTP route handlers for the session server.

pub mod init;
pub mod invoke;
pub mod stream;

/// Health check endpoint.
pub async fn health() -> &'static str {
    "OK"
}
