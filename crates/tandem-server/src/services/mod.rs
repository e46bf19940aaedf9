//! Business logic services for the session server.

pub mod session;
