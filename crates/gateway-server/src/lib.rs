//! # Gateway Server
//!
//! HTTP server for the chat model gateway.
//!
//! This crate provides:
//! - Axum-based HTTP server
//! - OpenAI-compatible chat completion and model endpoints
//! - Provider listing, health and Prometheus endpoints
//! - Graceful shutdown on Ctrl-C / SIGTERM

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod shutdown;
pub mod state;

// Re-export main types
pub use error::ApiError;
pub use routes::create_router;
pub use server::{Server, ServerError};
pub use shutdown::shutdown_signal;
pub use state::{AppState, AppStateBuilder};
