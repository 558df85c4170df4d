//! HTTP layer.
//!
//! Axum server with:
//! - CORS restricted to the configured storefront origins
//! - Request tracing
//! - Graceful shutdown
//! - JSON error responses

pub mod error;
pub mod routes;
pub mod server;

pub use server::{AppState, build_router, run_server};
