//! marketq - natural-language questions over a marketplace API
//!
//! A query is turned into a backend call (fast-path parse or function
//! selector), fuzzy company and asset names are resolved to ids against
//! cached catalogs, and the fetched payload is narrated by a text model.

pub mod catalog;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod handlers;
pub mod pipeline;
pub mod resolution;
pub mod state;
pub mod summarize;
pub mod upstream;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

// Re-export key types for convenience
pub use config::Config;
pub use error::{AppError, Result, UpstreamError};
pub use handlers::{health_handler, query_handler, ready_handler};
pub use pipeline::{Pipeline, QueryAnswer};
pub use state::AppState;

/// Routes served by the binary, minus `/metrics` and middleware.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/query", post(query_handler))
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .with_state(state)
}
