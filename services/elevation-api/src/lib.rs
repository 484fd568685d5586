//! HTTP layer of the elevation service.
//!
//! The binary in `main.rs` parses configuration and serves the router
//! built here; the library split keeps handlers testable without a
//! listening socket.

pub mod config;
pub mod handlers;
pub mod state;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Extension, Router,
};
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/elevation", get(handlers::elevation_handler))
        .route("/elevation", post(handlers::elevation_batch_handler))
        .route("/stats", get(handlers::stats_handler))
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
}
