//! HTTP Request Handlers
//!
//! This module contains all HTTP request handlers organized by domain.

pub mod grade;
pub mod health;

use axum::Router;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};

use crate::{constants::MAX_REQUEST_BODY_BYTES, state::AppState};

/// Create all API routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(health::routes())
        .merge(grade::routes())
}

/// Build the service with its middleware stack
pub fn app(state: AppState) -> Router {
    routes()
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(MAX_REQUEST_BODY_BYTES))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
