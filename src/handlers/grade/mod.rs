//! Grading handlers

mod handler;
pub mod request;

pub use handler::*;
pub use request::*;

use axum::{routing::post, Router};

use crate::state::AppState;

/// Grading routes
pub fn routes() -> Router<AppState> {
    Router::new().route("/grade", post(handler::grade))
}
