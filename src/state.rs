//! Application state management
//!
//! This module contains the shared application state that is passed
//! to all request handlers via Axum's State extractor.

use std::sync::Arc;

use crate::sandbox::ExecutionBackend;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

/// Inner state (wrapped in Arc for cheap cloning)
struct AppStateInner {
    /// Execution backend grading every request
    backend: Arc<dyn ExecutionBackend>,
}

impl AppState {
    /// Create a new application state
    pub fn new(backend: Arc<dyn ExecutionBackend>) -> Self {
        Self {
            inner: Arc::new(AppStateInner { backend }),
        }
    }

    /// Get a reference to the execution backend
    pub fn backend(&self) -> &Arc<dyn ExecutionBackend> {
        &self.inner.backend
    }
}
