//! # Application State
//!
//! Shared state for the Axum application, passed to all route handlers
//! via the `State` extractor.

use std::sync::Arc;

use sambaza_engine::Engine;
use sambaza_store::Store;

/// Shared application state accessible to all route handlers.
#[derive(Clone)]
pub struct AppState {
    /// The lifecycle engine.
    pub engine: Engine,
    /// The store, for read-side and admin endpoints.
    pub store: Arc<dyn Store>,
}

impl AppState {
    /// Build state around an engine.
    pub fn new(engine: Engine) -> Self {
        let store = engine.store();
        Self { engine, store }
    }
}
