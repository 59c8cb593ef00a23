//! Shared application state for the REST routes.

use crate::handlers::Dispatcher;
use std::sync::Arc;

/// The dispatcher is built once at startup and only read afterwards.
#[derive(Clone, Debug)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
}

impl AppState {
    pub fn new(dispatcher: Dispatcher) -> Self {
        AppState {
            dispatcher: Arc::new(dispatcher),
        }
    }
}
