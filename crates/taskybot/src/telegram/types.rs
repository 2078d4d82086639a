//! Handler types and dependencies

use std::sync::Arc;

use taskycore::Application;

/// Error type for handlers
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Dependencies required by handlers
#[derive(Clone)]
pub struct HandlerDeps {
    pub app: Arc<Application>,
}

impl HandlerDeps {
    pub fn new(app: Arc<Application>) -> Self {
        Self { app }
    }
}
