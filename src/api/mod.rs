pub mod handlers;
pub mod routes;

pub use routes::*;

use crate::ml::ServingModel;
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub model: Option<Arc<ServingModel>>,
    pub service_name: String,
}

impl AppState {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            model: None,
            service_name: service_name.into(),
        }
    }

    /// Set the resident model
    pub fn with_model(mut self, model: Arc<ServingModel>) -> Self {
        self.model = Some(model);
        self
    }

    /// Check if a model is loaded
    pub fn is_ready(&self) -> bool {
        self.model.is_some()
    }
}
