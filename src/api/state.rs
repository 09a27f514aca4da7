//! Application state for the API server

use crate::{AcquisitionPipeline, Config};
use std::sync::Arc;

/// Shared application state accessible to all route handlers
///
/// This struct is cloned for each request (cheap Arc clone) and provides
/// access to the acquisition pipeline and configuration.
#[derive(Clone)]
pub struct AppState {
    /// The acquisition pipeline serving download requests
    pub pipeline: Arc<AcquisitionPipeline>,

    /// Configuration (read access)
    pub config: Arc<Config>,
}

impl AppState {
    /// Create a new AppState
    pub fn new(pipeline: Arc<AcquisitionPipeline>, config: Arc<Config>) -> Self {
        Self { pipeline, config }
    }
}
