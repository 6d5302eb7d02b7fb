use std::sync::Arc;

use vmr_core::AdmissionPipeline;

use crate::config::AppConfig;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: AdmissionPipeline,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(pipeline: AdmissionPipeline, config: AppConfig) -> Self {
        Self {
            pipeline,
            config: Arc::new(config),
        }
    }

    /// Tracking location of an admitted request.
    pub fn request_location(&self, request_id: uuid::Uuid) -> String {
        format!("{}{request_id}", self.config.request_base_path)
    }
}
