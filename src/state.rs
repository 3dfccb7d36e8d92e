//! Shared application state injected into every handler.

use std::sync::Arc;
use std::time::SystemTime;

use crate::batch::{ArtifactStore, BatchPipeline};
use crate::config::Config;
use crate::processors::AudioEncoder;

pub struct AppState {
    pub pipeline: Arc<BatchPipeline>,
    pub artifacts: ArtifactStore,
    pub max_file_bytes: usize,
    pub started_at: SystemTime,
}

impl AppState {
    pub fn new(config: &Config, encoder: Arc<dyn AudioEncoder>) -> Self {
        Self {
            pipeline: Arc::new(BatchPipeline::new(config, encoder)),
            artifacts: ArtifactStore::new(config.output_root.clone()),
            max_file_bytes: config.max_file_bytes,
            started_at: SystemTime::now(),
        }
    }
}
