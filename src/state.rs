use std::sync::Arc;

use crate::config::AppConfig;
use crate::services::actor::memory::MemoryBackend;

pub struct AppState {
    pub backend: Arc<MemoryBackend>,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        Self {
            backend: Arc::new(MemoryBackend::new(config.admin_principals.clone())),
            config,
        }
    }
}
