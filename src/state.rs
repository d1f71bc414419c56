use std::sync::Arc;

use crate::config::AppConfig;
use crate::services::{ContentService, DistributionService};
use crate::store::ContentStore;

/// Shared application state: the storage backend and the loaded config.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ContentStore>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(store: Arc<dyn ContentStore>, config: AppConfig) -> Self {
        Self {
            store,
            config: Arc::new(config),
        }
    }

    pub fn content(&self) -> ContentService {
        ContentService::new(self.store.clone())
    }

    pub fn distribution(&self) -> DistributionService {
        DistributionService::new(self.store.clone())
    }
}
