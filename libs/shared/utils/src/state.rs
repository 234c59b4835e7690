use std::sync::Arc;

use shared_config::AppConfig;
use shared_database::{store_from_config, DocumentStore, MemoryStore};

/// Shared router state: configuration plus the document store every cell talks to.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn DocumentStore>,
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<dyn DocumentStore>) -> Self {
        Self {
            config: Arc::new(config),
            store,
        }
    }

    pub fn from_config(config: AppConfig) -> Self {
        let store = store_from_config(&config);
        Self::new(config, store)
    }

    pub fn in_memory(config: AppConfig) -> (Self, MemoryStore) {
        let store = MemoryStore::new();
        (Self::new(config, Arc::new(store.clone())), store)
    }
}
