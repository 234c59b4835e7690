pub mod collections;
pub mod error;
pub mod memory;
pub mod store;
pub mod subscription;
pub mod supabase;

use std::sync::Arc;

use shared_config::{AppConfig, StoreBackend};

pub use error::StoreError;
pub use memory::MemoryStore;
pub use store::{
    CommitResult, Document, DocumentStore, FieldValue, FieldWrite, Fields, Filter, OrderBy,
    Precondition, Query, Write, WriteBatch,
};
pub use subscription::{Snapshot, Subscription};
pub use supabase::{SupabaseClient, SupabaseStore};

/// Build the store selected by configuration.
pub fn store_from_config(config: &AppConfig) -> Arc<dyn DocumentStore> {
    match config.store_backend {
        StoreBackend::Memory => {
            tracing::info!("Using in-memory document store");
            Arc::new(MemoryStore::new())
        }
        StoreBackend::Supabase => {
            tracing::info!("Using Supabase document store at {}", config.supabase_url);
            Arc::new(SupabaseStore::new(config))
        }
    }
}
