mod auth;
mod file;
mod firestore;

pub use file::FileStore;
pub use firestore::FirestoreStore;

use crate::{
    config::{AppConfig, StorageBackend},
    error::StoreError,
    event::Event,
};
use async_trait::async_trait;
use std::sync::Arc;

/// Backing collection of logged events.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Every stored event, unfiltered and in storage order.
    async fn list(&self) -> Result<Vec<Event>, StoreError>;

    /// Replaces the stored collection with `events`.
    async fn save(&self, _events: &[Event]) -> Result<(), StoreError> {
        Err(StoreError::ReadOnly(self.name()))
    }

    fn name(&self) -> &'static str;
}

pub type SharedStore = Arc<dyn EventStore>;

pub fn open(config: &AppConfig, backend: StorageBackend) -> Result<SharedStore, StoreError> {
    match backend {
        StorageBackend::File => Ok(Arc::new(FileStore::new(&config.storage.events_file))),
        StorageBackend::Firestore => Ok(Arc::new(FirestoreStore::from_config(&config.firestore)?)),
    }
}

/// Reads the store, logging and swallowing failures as an empty list.
pub async fn load_events_or_empty(store: &dyn EventStore) -> Vec<Event> {
    match store.list().await {
        Ok(events) => {
            tracing::debug!(store = store.name(), count = events.len(), "loaded events");
            events
        }
        Err(err) => {
            tracing::warn!(store = store.name(), error = %err, "event store unreadable, using empty list");
            Vec::new()
        }
    }
}
