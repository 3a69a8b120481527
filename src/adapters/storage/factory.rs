//! Warehouse store factory
//!
//! This module provides factory functions to create storage backends based on configuration.

use crate::adapters::storage::json::JsonFileStore;
use crate::adapters::storage::memory::InMemoryStore;
use crate::adapters::storage::traits::WarehouseStore;
use crate::config::schema::{MeridianConfig, StorageBackend};
use crate::domain::Result;
use std::sync::Arc;

/// Create a warehouse store based on the configuration
///
/// This factory function examines `storage.backend` and creates the matching
/// implementation, then checks that it is usable.
///
/// # Errors
///
/// Returns an error if the backend fails its connection test
pub async fn create_store(config: &MeridianConfig) -> Result<Arc<dyn WarehouseStore + Send + Sync>> {
    let store: Arc<dyn WarehouseStore + Send + Sync> = match config.storage.backend {
        StorageBackend::Json => {
            tracing::info!(path = %config.storage.path, "Creating JSON file store");
            Arc::new(JsonFileStore::new(&config.storage.path))
        }
        StorageBackend::Memory => {
            tracing::info!("Creating in-memory store");
            Arc::new(InMemoryStore::new())
        }
    };

    store.test_connection().await?;
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_create_store_selects_backend() {
        let dir = TempDir::new().unwrap();
        let mut config = MeridianConfig::default();
        config.storage.path = dir.path().display().to_string();

        let store = create_store(&config).await.unwrap();
        assert_eq!(store.backend_name(), "json");

        config.storage.backend = StorageBackend::Memory;
        let store = create_store(&config).await.unwrap();
        assert_eq!(store.backend_name(), "memory");
    }
}
