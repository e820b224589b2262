//! Construction of the remote service clients
//!
//! Clients are built per processing call from the configuration loaded for
//! that call, so a changed API key or bucket takes effect immediately.

use crate::models::{OptimizerConfig, StorageConfig};
use crate::optimizer::{MockOptimizer, OptimizerService, TinifyClient};
use crate::storage::{MockObjectStore, ObjectStore, S3ObjectStore};
use crate::Result;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

#[async_trait]
pub trait ServiceFactory: Send + Sync {
    fn optimizer(&self, config: &OptimizerConfig) -> Result<Box<dyn OptimizerService>>;
    async fn object_store(&self, config: &StorageConfig) -> Result<Box<dyn ObjectStore>>;
}

/// Builds the Tinify and S3 clients.
#[derive(Debug, Default, Clone)]
pub struct LiveServiceFactory;

#[async_trait]
impl ServiceFactory for LiveServiceFactory {
    fn optimizer(&self, config: &OptimizerConfig) -> Result<Box<dyn OptimizerService>> {
        Ok(Box::new(TinifyClient::new(config.clone())?))
    }

    async fn object_store(&self, config: &StorageConfig) -> Result<Box<dyn ObjectStore>> {
        Ok(Box::new(S3ObjectStore::new(config.clone()).await?))
    }
}

/// Hands out clones of shared mocks and remembers the configs it was given.
#[derive(Clone, Default)]
pub struct MockServiceFactory {
    optimizer: MockOptimizer,
    store: MockObjectStore,
    api_keys: Arc<Mutex<Vec<String>>>,
    buckets: Arc<Mutex<Vec<String>>>,
}

impl MockServiceFactory {
    pub fn new(optimizer: MockOptimizer, store: MockObjectStore) -> Self {
        Self {
            optimizer,
            store,
            api_keys: Arc::new(Mutex::new(Vec::new())),
            buckets: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn get_api_keys(&self) -> Vec<String> {
        self.api_keys.lock().unwrap().clone()
    }

    pub fn get_store_build_count(&self) -> usize {
        self.buckets.lock().unwrap().len()
    }
}

#[async_trait]
impl ServiceFactory for MockServiceFactory {
    fn optimizer(&self, config: &OptimizerConfig) -> Result<Box<dyn OptimizerService>> {
        self.api_keys.lock().unwrap().push(config.api_key.clone());
        Ok(Box::new(self.optimizer.clone()))
    }

    async fn object_store(&self, config: &StorageConfig) -> Result<Box<dyn ObjectStore>> {
        self.buckets.lock().unwrap().push(config.bucket.clone());
        Ok(Box::new(self.store.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_live_factory_builds_clients() {
        let factory = LiveServiceFactory;

        assert!(factory
            .optimizer(&OptimizerConfig::new("key".to_string()))
            .is_ok());
        let store = factory
            .object_store(&StorageConfig {
                bucket: "assets".to_string(),
                region: "eu-west-1".to_string(),
                version: "latest".to_string(),
                access_key_id: "AKIA".to_string(),
                secret_access_key: "secret".to_string(),
                endpoint: None,
            })
            .await;
        assert!(store.is_ok());
    }

    #[tokio::test]
    async fn test_mock_factory_shares_state() {
        let optimizer = MockOptimizer::new();
        let factory = MockServiceFactory::new(optimizer.clone(), MockObjectStore::new());

        let built = factory
            .optimizer(&OptimizerConfig::new("k1".to_string()))
            .unwrap();
        built.optimize(b"data").await.unwrap();

        assert_eq!(optimizer.get_call_count(), 1);
        assert_eq!(factory.get_api_keys(), vec!["k1".to_string()]);
    }
}
