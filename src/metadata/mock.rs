use super::MetadataStore;
use crate::models::Asset;
use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

#[derive(Clone)]
pub struct MockMetadataStore {
    compressed: Arc<Mutex<Vec<String>>>,
    refreshed: Arc<Mutex<Vec<String>>>,
    should_fail: Arc<Mutex<bool>>,
}

impl MockMetadataStore {
    pub fn new() -> Self {
        Self {
            compressed: Arc::new(Mutex::new(Vec::new())),
            refreshed: Arc::new(Mutex::new(Vec::new())),
            should_fail: Arc::new(Mutex::new(false)),
        }
    }

    pub fn with_failure(self, should_fail: bool) -> Self {
        *self.should_fail.lock().unwrap() = should_fail;
        self
    }

    pub fn is_compressed(&self, identifier: &str) -> bool {
        self.compressed
            .lock()
            .unwrap()
            .iter()
            .any(|id| id == identifier)
    }

    pub fn get_compressed_count(&self) -> usize {
        self.compressed.lock().unwrap().len()
    }

    pub fn get_refresh_count(&self) -> usize {
        self.refreshed.lock().unwrap().len()
    }
}

impl Default for MockMetadataStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetadataStore for MockMetadataStore {
    async fn mark_compressed(&self, asset: &Asset) -> Result<()> {
        if *self.should_fail.lock().unwrap() {
            return Err(Error::Metadata("Mock failure".to_string()));
        }
        self.compressed
            .lock()
            .unwrap()
            .push(asset.identifier.clone());
        Ok(())
    }

    async fn refresh(&self, asset: &Asset) -> Result<()> {
        if *self.should_fail.lock().unwrap() {
            return Err(Error::Metadata("Mock failure".to_string()));
        }
        self.refreshed
            .lock()
            .unwrap()
            .push(asset.identifier.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FolderRef;

    fn asset() -> Asset {
        Asset::from_identifier(
            "/a.png",
            "fileadmin/a.png",
            FolderRef::Live {
                driver_type: "Local".to_string(),
            },
        )
    }

    #[tokio::test]
    async fn test_mock_records_calls() {
        let store = MockMetadataStore::new();

        store.mark_compressed(&asset()).await.unwrap();
        store.refresh(&asset()).await.unwrap();

        assert!(store.is_compressed("/a.png"));
        assert!(!store.is_compressed("/b.png"));
        assert_eq!(store.get_compressed_count(), 1);
        assert_eq!(store.get_refresh_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_failure() {
        let store = MockMetadataStore::new().with_failure(true);
        assert!(store.refresh(&asset()).await.is_err());
        assert_eq!(store.get_refresh_count(), 0);
    }
}
