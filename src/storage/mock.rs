use super::ObjectStore;
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

type ObjectKey = (String, String);

#[derive(Clone)]
pub struct MockObjectStore {
    objects: Arc<Mutex<HashMap<ObjectKey, Vec<u8>>>>,
    put_failure: Arc<Mutex<Option<String>>>,
    exists_failure: Arc<Mutex<Option<String>>>,
    put_count: Arc<Mutex<usize>>,
    exists_count: Arc<Mutex<usize>>,
}

impl MockObjectStore {
    pub fn new() -> Self {
        Self {
            objects: Arc::new(Mutex::new(HashMap::new())),
            put_failure: Arc::new(Mutex::new(None)),
            exists_failure: Arc::new(Mutex::new(None)),
            put_count: Arc::new(Mutex::new(0)),
            exists_count: Arc::new(Mutex::new(0)),
        }
    }

    pub fn with_object(self, bucket: &str, key: &str, content: Vec<u8>) -> Self {
        self.objects
            .lock()
            .unwrap()
            .insert((bucket.to_string(), key.to_string()), content);
        self
    }

    /// Make every upload fail with `message` as the provider error.
    pub fn with_put_failure(self, message: &str) -> Self {
        *self.put_failure.lock().unwrap() = Some(message.to_string());
        self
    }

    /// Make every existence check fail with `message`.
    pub fn with_exists_failure(self, message: &str) -> Self {
        *self.exists_failure.lock().unwrap() = Some(message.to_string());
        self
    }

    pub fn get_object(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .unwrap()
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    pub fn get_put_count(&self) -> usize {
        *self.put_count.lock().unwrap()
    }

    pub fn get_exists_count(&self) -> usize {
        *self.exists_count.lock().unwrap()
    }
}

impl Default for MockObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStore for MockObjectStore {
    async fn exists(&self, bucket: &str, key: &str) -> Result<bool> {
        *self.exists_count.lock().unwrap() += 1;

        if let Some(message) = self.exists_failure.lock().unwrap().clone() {
            return Err(Error::Storage(message));
        }

        Ok(self
            .objects
            .lock()
            .unwrap()
            .contains_key(&(bucket.to_string(), key.to_string())))
    }

    async fn put_file(&self, bucket: &str, key: &str, source: &Path) -> Result<()> {
        *self.put_count.lock().unwrap() += 1;

        if let Some(message) = self.put_failure.lock().unwrap().clone() {
            return Err(Error::Storage(message));
        }

        let data = tokio::fs::read(source).await?;
        self.objects
            .lock()
            .unwrap()
            .insert((bucket.to_string(), key.to_string()), data);
        Ok(())
    }
}
