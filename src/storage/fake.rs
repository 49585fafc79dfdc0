use crate::storage::error::StorageError;
use crate::storage::store::ObjectStore;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;

/// `FakeObjectStore` is an in-memory implementation of the `ObjectStore` trait for testing purposes.
/// It allows simulating per-object failures.
#[derive(Clone)]
pub struct FakeObjectStore {
    bucket: String,
    data: Arc<Mutex<HashMap<String, Bytes>>>,
    fail_objects: Arc<Mutex<HashSet<String>>>,
}

#[allow(dead_code)]
impl FakeObjectStore {
    pub fn new(bucket: &str) -> Self {
        FakeObjectStore {
            bucket: bucket.to_string(),
            data: Arc::new(Mutex::new(HashMap::new())),
            fail_objects: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Simulate a failure for a specific object
    /// After calling this, get_object and put_object return network errors for this key
    pub async fn fake_fail_object(&self, key: &str) {
        self.fail_objects.lock().await.insert(key.to_string());
    }

    pub async fn fake_add_object(&self, key: &str, data: Bytes) {
        self.data.lock().await.insert(key.to_string(), data);
    }

    pub async fn object_count(&self) -> usize {
        self.data.lock().await.len()
    }

    async fn check_failure(&self, key: &str) -> Result<(), StorageError> {
        if self.fail_objects.lock().await.contains(key) {
            return Err(StorageError::NetworkError(format!(
                "Simulated failure for {}",
                key
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for FakeObjectStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn get_object(&self, key: &str) -> Result<Bytes, StorageError> {
        self.check_failure(key).await?;

        let data = self.data.lock().await;
        data.get(key)
            .cloned()
            .ok_or_else(|| StorageError::ObjectNotFound(key.to_string()))
    }

    async fn put_object(&self, key: &str, data: Bytes) -> Result<(), StorageError> {
        self.check_failure(key).await?;
        self.data.lock().await.insert(key.to_string(), data);
        Ok(())
    }

    #[cfg(test)]
    async fn remove_object(&self, key: &str) -> Result<(), StorageError> {
        match self.data.lock().await.remove(key) {
            Some(_) => Ok(()),
            None => Err(StorageError::ObjectNotFound(key.to_string())),
        }
    }
}
