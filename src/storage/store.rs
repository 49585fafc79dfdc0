use crate::storage::error::StorageError;
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;

/// ObjectStore trait: whole-object reads and writes on one S3-compatible bucket
#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    /// Name of the bucket every key lives in
    fn bucket(&self) -> &str;

    /// Get an object by its key
    ///
    /// * `key` - The object key to retrieve
    async fn get_object(&self, key: &str) -> Result<Bytes, StorageError>;

    /// Store an object under `key`, replacing any previous content
    async fn put_object(&self, key: &str, data: Bytes) -> Result<(), StorageError>;

    /// Remove an object from storage (test-only)
    #[cfg(test)]
    async fn remove_object(&self, key: &str) -> Result<(), StorageError>;
}

/// Implementation of ObjectStore trait for Arc<T> where T implements ObjectStore
#[async_trait]
impl<T: ObjectStore + ?Sized> ObjectStore for Arc<T> {
    fn bucket(&self) -> &str {
        (**self).bucket()
    }

    async fn get_object(&self, key: &str) -> Result<Bytes, StorageError> {
        (**self).get_object(key).await
    }

    async fn put_object(&self, key: &str, data: Bytes) -> Result<(), StorageError> {
        (**self).put_object(key, data).await
    }

    #[cfg(test)]
    async fn remove_object(&self, key: &str) -> Result<(), StorageError> {
        (**self).remove_object(key).await
    }
}
