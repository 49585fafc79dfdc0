use crate::platform::error::ApiError;
use crate::platform::resource::ResourceKind;
use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;
use std::sync::Arc;

/// Platform trait: the resource-management REST surface, uniform over every kind.
///
/// `space_id`, when given, scopes the call to one deployment space.
#[async_trait]
pub trait Platform: Send + Sync + 'static {
    /// List resources, optionally filtered by query parameters such as `name`
    async fn list(
        &self,
        kind: ResourceKind,
        space_id: Option<&str>,
        filters: &[(&str, &str)],
    ) -> Result<Vec<Value>, ApiError>;

    async fn get(
        &self,
        kind: ResourceKind,
        space_id: Option<&str>,
        id: &str,
    ) -> Result<Value, ApiError>;

    /// Create a resource from a JSON body and return the created document
    async fn create(
        &self,
        kind: ResourceKind,
        space_id: Option<&str>,
        body: Value,
    ) -> Result<Value, ApiError>;

    async fn delete(
        &self,
        kind: ResourceKind,
        space_id: Option<&str>,
        id: &str,
    ) -> Result<(), ApiError>;

    /// Attach binary content to an existing resource (model archives)
    async fn upload_content(
        &self,
        kind: ResourceKind,
        space_id: Option<&str>,
        id: &str,
        content: Bytes,
    ) -> Result<(), ApiError>;
}

/// Implementation of Platform trait for Arc<T> where T implements Platform
///
/// This allows the connector, its jobs and the storage connector to share one client.
#[async_trait]
impl<T: Platform + ?Sized> Platform for Arc<T> {
    async fn list(
        &self,
        kind: ResourceKind,
        space_id: Option<&str>,
        filters: &[(&str, &str)],
    ) -> Result<Vec<Value>, ApiError> {
        (**self).list(kind, space_id, filters).await
    }

    async fn get(
        &self,
        kind: ResourceKind,
        space_id: Option<&str>,
        id: &str,
    ) -> Result<Value, ApiError> {
        (**self).get(kind, space_id, id).await
    }

    async fn create(
        &self,
        kind: ResourceKind,
        space_id: Option<&str>,
        body: Value,
    ) -> Result<Value, ApiError> {
        (**self).create(kind, space_id, body).await
    }

    async fn delete(
        &self,
        kind: ResourceKind,
        space_id: Option<&str>,
        id: &str,
    ) -> Result<(), ApiError> {
        (**self).delete(kind, space_id, id).await
    }

    async fn upload_content(
        &self,
        kind: ResourceKind,
        space_id: Option<&str>,
        id: &str,
        content: Bytes,
    ) -> Result<(), ApiError> {
        (**self).upload_content(kind, space_id, id, content).await
    }
}
