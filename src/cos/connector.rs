use crate::cos::error::CosError;
use crate::credentials::CosCredentials;
use crate::job::DataReference;
use crate::platform::{first_match, resource_id, ApiError, Platform, ResourceKind};
use crate::retry::{retry, RetryPolicy};
use crate::storage::{ObjectStore, StorageError};
use async_trait::async_trait;
use bytes::Bytes;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info};

const DATASOURCE_TYPE: &str = "cloudobjectstorage";

/// Connection asset giving jobs access to the bucket
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CosConnection {
    pub id: String,
    pub name: String,
    pub bucket: String,
    pub endpoint: String,
}

/// CosConnector trait: file data for jobs, kept in the object-storage bucket
#[async_trait]
pub trait CosConnector: Send + Sync + 'static {
    /// Connection asset for the bucket, created on first use and then cached
    async fn get_connection(&self) -> Result<CosConnection, CosError>;

    /// Upload a local file under `file_name`, replacing any previous object
    async fn put_file(&self, file_name: &str, path: &Path) -> Result<String, CosError>;

    /// Upload in-memory content under `file_name`
    async fn put_bytes(&self, file_name: &str, data: Bytes) -> Result<String, CosError>;

    /// Full object content as text
    async fn get_file(&self, file_name: &str) -> Result<String, CosError>;

    /// Reference to object `id` through the connection asset
    async fn get_data_references(&self, id: &str) -> Result<DataReference, CosError>;
}

#[async_trait]
impl<T: CosConnector + ?Sized> CosConnector for Arc<T> {
    async fn get_connection(&self) -> Result<CosConnection, CosError> {
        (**self).get_connection().await
    }

    async fn put_file(&self, file_name: &str, path: &Path) -> Result<String, CosError> {
        (**self).put_file(file_name, path).await
    }

    async fn put_bytes(&self, file_name: &str, data: Bytes) -> Result<String, CosError> {
        (**self).put_bytes(file_name, data).await
    }

    async fn get_file(&self, file_name: &str) -> Result<String, CosError> {
        (**self).get_file(file_name).await
    }

    async fn get_data_references(&self, id: &str) -> Result<DataReference, CosError> {
        (**self).get_data_references(id).await
    }
}

/// CosConnector over an ObjectStore plus a connection asset in one deployment space
pub struct CosStorageConnector {
    platform: Arc<dyn Platform>,
    store: Arc<dyn ObjectStore>,
    endpoint: String,
    access_key_id: String,
    secret_access_key: SecretString,
    space_id: String,
    retry: RetryPolicy,
    connection: OnceCell<CosConnection>,
}

impl CosStorageConnector {
    pub fn new(
        platform: Arc<dyn Platform>,
        store: Arc<dyn ObjectStore>,
        cos: &CosCredentials,
        space_id: impl Into<String>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            platform,
            store,
            endpoint: cos.endpoint.clone(),
            access_key_id: cos.access_key_id.clone(),
            secret_access_key: SecretString::from(cos.secret_access_key.expose_secret().to_string()),
            space_id: space_id.into(),
            retry,
            connection: OnceCell::new(),
        }
    }

    fn connection_name(&self) -> String {
        format!("cos-{}", self.store.bucket())
    }

    fn connection_from(&self, doc: &Value) -> Result<CosConnection, CosError> {
        let id = resource_id(doc).ok_or_else(|| ApiError::Decode {
            kind: ResourceKind::Connection,
            reason: "connection without id".to_string(),
        })?;
        Ok(CosConnection {
            id: id.to_string(),
            name: self.connection_name(),
            bucket: self.store.bucket().to_string(),
            endpoint: self.endpoint.clone(),
        })
    }

    async fn find_or_create_connection(&self) -> Result<CosConnection, CosError> {
        let name = self.connection_name();
        let filters = [("name", name.as_str())];

        let existing = retry(
            &self.retry,
            &format!("list connections named {}", name),
            ApiError::is_transient,
            || {
                self.platform
                    .list(ResourceKind::Connection, Some(self.space_id.as_str()), &filters)
            },
        )
        .await?;

        if let Some(doc) = first_match(&existing, &name) {
            debug!("Reusing connection asset {}", name);
            return self.connection_from(doc);
        }

        let body = json!({
            "name": name,
            "datasource_type": DATASOURCE_TYPE,
            "origin_country": "us",
            "properties": {
                "bucket": self.store.bucket(),
                "url": self.endpoint,
                "access_key": self.access_key_id,
                "secret_key": self.secret_access_key.expose_secret(),
            },
        });
        let created = self
            .platform
            .create(ResourceKind::Connection, Some(self.space_id.as_str()), body)
            .await?;

        let connection = self.connection_from(&created)?;
        info!("Created connection asset {} ({})", connection.name, connection.id);
        Ok(connection)
    }
}

#[async_trait]
impl CosConnector for CosStorageConnector {
    async fn get_connection(&self) -> Result<CosConnection, CosError> {
        self.connection
            .get_or_try_init(|| self.find_or_create_connection())
            .await
            .cloned()
    }

    async fn put_file(&self, file_name: &str, path: &Path) -> Result<String, CosError> {
        let data = tokio::fs::read(path).await.map_err(|source| CosError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.put_bytes(file_name, Bytes::from(data)).await
    }

    async fn put_bytes(&self, file_name: &str, data: Bytes) -> Result<String, CosError> {
        debug!("Uploading {} ({} bytes)", file_name, data.len());
        retry(
            &self.retry,
            &format!("upload {}", file_name),
            StorageError::is_transient,
            || self.store.put_object(file_name, data.clone()),
        )
        .await?;
        Ok(file_name.to_string())
    }

    async fn get_file(&self, file_name: &str) -> Result<String, CosError> {
        let data = retry(
            &self.retry,
            &format!("download {}", file_name),
            StorageError::is_transient,
            || self.store.get_object(file_name),
        )
        .await
        .map_err(|e| match e {
            StorageError::ObjectNotFound(key) => CosError::NotFound {
                bucket: self.store.bucket().to_string(),
                key,
            },
            other => CosError::Storage(other),
        })?;

        String::from_utf8(data.to_vec()).map_err(|_| CosError::InvalidText {
            key: file_name.to_string(),
        })
    }

    async fn get_data_references(&self, id: &str) -> Result<DataReference, CosError> {
        let connection = self.get_connection().await?;
        Ok(DataReference::External {
            id: id.to_string(),
            connection_id: connection.id,
            bucket: connection.bucket,
            key: id.to_string(),
        })
    }
}
