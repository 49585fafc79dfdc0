use crate::credentials::CosCredentials;
use crate::storage::error::StorageError;
use crate::storage::store::ObjectStore;
use async_trait::async_trait;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{BehaviorVersion, Region};
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;
use secrecy::ExposeSecret;
use tracing::{debug, info};

/// Real S3 implementation of the ObjectStore trait, using HMAC keys
#[derive(Clone)]
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
}

impl S3ObjectStore {
    /// Create a new S3ObjectStore from the bucket credentials
    pub async fn new(cos: &CosCredentials) -> Result<Self, StorageError> {
        if cos.bucket.is_empty() {
            return Err(StorageError::ConfigurationError(
                "bucket name is empty".to_string(),
            ));
        }

        info!(
            "Creating S3ObjectStore: endpoint={}, region={}, bucket={}, access_key={}",
            cos.endpoint, cos.region, cos.bucket, cos.access_key_id
        );

        let credentials = Credentials::new(
            &cos.access_key_id,
            cos.secret_access_key.expose_secret(),
            None,
            None,
            "StaticCredentialsProvider",
        );
        let aws_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(cos.region.clone()))
            .credentials_provider(credentials)
            .load()
            .await;

        // Object storage endpoints use path-style requests
        let s3_config = aws_sdk_s3::config::Builder::from(&aws_config)
            .endpoint_url(&cos.endpoint)
            .force_path_style(true)
            .build();

        Ok(Self {
            client: Client::from_conf(s3_config),
            bucket: cos.bucket.clone(),
        })
    }
}

/// Map an SDK failure onto StorageError, by service error code first
fn storage_error<E>(
    key: &str,
    error: SdkError<E>,
    fallback: fn(String, String) -> StorageError,
) -> StorageError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
{
    let message = DisplayErrorContext(&error).to_string();

    match &error {
        SdkError::ServiceError(service_err) => match service_err.err().code() {
            Some("NoSuchKey") | Some("NotFound") | Some("KeyNotFound") => {
                StorageError::ObjectNotFound(key.to_string())
            }
            Some("AccessDenied") | Some("InvalidAccessKeyId") | Some("SignatureDoesNotMatch") => {
                StorageError::AccessDenied(key.to_string(), message)
            }
            Some("NoSuchBucket") => {
                StorageError::ConfigurationError(format!("bucket does not exist: {}", message))
            }
            _ => fallback(key.to_string(), message),
        },
        SdkError::DispatchFailure(_) | SdkError::TimeoutError(_) => {
            StorageError::NetworkError(message)
        }
        _ => fallback(key.to_string(), message),
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn get_object(&self, key: &str) -> Result<Bytes, StorageError> {
        debug!("Fetching object from {}: {}", self.bucket, key);

        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| storage_error(key, e, StorageError::ReadError))?;

        let data = response
            .body
            .collect()
            .await
            .map_err(|e| StorageError::ReadError(key.to_string(), e.to_string()))?
            .into_bytes();

        debug!("Fetched {} bytes for {}", data.len(), key);
        Ok(data)
    }

    async fn put_object(&self, key: &str, data: Bytes) -> Result<(), StorageError> {
        debug!("Writing {} bytes to {}: {}", data.len(), self.bucket, key);

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| storage_error(key, e, StorageError::WriteError))?;

        Ok(())
    }

    #[cfg(test)]
    async fn remove_object(&self, key: &str) -> Result<(), StorageError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| storage_error(key, e, StorageError::WriteError))?;

        debug!("Removed object: {}", key);
        Ok(())
    }
}
