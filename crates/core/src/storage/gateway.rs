//! Storage gateway implementation using Apache OpenDAL.

use std::collections::HashMap;
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use opendal::{Operator, services};

use super::config::StorageProvider;
use super::error::StorageError;

/// Presigned request for a direct-to-storage upload or download.
#[derive(Debug, Clone)]
pub struct PresignedRequest {
    /// The presigned URL.
    pub url: String,
    /// HTTP method to use (PUT for upload, GET for download).
    pub method: String,
    /// When the URL expires.
    pub expires_at: DateTime<Utc>,
    /// Required headers for the request.
    pub headers: HashMap<String, String>,
}

/// Metadata of a stored object, as reported by the backend.
#[derive(Debug, Clone)]
pub struct ObjectStat {
    /// Content type the backend holds for the object, if any.
    pub mime_type: Option<String>,
    /// Object size in bytes.
    pub size_bytes: u64,
}

/// The five storage operations the attachment pipeline consumes.
///
/// The orchestrator depends on this trait only, never on a storage SDK's
/// own response types. Implemented by [`OpendalGateway`] in production and
/// by in-memory doubles in tests.
pub trait StorageGateway: Send + Sync {
    /// Upload bytes directly to `key` (server-mediated path).
    fn put(
        &self,
        key: &str,
        mime_type: &str,
        bytes: Bytes,
    ) -> impl std::future::Future<Output = Result<(), StorageError>> + Send;

    /// Generate a presigned PUT URL the caller uploads to directly.
    ///
    /// Does not touch the object itself.
    fn presign_put(
        &self,
        key: &str,
        mime_type: &str,
        size_bytes: u64,
        ttl: Duration,
    ) -> impl std::future::Future<Output = Result<PresignedRequest, StorageError>> + Send;

    /// Generate a presigned GET URL with a content-disposition hint so the
    /// filename survives the redirect.
    fn presign_get(
        &self,
        key: &str,
        download_filename: &str,
        ttl: Duration,
    ) -> impl std::future::Future<Output = Result<PresignedRequest, StorageError>> + Send;

    /// Probe the stored object's actual metadata.
    ///
    /// Fails with [`StorageError::NotFound`] if the object was never
    /// uploaded or the key is wrong.
    fn head(
        &self,
        key: &str,
    ) -> impl std::future::Future<Output = Result<ObjectStat, StorageError>> + Send;

    /// Remove the object. Deleting an already-absent key is not an error.
    fn delete(
        &self,
        key: &str,
    ) -> impl std::future::Future<Output = Result<(), StorageError>> + Send;
}

/// Production gateway over an OpenDAL operator.
pub struct OpendalGateway {
    operator: Operator,
    provider: StorageProvider,
}

impl OpendalGateway {
    /// Create a gateway from provider configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage provider cannot be initialized.
    pub fn from_provider(provider: StorageProvider) -> Result<Self, StorageError> {
        let operator = Self::create_operator(&provider)?;
        Ok(Self { operator, provider })
    }

    /// Create OpenDAL operator from provider config.
    fn create_operator(provider: &StorageProvider) -> Result<Operator, StorageError> {
        match provider {
            StorageProvider::S3 {
                endpoint,
                bucket,
                access_key_id,
                secret_access_key,
                region,
            } => {
                let builder = services::S3::default()
                    .endpoint(endpoint)
                    .bucket(bucket)
                    .access_key_id(access_key_id)
                    .secret_access_key(secret_access_key)
                    .region(region);

                Operator::new(builder)
                    .map_err(|e| StorageError::configuration(e.to_string()))?
                    .finish()
                    .pipe(Ok)
            }
            StorageProvider::AzureBlob {
                account,
                access_key,
                container,
            } => {
                let builder = services::Azblob::default()
                    .account_name(account)
                    .account_key(access_key)
                    .container(container);

                Operator::new(builder)
                    .map_err(|e| StorageError::configuration(e.to_string()))?
                    .finish()
                    .pipe(Ok)
            }
            StorageProvider::LocalFs { root } => {
                let builder = services::Fs::default().root(
                    root.to_str()
                        .ok_or_else(|| StorageError::configuration("invalid path"))?,
                );

                Operator::new(builder)
                    .map_err(|e| StorageError::configuration(e.to_string()))?
                    .finish()
                    .pipe(Ok)
            }
        }
    }

    /// Get the storage provider name.
    #[must_use]
    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    /// Get the bucket/container name.
    #[must_use]
    pub fn bucket(&self) -> &str {
        self.provider.bucket()
    }
}

impl StorageGateway for OpendalGateway {
    async fn put(&self, key: &str, mime_type: &str, bytes: Bytes) -> Result<(), StorageError> {
        self.operator
            .write_with(key, bytes)
            .content_type(mime_type)
            .await
            .map(|_| ())
            .map_err(|e| StorageError::from_opendal(key, &e))
    }

    async fn presign_put(
        &self,
        key: &str,
        mime_type: &str,
        size_bytes: u64,
        ttl: Duration,
    ) -> Result<PresignedRequest, StorageError> {
        let presigned = self
            .operator
            .presign_write(key, ttl)
            .await
            .map_err(|e| StorageError::from_opendal(key, &e))?;

        let mut headers = HashMap::new();
        headers.insert("Content-Type".to_string(), mime_type.to_string());
        headers.insert("Content-Length".to_string(), size_bytes.to_string());

        Ok(PresignedRequest {
            url: presigned.uri().to_string(),
            method: presigned.method().to_string(),
            expires_at: expiry(ttl),
            headers,
        })
    }

    async fn presign_get(
        &self,
        key: &str,
        download_filename: &str,
        ttl: Duration,
    ) -> Result<PresignedRequest, StorageError> {
        let presigned = self
            .operator
            .presign_read_with(key, ttl)
            .override_content_disposition(&content_disposition(download_filename))
            .await
            .map_err(|e| StorageError::from_opendal(key, &e))?;

        Ok(PresignedRequest {
            url: presigned.uri().to_string(),
            method: presigned.method().to_string(),
            expires_at: expiry(ttl),
            headers: HashMap::new(),
        })
    }

    async fn head(&self, key: &str) -> Result<ObjectStat, StorageError> {
        let meta = self
            .operator
            .stat(key)
            .await
            .map_err(|e| StorageError::from_opendal(key, &e))?;

        Ok(ObjectStat {
            mime_type: meta.content_type().map(String::from),
            size_bytes: meta.content_length(),
        })
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.operator
            .delete(key)
            .await
            .map_err(|e| StorageError::from_opendal(key, &e))
    }
}

/// Absolute expiry timestamp for a presigned URL.
fn expiry(ttl: Duration) -> DateTime<Utc> {
    Utc::now() + chrono::Duration::seconds(i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX))
}

/// Content-Disposition value carrying the display filename.
fn content_disposition(filename: &str) -> String {
    format!("attachment; filename=\"{filename}\"")
}

/// Extension trait for pipe operator.
trait Pipe: Sized {
    fn pipe<F, R>(self, f: F) -> R
    where
        F: FnOnce(Self) -> R,
    {
        f(self)
    }
}

impl<T> Pipe for T {}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn local_gateway() -> OpendalGateway {
        let root = std::env::temp_dir().join("aegle-gateway-tests");
        OpendalGateway::from_provider(StorageProvider::local_fs(root))
            .expect("should create gateway")
    }

    #[test]
    fn test_content_disposition() {
        assert_eq!(
            content_disposition("scan.pdf"),
            "attachment; filename=\"scan.pdf\""
        );
    }

    #[test]
    fn test_gateway_metadata() {
        let gateway = local_gateway();
        assert_eq!(gateway.provider_name(), "local");
    }

    #[tokio::test]
    async fn test_put_head_delete_roundtrip() {
        let gateway = local_gateway();
        let key = format!("roundtrip/{}/report.pdf", Uuid::new_v4().simple());

        gateway
            .put(&key, "application/pdf", Bytes::from_static(b"%PDF-1.4 test"))
            .await
            .expect("put should succeed");

        let stat = gateway.head(&key).await.expect("head should succeed");
        assert_eq!(stat.size_bytes, 13);

        gateway.delete(&key).await.expect("delete should succeed");

        let err = gateway.head(&key).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_delete_absent_key_is_not_an_error() {
        let gateway = local_gateway();
        let key = format!("absent/{}/ghost.bin", Uuid::new_v4().simple());
        assert!(gateway.delete(&key).await.is_ok());
    }

    #[tokio::test]
    async fn test_presign_unsupported_on_local_fs() {
        let gateway = local_gateway();
        let err = gateway
            .presign_put("a/b.pdf", "application/pdf", 10, Duration::from_secs(60))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::PresignNotSupported));
    }
}
