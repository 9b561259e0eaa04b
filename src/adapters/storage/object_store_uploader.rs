//! Object Store Uploader - FileBatchUploader backed by OpenDAL.
//!
//! One operator is built per container through an [`OperatorFactory`], so
//! the same uploader serves S3 buckets, Azure Blob containers or anything
//! else OpenDAL speaks. Download URLs are presigned reads unless a public
//! base URL is configured.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use opendal::Operator;

use crate::domain::conversation::CleanupObligation;
use crate::domain::foundation::{CleanupError, StagingError};
use crate::ports::{FileBatchUploader, UploadedFiles};

/// Objects written at the same time.
const UPLOAD_PARALLELISM: usize = 3;

/// Default validity of presigned download URLs.
pub const DEFAULT_URL_EXPIRATION: Duration = Duration::from_secs(3600);

/// Builds the operator for a container.
pub type OperatorFactory = Arc<dyn Fn(&str) -> Result<Operator, opendal::Error> + Send + Sync>;

/// Uploads files to an object store.
#[derive(Clone)]
pub struct ObjectStoreUploader {
    operator_factory: OperatorFactory,
    expiration: Duration,
    public_base_url: Option<String>,
}

impl ObjectStoreUploader {
    pub fn new(operator_factory: OperatorFactory) -> Self {
        Self {
            operator_factory,
            expiration: DEFAULT_URL_EXPIRATION,
            public_base_url: None,
        }
    }

    /// S3 buckets; the container name is the bucket.
    #[cfg(feature = "s3")]
    pub fn s3(
        region: Option<String>,
        endpoint: Option<String>,
        access_key_id: Option<String>,
        secret_access_key: Option<secrecy::Secret<String>>,
    ) -> Self {
        use secrecy::ExposeSecret;

        Self::new(Arc::new(move |bucket: &str| {
            let mut builder = opendal::services::S3::default().bucket(bucket);
            if let Some(ref region) = region {
                builder = builder.region(region);
            }
            if let Some(ref endpoint) = endpoint {
                builder = builder.endpoint(endpoint);
            }
            if let Some(ref access_key_id) = access_key_id {
                builder = builder.access_key_id(access_key_id);
            }
            if let Some(ref secret_access_key) = secret_access_key {
                builder = builder.secret_access_key(secret_access_key.expose_secret());
            }
            Operator::new(builder).map(|op| op.finish())
        }))
    }

    /// Azure Blob containers.
    #[cfg(feature = "azblob")]
    pub fn azure_blob(
        endpoint: String,
        account_name: String,
        account_key: secrecy::Secret<String>,
    ) -> Self {
        use secrecy::ExposeSecret;

        Self::new(Arc::new(move |container: &str| {
            let builder = opendal::services::Azblob::default()
                .container(container)
                .endpoint(&endpoint)
                .account_name(&account_name)
                .account_key(account_key.expose_secret());
            Operator::new(builder).map(|op| op.finish())
        }))
    }

    /// Validity of presigned URLs.
    pub fn with_expiration(mut self, expiration: Duration) -> Self {
        self.expiration = expiration;
        self
    }

    /// Serves objects from `{base}/{container}/{key}` instead of presigning.
    pub fn with_public_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.public_base_url = Some(base_url.into().trim_end_matches('/').to_string());
        self
    }

    fn operator(&self, container: &str) -> Result<Operator, StagingError> {
        (self.operator_factory)(container).map_err(|e| {
            StagingError::upload(format!("Failed to open container {}: {}", container, e))
        })
    }

    async fn put(
        &self,
        operator: &Operator,
        container: &str,
        source: PathBuf,
        key: &str,
    ) -> Result<String, StagingError> {
        let bytes = tokio::fs::read(&source)
            .await
            .map_err(|e| StagingError::read(source.display().to_string(), e))?;
        operator
            .write(key, bytes)
            .await
            .map_err(|e| StagingError::upload(format!("Failed to write {}: {}", key, e)))?;

        match &self.public_base_url {
            Some(base) => Ok(format!("{}/{}/{}", base, container, key)),
            None => {
                let request = operator
                    .presign_read(key, self.expiration)
                    .await
                    .map_err(|e| StagingError::upload(format!("Failed to presign {}: {}", key, e)))?;
                Ok(request.uri().to_string())
            }
        }
    }
}

impl fmt::Debug for ObjectStoreUploader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectStoreUploader")
            .field("expiration", &self.expiration)
            .field("public_base_url", &self.public_base_url)
            .finish_non_exhaustive()
    }
}

fn delete_objects(operator: Operator, container: String, keys: Vec<String>) -> CleanupObligation {
    let label = format!("delete {} objects from {}", keys.len(), container);
    CleanupObligation::new(label.clone(), move || async move {
        for key in &keys {
            operator
                .delete(key)
                .await
                .map_err(|e| CleanupError::new(label.clone(), format!("{}: {}", key, e)))?;
        }
        Ok(())
    })
}

#[async_trait]
impl FileBatchUploader for ObjectStoreUploader {
    async fn upload(
        &self,
        dir: &Path,
        relative_paths: &[String],
        container: &str,
        prefix: &str,
    ) -> Result<UploadedFiles, StagingError> {
        let operator = self.operator(container)?;
        operator.check().await.map_err(|e| {
            StagingError::upload(format!("Container {} is not accessible: {}", container, e))
        })?;

        let keys: Vec<String> = relative_paths
            .iter()
            .map(|relative| format!("{}{}", prefix, relative))
            .collect();
        let puts: Vec<_> = relative_paths
            .iter()
            .zip(&keys)
            .map(|(relative, key)| self.put(&operator, container, dir.join(relative), key))
            .collect();
        let results: Vec<Result<String, StagingError>> = stream::iter(puts)
            .buffered(UPLOAD_PARALLELISM)
            .collect()
            .await;

        let cleanup = delete_objects(operator, container.to_string(), keys);
        let download_urls = match results.into_iter().collect::<Result<Vec<String>, StagingError>>() {
            Ok(urls) => urls,
            Err(e) => {
                if let Err(cleanup_error) = cleanup.run().await {
                    tracing::warn!(error = %cleanup_error, "Failed to delete partial uploads");
                }
                return Err(e);
            }
        };

        tracing::debug!(
            container = container,
            prefix = prefix,
            count = download_urls.len(),
            "Uploaded files to object store"
        );

        Ok(UploadedFiles {
            download_urls,
            cleanup,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_uploader() -> (ObjectStoreUploader, Operator) {
        let operator = Operator::new(opendal::services::Memory::default())
            .unwrap()
            .finish();
        let shared = operator.clone();
        let uploader = ObjectStoreUploader::new(Arc::new(move |_container: &str| Ok(shared.clone())))
            .with_public_base_url("https://cdn.example.com/");
        (uploader, operator)
    }

    async fn source_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("a.jpg"), b"frame-a").await.unwrap();
        tokio::fs::write(dir.path().join("b.jpg"), b"frame-b").await.unwrap();
        dir
    }

    #[tokio::test]
    async fn writes_objects_under_prefix_in_input_order() {
        let (uploader, operator) = memory_uploader();
        let source = source_dir().await;

        let uploaded = uploader
            .upload(
                source.path(),
                &["b.jpg".to_string(), "a.jpg".to_string()],
                "frames",
                "videos/conv1/",
            )
            .await
            .unwrap();

        assert_eq!(
            uploaded.download_urls,
            vec![
                "https://cdn.example.com/frames/videos/conv1/b.jpg",
                "https://cdn.example.com/frames/videos/conv1/a.jpg",
            ]
        );
        let stored = operator.read("videos/conv1/a.jpg").await.unwrap();
        assert_eq!(stored.to_vec(), b"frame-a");
    }

    #[tokio::test]
    async fn cleanup_deletes_objects() {
        let (uploader, operator) = memory_uploader();
        let source = source_dir().await;

        let uploaded = uploader
            .upload(source.path(), &["a.jpg".to_string()], "frames", "p/")
            .await
            .unwrap();
        uploaded.cleanup.run().await.unwrap();

        assert!(!operator.exists("p/a.jpg").await.unwrap());
    }

    #[tokio::test]
    async fn unreadable_source_fails_and_removes_written_objects() {
        let (uploader, operator) = memory_uploader();
        let source = source_dir().await;

        let err = uploader
            .upload(
                source.path(),
                &["a.jpg".to_string(), "missing.jpg".to_string()],
                "frames",
                "",
            )
            .await
            .unwrap_err();

        assert!(matches!(err, StagingError::Read { .. }));
        assert!(!operator.exists("a.jpg").await.unwrap());
    }

    #[tokio::test]
    async fn presigning_unsupported_backend_is_an_upload_error() {
        let operator = Operator::new(opendal::services::Memory::default())
            .unwrap()
            .finish();
        let uploader = ObjectStoreUploader::new(Arc::new(move |_: &str| Ok(operator.clone())));
        let source = source_dir().await;

        let err = uploader
            .upload(source.path(), &["a.jpg".to_string()], "frames", "")
            .await
            .unwrap_err();

        assert!(matches!(err, StagingError::Upload(_)));
    }
}
