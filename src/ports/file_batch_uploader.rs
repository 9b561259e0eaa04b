//! File Batch Uploader Port - Makes local files fetchable by a remote model.

use std::path::Path;

use async_trait::async_trait;

use crate::domain::conversation::CleanupObligation;
use crate::domain::foundation::StagingError;

/// Port for uploading a batch of local files.
///
/// Implementations create the container when absent and return URLs that
/// stay valid for their configured expiration window.
#[async_trait]
pub trait FileBatchUploader: Send + Sync {
    /// Uploads `relative_paths` (relative to `dir`) to
    /// `{container}/{prefix}{relative_path}`.
    async fn upload(
        &self,
        dir: &Path,
        relative_paths: &[String],
        container: &str,
        prefix: &str,
    ) -> Result<UploadedFiles, StagingError>;
}

/// Result of an upload.
#[derive(Debug)]
pub struct UploadedFiles {
    /// One URL per input file, in input order.
    pub download_urls: Vec<String>,
    /// Deletes the uploaded objects.
    pub cleanup: CleanupObligation,
}
