//! Local Directory Uploader - FileBatchUploader backed by a local directory.
//!
//! Copies files under `{root}/{container}/{prefix}{relative_path}` and
//! returns `file://` URLs. Useful for development and for models that can
//! read from a shared mount.
//!
//! # Directory Structure
//!
//! ```text
//! {root}/
//! └── {container}/
//!     └── {prefix}{conversation_id}/
//!         ├── 000000.000.jpg
//!         └── 000005.000.jpg
//! ```

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tokio::fs;
use url::Url;

use crate::domain::conversation::CleanupObligation;
use crate::domain::foundation::{CleanupError, StagingError};
use crate::ports::{FileBatchUploader, UploadedFiles};

/// Files copied at the same time.
const UPLOAD_PARALLELISM: usize = 3;

/// Uploads files into a local directory tree.
#[derive(Debug, Clone)]
pub struct LocalDirectoryUploader {
    root: PathBuf,
}

impl LocalDirectoryUploader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Destination of one file.
    fn destination(&self, container: &str, prefix: &str, relative_path: &str) -> PathBuf {
        let mut path = self.root.join(container);
        for segment in format!("{}{}", prefix, relative_path).split('/').filter(|s| !s.is_empty()) {
            path.push(segment);
        }
        path
    }

    async fn copy_one(&self, source: PathBuf, destination: PathBuf) -> Result<PathBuf, StagingError> {
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                StagingError::upload(format!("Failed to create directory {}: {}", parent.display(), e))
            })?;
        }
        fs::copy(&source, &destination)
            .await
            .map_err(|e| StagingError::read(source.display().to_string(), e))?;
        Ok(destination)
    }
}

/// Percent-encoded `file://` URL of an absolute or cwd-relative path.
fn file_url(path: &Path) -> Result<String, StagingError> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(|e| StagingError::upload(format!("Cannot resolve {}: {}", path.display(), e)))?
            .join(path)
    };
    Url::from_file_path(&absolute)
        .map(String::from)
        .map_err(|()| StagingError::upload(format!("Cannot build a file URL for {}", absolute.display())))
}

fn delete_files(paths: Vec<PathBuf>) -> CleanupObligation {
    CleanupObligation::new(format!("delete {} uploaded files", paths.len()), move || async move {
        for path in &paths {
            match fs::remove_file(path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(CleanupError::new(format!("delete {}", path.display()), e));
                }
            }
        }
        Ok(())
    })
}

#[async_trait]
impl FileBatchUploader for LocalDirectoryUploader {
    async fn upload(
        &self,
        dir: &Path,
        relative_paths: &[String],
        container: &str,
        prefix: &str,
    ) -> Result<UploadedFiles, StagingError> {
        let container_dir = self.root.join(container);
        fs::create_dir_all(&container_dir).await.map_err(|e| {
            StagingError::upload(format!(
                "Failed to create container {}: {}",
                container_dir.display(),
                e
            ))
        })?;

        let copies: Vec<_> = relative_paths
            .iter()
            .map(|relative| self.copy_one(dir.join(relative), self.destination(container, prefix, relative)))
            .collect();
        let results: Vec<Result<PathBuf, StagingError>> = stream::iter(copies)
            .buffered(UPLOAD_PARALLELISM)
            .collect()
            .await;

        let written: Vec<PathBuf> = results.iter().filter_map(|r| r.as_ref().ok().cloned()).collect();
        if let Some(e) = results.into_iter().find_map(Result::err) {
            if let Err(cleanup_error) = delete_files(written).run().await {
                tracing::warn!(error = %cleanup_error, "Failed to delete partial uploads");
            }
            return Err(e);
        }

        tracing::debug!(
            container = container,
            prefix = prefix,
            count = written.len(),
            "Copied files to local container"
        );

        let cleanup = delete_files(written.clone());
        let download_urls = match written.iter().map(|p| file_url(p)).collect::<Result<Vec<_>, _>>() {
            Ok(urls) => urls,
            Err(e) => {
                if let Err(cleanup_error) = cleanup.run().await {
                    tracing::warn!(error = %cleanup_error, "Failed to delete copied files");
                }
                return Err(e);
            }
        };

        Ok(UploadedFiles {
            download_urls,
            cleanup,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn source_dir(files: &[&str]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for file in files {
            let path = dir.path().join(file);
            fs::create_dir_all(path.parent().unwrap()).await.unwrap();
            fs::write(&path, file.as_bytes()).await.unwrap();
        }
        dir
    }

    #[tokio::test]
    async fn copies_files_under_container_and_prefix() {
        let source = source_dir(&["a.jpg", "nested/b.jpg"]).await;
        let target = tempfile::tempdir().unwrap();
        let uploader = LocalDirectoryUploader::new(target.path());

        let uploaded = uploader
            .upload(
                source.path(),
                &["a.jpg".to_string(), "nested/b.jpg".to_string()],
                "frames",
                "videos/conv1/",
            )
            .await
            .unwrap();

        let expected = target.path().join("frames/videos/conv1/nested/b.jpg");
        assert_eq!(fs::read(&expected).await.unwrap(), b"nested/b.jpg");
        assert_eq!(uploaded.download_urls.len(), 2);
        assert!(uploaded.download_urls[0].starts_with("file://"));
        assert!(uploaded.download_urls[0].ends_with("conv1/a.jpg"));
    }

    #[tokio::test]
    async fn cleanup_removes_uploaded_files() {
        let source = source_dir(&["a.jpg"]).await;
        let target = tempfile::tempdir().unwrap();
        let uploader = LocalDirectoryUploader::new(target.path());

        let uploaded = uploader
            .upload(source.path(), &["a.jpg".to_string()], "c", "p/")
            .await
            .unwrap();
        uploaded.cleanup.run().await.unwrap();

        assert!(!target.path().join("c/p/a.jpg").exists());
        assert!(source.path().join("a.jpg").exists());
    }

    #[tokio::test]
    async fn missing_source_fails_and_removes_partial_copies() {
        let source = source_dir(&["a.jpg"]).await;
        let target = tempfile::tempdir().unwrap();
        let uploader = LocalDirectoryUploader::new(target.path());

        let err = uploader
            .upload(
                source.path(),
                &["a.jpg".to_string(), "missing.jpg".to_string()],
                "c",
                "",
            )
            .await
            .unwrap_err();

        assert!(matches!(err, StagingError::Read { .. }));
        assert!(!target.path().join("c/a.jpg").exists());
    }

    #[tokio::test]
    async fn download_urls_are_percent_encoded() {
        let source = source_dir(&["frame #1.jpg"]).await;
        let target = tempfile::tempdir().unwrap();
        let uploader = LocalDirectoryUploader::new(target.path());

        let uploaded = uploader
            .upload(source.path(), &["frame #1.jpg".to_string()], "c", "")
            .await
            .unwrap();

        let url = &uploaded.download_urls[0];
        assert!(url.ends_with("/c/frame%20%231.jpg"), "{url}");
        let back = Url::parse(url).unwrap().to_file_path().unwrap();
        assert_eq!(back, target.path().join("c/frame #1.jpg"));
    }

    #[test]
    fn relative_paths_resolve_against_current_dir() {
        let url = file_url(Path::new("frames/a.jpg")).unwrap();
        let expected = std::env::current_dir().unwrap().join("frames/a.jpg");
        assert_eq!(Url::parse(&url).unwrap().to_file_path().unwrap(), expected);
    }
}
