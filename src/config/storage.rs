//! Media storage configuration

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use super::error::ValidationError;

/// Where staged media is uploaded
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Uploader implementation
    #[serde(default)]
    pub kind: StorageKind,

    /// Bucket / container name
    #[serde(default)]
    pub container_name: String,

    /// Prefix of every object path
    #[serde(default)]
    pub path_prefix: String,

    /// Validity of download URLs in seconds
    #[serde(default = "default_expiration")]
    pub download_url_expiration_secs: u64,

    /// Root directory of the local uploader
    #[serde(default = "default_local_root")]
    pub local_root: PathBuf,

    /// Public base URL serving the container, instead of presigned URLs
    pub public_base_url: Option<String>,

    /// S3 region
    pub region: Option<String>,

    /// S3 or Azure Blob endpoint
    pub endpoint: Option<String>,

    /// S3 access key id, or Azure storage account name
    pub account_name: Option<String>,

    /// S3 secret access key, or Azure storage account key
    pub account_key: Option<String>,

    /// Delete uploaded files when the conversation ends
    #[serde(default = "default_true")]
    pub delete_files_when_conversation_ends: bool,
}

/// Uploader implementation
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    #[default]
    Local,
    S3,
    Azblob,
}

impl StorageConfig {
    /// Get expiration as Duration
    pub fn expiration(&self) -> Duration {
        Duration::from_secs(self.download_url_expiration_secs)
    }

    /// Validate storage configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.container_name.trim().is_empty() {
            return Err(ValidationError::MissingRequired("STORAGE__CONTAINER_NAME"));
        }
        match self.kind {
            StorageKind::Local => Ok(()),
            StorageKind::S3 if !cfg!(feature = "s3") => {
                Err(ValidationError::StorageBackendUnavailable("s3"))
            }
            StorageKind::Azblob if !cfg!(feature = "azblob") => {
                Err(ValidationError::StorageBackendUnavailable("azblob"))
            }
            StorageKind::Azblob if self.endpoint.is_none() => {
                Err(ValidationError::MissingRequired("STORAGE__ENDPOINT"))
            }
            StorageKind::Azblob if self.account_name.is_none() || self.account_key.is_none() => {
                Err(ValidationError::MissingRequired("STORAGE__ACCOUNT_NAME and STORAGE__ACCOUNT_KEY"))
            }
            StorageKind::S3 | StorageKind::Azblob => Ok(()),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            kind: StorageKind::default(),
            container_name: String::new(),
            path_prefix: String::new(),
            download_url_expiration_secs: default_expiration(),
            local_root: default_local_root(),
            public_base_url: None,
            region: None,
            endpoint: None,
            account_name: None,
            account_key: None,
            delete_files_when_conversation_ends: true,
        }
    }
}

fn default_expiration() -> u64 {
    3600
}

fn default_local_root() -> PathBuf {
    std::env::temp_dir().join("chat-about-video")
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_defaults() {
        let config = StorageConfig::default();
        assert_eq!(config.kind, StorageKind::Local);
        assert_eq!(config.expiration(), Duration::from_secs(3600));
        assert!(config.delete_files_when_conversation_ends);
    }

    #[test]
    fn test_validation_requires_container() {
        assert_eq!(
            StorageConfig::default().validate(),
            Err(ValidationError::MissingRequired("STORAGE__CONTAINER_NAME"))
        );
    }

    #[test]
    fn test_local_storage_is_always_available() {
        let config = StorageConfig {
            container_name: "frames".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[cfg(not(feature = "s3"))]
    #[test]
    fn test_s3_requires_feature() {
        let config = StorageConfig {
            kind: StorageKind::S3,
            container_name: "frames".to_string(),
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(ValidationError::StorageBackendUnavailable("s3"))
        );
    }
}
