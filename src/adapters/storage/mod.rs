//! Storage Adapters
//!
//! Implementations of the FileBatchUploader port used to stage media.
//!
//! ## Available Adapters
//!
//! - **LocalDirectoryUploader** - Copies files into a local directory tree
//! - **ObjectStoreUploader** - Writes objects through OpenDAL (S3, Azure Blob, ...)
//!
//! ## Usage
//!
//! ```ignore
//! use adapters::storage::{LocalDirectoryUploader, ObjectStoreUploader};
//!
//! // Development: local directory
//! let uploader = LocalDirectoryUploader::new("./staged");
//!
//! // Production: S3 with presigned URLs
//! let uploader = ObjectStoreUploader::s3(Some("us-east-1".into()), None, None, None);
//! ```

mod local_directory_uploader;
mod object_store_uploader;

pub use local_directory_uploader::LocalDirectoryUploader;
pub use object_store_uploader::{ObjectStoreUploader, OperatorFactory, DEFAULT_URL_EXPIRATION};
