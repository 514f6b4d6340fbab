//! Upload of local files to object storage
mod error;
mod s3;

use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::fs::File;

pub use error::{StorageError, StorageResult};
pub use s3::{S3ObjectStorage, DEFAULT_PART_SIZE, DEFAULT_UPLOAD_CONCURRENCY, MIN_PART_SIZE};

/// Destination of an upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    /// Destination bucket
    pub bucket: String,
    /// Key the object will be retrievable under
    pub key: String,
    /// Optional `Expires` metadata stored with the object
    pub expires: Option<DateTime<Utc>>,
}

/// An opened, readable local file
#[derive(Debug)]
pub struct UploadSource {
    path: PathBuf,
    file: File,
    len: u64,
}

impl UploadSource {
    /// Opens `path` for upload.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::SourceUnavailable` if the file cannot be opened or inspected
    pub async fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref().to_path_buf();
        let unavailable = |source: std::io::Error| StorageError::SourceUnavailable {
            path: path.clone(),
            source,
        };

        let file = File::open(&path).await.map_err(unavailable)?;
        let len = file.metadata().await.map_err(unavailable)?.len();

        Ok(Self { path, file, len })
    }

    /// Path the source was opened from
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Size in bytes at open time
    #[must_use]
    pub const fn len(&self) -> u64 {
        self.len
    }

    /// Whether the source is empty
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub(crate) fn into_parts(self) -> (PathBuf, File, u64) {
        (self.path, self.file, self.len)
    }
}

/// Where an uploaded object ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectLocation {
    /// Bucket holding the object
    pub bucket: String,
    /// Object key
    pub key: String,
    /// Entity tag reported by the store, if any
    pub e_tag: Option<String>,
}

impl fmt::Display for ObjectLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.key)
    }
}

/// Transmits an opened source to object storage
#[async_trait]
pub trait ObjectUploader: Send + Sync {
    /// Uploads `source` to `request.bucket`/`request.key` and returns its location
    ///
    /// # Errors
    ///
    /// Returns a `StorageError` once the store's retry ceiling is exhausted
    async fn upload(
        &self,
        request: &UploadRequest,
        source: UploadSource,
    ) -> StorageResult<ObjectLocation>;
}
