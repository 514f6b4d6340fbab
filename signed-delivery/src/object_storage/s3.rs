//! S3 implementation of [`ObjectUploader`]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use aws_sdk_s3::{
    primitives::{ByteStream, DateTime as SmithyDateTime, Length},
    types::{CompletedMultipartUpload, CompletedPart},
    Client as S3Client,
};
use chrono::{DateTime, Utc};
use tokio::{io::AsyncReadExt, sync::Semaphore, task::JoinSet};
use tracing::{debug, info, instrument, warn, Instrument, Span};

use super::{ObjectLocation, ObjectUploader, StorageError, StorageResult, UploadRequest, UploadSource};

/// Payloads up to this size go in a single `PutObject`
pub const DEFAULT_PART_SIZE: u64 = MIN_PART_SIZE;
/// Smallest part S3 accepts for any part but the last
pub const MIN_PART_SIZE: u64 = 5 * 1024 * 1024;
/// Parts in flight at once during a multipart upload
pub const DEFAULT_UPLOAD_CONCURRENCY: usize = 5;
const MAX_PARTS: u64 = 10_000;

/// Uploads to S3, switching to multipart for large payloads
pub struct S3ObjectStorage {
    s3_client: Arc<S3Client>,
    part_size: u64,
    concurrency: usize,
}

impl S3ObjectStorage {
    /// Creates an uploader with the default part size and concurrency
    ///
    /// Retries are governed by the client's configuration.
    #[must_use]
    pub const fn new(s3_client: Arc<S3Client>) -> Self {
        Self {
            s3_client,
            part_size: DEFAULT_PART_SIZE,
            concurrency: DEFAULT_UPLOAD_CONCURRENCY,
        }
    }

    /// Overrides the part size (and single-request threshold).
    ///
    /// S3 rejects every part but the last when it is smaller than [`MIN_PART_SIZE`]. Smaller
    /// values are only meant for S3-compatible stand-ins in tests.
    #[must_use]
    pub fn with_part_size(mut self, part_size: u64) -> Self {
        if part_size < MIN_PART_SIZE {
            warn!(
                part_size,
                minimum = MIN_PART_SIZE,
                "part size below the S3 minimum, multipart uploads to S3 will be rejected"
            );
        }
        self.part_size = part_size.max(1);
        self
    }

    /// Overrides how many parts are uploaded concurrently
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    async fn put_single(
        &self,
        request: &UploadRequest,
        path: &Path,
        mut file: tokio::fs::File,
        len: u64,
    ) -> StorageResult<ObjectLocation> {
        // Buffered so the SDK can replay the body on retry
        let mut body = Vec::with_capacity(usize::try_from(len).unwrap_or_default());
        file.read_to_end(&mut body)
            .await
            .map_err(|source| StorageError::SourceUnavailable {
                path: path.to_path_buf(),
                source,
            })?;

        let output = self
            .s3_client
            .put_object()
            .bucket(&request.bucket)
            .key(&request.key)
            .content_length(i64::try_from(body.len()).unwrap_or(i64::MAX))
            .set_expires(request.expires.map(to_smithy_time))
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| StorageError::from_sdk("PutObject", &e))?;

        Ok(ObjectLocation {
            bucket: request.bucket.clone(),
            key: request.key.clone(),
            e_tag: output.e_tag().map(ToString::to_string),
        })
    }

    async fn put_multipart(
        &self,
        request: &UploadRequest,
        path: PathBuf,
        len: u64,
        part_size: u64,
    ) -> StorageResult<ObjectLocation> {
        let created = self
            .s3_client
            .create_multipart_upload()
            .bucket(&request.bucket)
            .key(&request.key)
            .set_expires(request.expires.map(to_smithy_time))
            .send()
            .await
            .map_err(|e| StorageError::from_sdk("CreateMultipartUpload", &e))?;

        let upload_id = created
            .upload_id()
            .ok_or_else(|| {
                StorageError::S3Error("CreateMultipartUpload returned no upload id".to_string())
            })?
            .to_string();

        debug!(upload_id = %upload_id, "created multipart upload");

        let result = match self.upload_parts(request, &upload_id, path, len, part_size).await {
            Ok(parts) => self.complete(request, &upload_id, parts).await,
            Err(e) => Err(e),
        };

        if result.is_err() {
            self.abort(request, &upload_id).await;
        }

        result
    }

    async fn upload_parts(
        &self,
        request: &UploadRequest,
        upload_id: &str,
        path: PathBuf,
        len: u64,
        part_size: u64,
    ) -> StorageResult<Vec<CompletedPart>> {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();

        for (index, (offset, length)) in part_ranges(len, part_size).enumerate() {
            // S3 part numbers are 1-based
            let part_number = i32::try_from(index + 1)
                .map_err(|_| StorageError::ConfigError("too many parts".to_string()))?;
            let semaphore = semaphore.clone();
            let s3_client = self.s3_client.clone();
            let bucket = request.bucket.clone();
            let key = request.key.clone();
            let upload_id = upload_id.to_string();
            let path = path.clone();

            tasks.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| StorageError::ConfigError(e.to_string()))?;

                let body = ByteStream::read_from()
                    .path(&path)
                    .offset(offset)
                    .length(Length::Exact(length))
                    .build()
                    .await
                    .map_err(|e| StorageError::SourceUnavailable {
                        path: path.clone(),
                        source: std::io::Error::other(e),
                    })?;

                let output = s3_client
                    .upload_part()
                    .bucket(bucket)
                    .key(key)
                    .upload_id(upload_id)
                    .part_number(part_number)
                    .body(body)
                    .send()
                    .await
                    .map_err(|e| StorageError::from_sdk("UploadPart", &e))?;

                debug!(part_number, offset, length, "uploaded part");

                Ok::<_, StorageError>(
                    CompletedPart::builder()
                        .part_number(part_number)
                        .set_e_tag(output.e_tag().map(ToString::to_string))
                        .build(),
                )
            }
            .instrument(Span::current()));
        }

        let mut parts = Vec::with_capacity(tasks.len());
        while let Some(joined) = tasks.join_next().await {
            let part = joined
                .map_err(|e| StorageError::S3Error(format!("part upload task failed: {e}")))??;
            parts.push(part);
        }
        parts.sort_by_key(CompletedPart::part_number);

        Ok(parts)
    }

    async fn complete(
        &self,
        request: &UploadRequest,
        upload_id: &str,
        parts: Vec<CompletedPart>,
    ) -> StorageResult<ObjectLocation> {
        let output = self
            .s3_client
            .complete_multipart_upload()
            .bucket(&request.bucket)
            .key(&request.key)
            .upload_id(upload_id)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(parts))
                    .build(),
            )
            .send()
            .await
            .map_err(|e| StorageError::from_sdk("CompleteMultipartUpload", &e))?;

        debug!(location = ?output.location(), "completed multipart upload");

        Ok(ObjectLocation {
            bucket: request.bucket.clone(),
            key: request.key.clone(),
            e_tag: output.e_tag().map(ToString::to_string),
        })
    }

    async fn abort(&self, request: &UploadRequest, upload_id: &str) {
        let result = self
            .s3_client
            .abort_multipart_upload()
            .bucket(&request.bucket)
            .key(&request.key)
            .upload_id(upload_id)
            .send()
            .await;

        if let Err(e) = result {
            warn!(
                upload_id,
                "Failed to abort multipart upload: {}",
                StorageError::from_sdk("AbortMultipartUpload", &e)
            );
        }
    }

    fn effective_part_size(&self, len: u64) -> u64 {
        self.part_size.max(len.div_ceil(MAX_PARTS))
    }
}

#[async_trait]
impl ObjectUploader for S3ObjectStorage {
    #[instrument(skip(self, source), fields(bucket = %request.bucket, key = %request.key))]
    async fn upload(
        &self,
        request: &UploadRequest,
        source: UploadSource,
    ) -> StorageResult<ObjectLocation> {
        let (path, file, len) = source.into_parts();

        let location = if len <= self.part_size {
            debug!(len, "uploading in a single request");
            self.put_single(request, &path, file, len).await?
        } else {
            drop(file);
            let part_size = self.effective_part_size(len);
            debug!(len, part_size, "uploading in parts");
            self.put_multipart(request, path, len, part_size).await?
        };

        info!(location = %location, "Upload finished");
        Ok(location)
    }
}

/// `(offset, length)` of each part of a `len`-byte payload
fn part_ranges(len: u64, part_size: u64) -> impl Iterator<Item = (u64, u64)> {
    let part_size = part_size.max(1);
    (0..len.div_ceil(part_size)).map(move |i| {
        let offset = i * part_size;
        (offset, part_size.min(len - offset))
    })
}

fn to_smithy_time(time: DateTime<Utc>) -> SmithyDateTime {
    SmithyDateTime::from_secs(time.timestamp())
}
