//! Error types for object storage operations

use std::path::PathBuf;

use aws_sdk_s3::{config::http::HttpResponse, error::DisplayErrorContext, error::SdkError};
use thiserror::Error;

/// Result type for object storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during upload
#[derive(Error, Debug)]
pub enum StorageError {
    /// Local source could not be opened or read
    #[error("Unable to open file {path:?}: {source}")]
    SourceUnavailable {
        /// Path of the source file
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// S3 service error
    #[error("S3 service error: {0}")]
    S3Error(String),

    /// Upstream service error (5xx from S3 after retries)
    #[error("Upstream service error: {0}")]
    UpstreamError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl StorageError {
    /// Classifies an SDK failure, keeping 5xx responses distinguishable
    pub(crate) fn from_sdk<E>(operation: &'static str, error: &SdkError<E, HttpResponse>) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        let message = format!("{operation} failed: {}", DisplayErrorContext(error));
        match error.raw_response() {
            Some(raw) if raw.status().as_u16() >= 500 => Self::UpstreamError(message),
            _ => Self::S3Error(message),
        }
    }
}
