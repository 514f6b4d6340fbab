use std::path::PathBuf;

use thiserror::Error;

/// Result type for signing operations
pub type SigningResult<T> = Result<T, SigningError>;

/// Errors that can occur while loading keys, building policies or signing
#[derive(Error, Debug)]
pub enum SigningError {
    /// Private key material could not be parsed
    #[error("invalid private key: {0}")]
    InvalidKey(String),

    /// Private key file could not be read
    #[error("unable to read private key file {path:?}: {source}")]
    KeyFile {
        /// Path that was read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Policy is structurally invalid
    #[error("invalid policy: {0}")]
    InvalidPolicy(String),

    /// A caller-supplied value is invalid
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The signing primitive rejected the message or key
    #[error("signing operation failed: {0}")]
    SigningFailure(String),

    /// Resource URL could not be parsed
    #[error("malformed resource URL {url:?}: {reason}")]
    MalformedUrl {
        /// URL as supplied
        url: String,
        /// Why it was rejected
        reason: String,
    },
}
