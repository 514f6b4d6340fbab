//! CDN signed URL and signed cookie generation
//!
//! Builds access policies for CDN-fronted resources, serializes them into the canonical JSON
//! form the edge verifies against, and signs them with the private key registered under a
//! public key-pair id.

#![deny(clippy::all, missing_docs)]

mod cookies;
mod encoding;
/// Error types for signing operations
pub mod error;
mod key;
mod policy;
mod signer;

pub use cookies::{CookieOptions, SignedCookie, SignedCookieSet};
pub use encoding::cdn_base64;
pub use error::{SigningError, SigningResult};
pub use key::PrivateKey;
pub use policy::{AccessPolicy, Condition, IpRange, Statement, StatementBuilder};
pub use signer::{CdnSigner, SignedUrl};

/// Cookie carrying the base64 custom policy
pub const COOKIE_POLICY: &str = "CloudFront-Policy";
/// Cookie carrying the detached signature
pub const COOKIE_SIGNATURE: &str = "CloudFront-Signature";
/// Cookie carrying the public key-pair id
pub const COOKIE_KEY_PAIR_ID: &str = "CloudFront-Key-Pair-Id";
/// Cookie carrying the expiry of a canned policy
pub const COOKIE_EXPIRES: &str = "CloudFront-Expires";
