//! Uploads a file to object storage and hands out signed CDN access to it

#![deny(clippy::all, clippy::pedantic, clippy::nursery, missing_docs)]

/// Object storage uploads
pub mod object_storage;

/// Upload, sign and verify sequence
pub mod pipeline;

/// Cookie-authenticated fetches
pub mod probe;

/// HTTP handlers
pub mod routes;

/// Cookie server
pub mod server;

/// Configuration types
pub mod types;
