//! Object-store backend trait definition
//!
//! Defines the async interface that all object-store backends must
//! implement. The provider treats every call as a blocking operation with
//! a definite success/failure outcome; cancellation and retries, if any,
//! are the backend's concern and surface here only as errors.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use bytes::Bytes;
use cloud_core::Result;

/// One page of a bucket listing
#[derive(Debug, Clone, Default)]
pub struct ListPage {
    /// Keys in this page, in lexicographic order
    pub keys: Vec<String>,

    /// Whether more keys remain after this page
    pub is_truncated: bool,

    /// Marker to request the next page; backends may omit it even when
    /// the page is truncated
    pub next_marker: Option<String>,
}

/// Metadata returned by a head request
#[derive(Debug, Clone, Default)]
pub struct ObjectInfo {
    /// Object size in bytes; zero-size objects represent directories
    pub size: u64,

    /// Last modification time in milliseconds since the epoch
    pub last_modified_ms: u64,

    /// User-defined object metadata
    pub metadata: HashMap<String, String>,
}

/// Async trait for object-store backends
///
/// Implementors map each operation onto one vendor request and classify
/// the outcome: absent objects and buckets become `Error::NotFound`,
/// everything else that fails becomes `Error::Io` carrying the vendor's
/// message. The provider never branches on vendor identity.
#[async_trait]
pub trait ObjectStoreBackend: Send + Sync {
    /// Short backend name used in log messages
    fn kind(&self) -> &'static str;

    /// Create a bucket, optionally constrained to a location
    ///
    /// Idempotent: a bucket that already exists and is owned by the
    /// caller is success.
    async fn create_bucket(&self, bucket: &str, location: Option<&str>) -> Result<()>;

    /// Check whether a bucket exists
    async fn bucket_exists(&self, bucket: &str) -> Result<bool>;

    /// List up to `max_keys` keys under `prefix`, starting after `marker`
    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        marker: Option<&str>,
        max_keys: usize,
    ) -> Result<ListPage>;

    /// Fetch size, modification time and metadata for one object
    async fn head_object(&self, bucket: &str, key: &str) -> Result<ObjectInfo>;

    /// Fetch the inclusive byte range `[start, end]` of an object
    ///
    /// Ranges cannot be empty; callers wanting zero bytes must request a
    /// single byte and discard it.
    async fn get_object_range(&self, bucket: &str, key: &str, start: u64, end: u64)
        -> Result<Bytes>;

    /// Download a whole object to a local file
    ///
    /// Returns the size the backend reported as transferred, which the
    /// provider verifies against the bytes actually on disk.
    async fn download_object(&self, bucket: &str, key: &str, destination: &Path) -> Result<u64>;

    /// Upload a local file as an object
    async fn put_object(
        &self,
        local_path: &Path,
        bucket: &str,
        key: &str,
        size_hint: u64,
    ) -> Result<()>;

    /// Replace the user-defined metadata of an object
    async fn put_object_metadata(
        &self,
        bucket: &str,
        key: &str,
        metadata: &HashMap<String, String>,
    ) -> Result<()>;

    /// Delete one object
    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()>;

    /// Server-side copy of one object
    async fn copy_object(
        &self,
        src_bucket: &str,
        src_key: &str,
        dst_bucket: &str,
        dst_key: &str,
    ) -> Result<()>;
}
