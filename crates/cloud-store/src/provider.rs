//! Object provider: engine-facing facade over a backend
//!
//! Turns engine-level file and bucket operations into one or more backend
//! calls with integrity checks, consistent error classification, and
//! listing pagination. The provider never retries; retry policy belongs
//! to the backend.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use cloud_core::{CloudConfig, Error, Result};
use tokio::fs;
use tracing::{debug, error, info, instrument, warn};

use crate::backend::{ObjectInfo, ObjectStoreBackend};

/// Page size for bounded listing requests
const LIST_PAGE_SIZE: usize = 50;

/// Engine-facing facade over an [`ObjectStoreBackend`]
///
/// Holds no mutable state beyond configuration set at startup, so it is
/// safe to share across tasks. Operations on the same object path are
/// not internally serialized; callers that need ordering (manifest
/// sync) must serialize themselves.
pub struct ObjectProvider {
    backend: Arc<dyn ObjectStoreBackend>,
    config: CloudConfig,
}

impl ObjectProvider {
    pub fn new(backend: Arc<dyn ObjectStoreBackend>, config: CloudConfig) -> Self {
        Self { backend, config }
    }

    pub fn backend(&self) -> &Arc<dyn ObjectStoreBackend> {
        &self.backend
    }

    pub fn config(&self) -> &CloudConfig {
        &self.config
    }

    /// One-time startup check of the configured buckets
    ///
    /// Rejects source and destination buckets in different regions, then
    /// verifies the destination bucket exists, creating it when
    /// `create_bucket_if_missing` is set.
    #[instrument(skip(self), fields(backend = self.backend.kind()))]
    pub async fn sanitize(&self) -> Result<()> {
        if let (Some(src), Some(dest)) = (&self.config.src_bucket, &self.config.dest_bucket) {
            if src.name != dest.name && src.region != dest.region {
                error!(
                    src_bucket = %src.name,
                    dest_bucket = %dest.name,
                    "Buckets configured in two different regions"
                );
                return Err(Error::invalid_argument(
                    "two different regions not supported",
                ));
            }
        }

        let Some(dest) = &self.config.dest_bucket else {
            return Ok(());
        };

        if self.exists_bucket(&dest.name).await? {
            info!(bucket = %dest.name, "Bucket already exists");
        } else if self.config.create_bucket_if_missing {
            info!(bucket = %dest.name, "Going to create bucket");
            self.create_bucket(&dest.name).await?;
        } else {
            return Err(Error::not_found(format!(
                "bucket {} not found and create_bucket_if_missing is false",
                dest.name
            )));
        }
        Ok(())
    }

    /// Create a bucket; success if it already exists and is ours
    pub async fn create_bucket(&self, bucket: &str) -> Result<()> {
        self.backend
            .create_bucket(bucket, self.config.dest_region())
            .await
    }

    pub async fn exists_bucket(&self, bucket: &str) -> Result<bool> {
        self.backend.bucket_exists(bucket).await
    }

    /// List all objects under `path_prefix`, with the prefix stripped
    ///
    /// Exhausts every page before returning, so the result is complete,
    /// in lexicographic order, and free of duplicates.
    #[instrument(skip(self), fields(backend = self.backend.kind()))]
    pub async fn list_objects(&self, bucket: &str, path_prefix: &str) -> Result<Vec<String>> {
        // Keys never start with a path separator, and a trailing
        // separator keeps sibling directories with this prefix out of
        // the result.
        let mut prefix = path_prefix.trim_start_matches('/').to_string();
        if !prefix.ends_with('/') {
            prefix.push('/');
        }

        let mut names = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let page = self
                .backend
                .list_objects(bucket, &prefix, marker.as_deref(), LIST_PAGE_SIZE)
                .await?;

            for key in &page.keys {
                let name = key.strip_prefix(&prefix).ok_or_else(|| {
                    Error::io(format!(
                        "unexpected listing result: key {} outside prefix {}",
                        key, prefix
                    ))
                })?;
                names.push(name.to_string());
            }

            if !page.is_truncated {
                break;
            }
            // A truncated response may omit the next marker; keys come
            // back in lexicographic order, so the last key of this page
            // is a valid restart point.
            marker = page.next_marker.or_else(|| page.keys.last().cloned());
            if marker.is_none() {
                return Err(Error::io(format!(
                    "truncated listing of {}/{} returned no keys and no marker",
                    bucket, prefix
                )));
            }
        }

        debug!(bucket, prefix = %prefix, count = names.len(), "Listed objects");
        Ok(names)
    }

    /// Best-effort bulk delete of everything under `path_prefix`
    ///
    /// Continues past individual delete failures; returns the first
    /// failure if any delete failed.
    #[instrument(skip(self), fields(backend = self.backend.kind()))]
    pub async fn empty_bucket(&self, bucket: &str, path_prefix: &str) -> Result<()> {
        let names = self.list_objects(bucket, path_prefix).await?;
        debug!(
            bucket,
            count = names.len(),
            "Going to delete objects in bucket"
        );

        let prefix = {
            let mut p = path_prefix.trim_start_matches('/').to_string();
            if !p.ends_with('/') {
                p.push('/');
            }
            p
        };

        let mut first_err = None;
        for name in names {
            let key = format!("{}{}", prefix, name);
            if let Err(e) = self.backend.delete_object(bucket, &key).await {
                warn!(bucket, key = %key, error = %e, "Unable to delete object");
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            None => Ok(()),
            Some(e) => Err(e),
        }
    }

    pub async fn delete_object(&self, bucket: &str, path: &str) -> Result<()> {
        let res = self.backend.delete_object(bucket, path).await;
        debug!(bucket, path, ok = res.is_ok(), "Deleted object");
        res
    }

    pub async fn copy_object(
        &self,
        src_bucket: &str,
        src_path: &str,
        dest_bucket: &str,
        dest_path: &str,
    ) -> Result<()> {
        self.backend
            .copy_object(src_bucket, src_path, dest_bucket, dest_path)
            .await
    }

    pub async fn exists_object(&self, bucket: &str, path: &str) -> Result<bool> {
        match self.backend.head_object(bucket, path).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub async fn get_object_info(&self, bucket: &str, path: &str) -> Result<ObjectInfo> {
        self.backend.head_object(bucket, path).await
    }

    pub async fn get_object_size(&self, bucket: &str, path: &str) -> Result<u64> {
        Ok(self.backend.head_object(bucket, path).await?.size)
    }

    pub async fn get_object_modification_time(&self, bucket: &str, path: &str) -> Result<u64> {
        Ok(self
            .backend
            .head_object(bucket, path)
            .await?
            .last_modified_ms)
    }

    pub async fn get_object_metadata(
        &self,
        bucket: &str,
        path: &str,
    ) -> Result<HashMap<String, String>> {
        Ok(self.backend.head_object(bucket, path).await?.metadata)
    }

    pub async fn put_object_metadata(
        &self,
        bucket: &str,
        path: &str,
        metadata: &HashMap<String, String>,
    ) -> Result<()> {
        self.backend.put_object_metadata(bucket, path, metadata).await
    }

    /// Inclusive byte-range fetch used by readable files
    pub async fn get_object_range(
        &self,
        bucket: &str,
        path: &str,
        start: u64,
        end: u64,
    ) -> Result<Bytes> {
        self.backend.get_object_range(bucket, path, start, end).await
    }

    /// Integrity-checked download of a whole object
    ///
    /// Downloads to `<destination>.tmp`, verifies the local byte count
    /// against the size the backend reported, and only then renames the
    /// temp file into place. A truncated transfer that the backend
    /// reported as complete fails here instead of corrupting the
    /// destination.
    #[instrument(skip(self), fields(backend = self.backend.kind()))]
    pub async fn get_object(
        &self,
        bucket: &str,
        path: &str,
        local_destination: &Path,
    ) -> Result<()> {
        let tmp_destination = tmp_path(local_destination);

        let remote_size = match self
            .backend
            .download_object(bucket, path, &tmp_destination)
            .await
        {
            Ok(size) => size,
            Err(e) => {
                let _ = fs::remove_file(&tmp_destination).await;
                return Err(e);
            }
        };

        let local_size = match fs::metadata(&tmp_destination).await {
            Ok(meta) => meta.len(),
            Err(e) => {
                let _ = fs::remove_file(&tmp_destination).await;
                return Err(e.into());
            }
        };
        if local_size != remote_size {
            let _ = fs::remove_file(&tmp_destination).await;
            error!(
                bucket,
                path,
                local_size,
                remote_size,
                "Local size does not match cloud size"
            );
            return Err(Error::io(format!(
                "partial download of {}",
                local_destination.display()
            )));
        }

        fs::rename(&tmp_destination, local_destination).await?;
        info!(bucket, path, size = local_size, "Downloaded object");
        Ok(())
    }

    /// Upload a local file as an object
    ///
    /// Zero-size objects are reserved for directory markers, so a
    /// zero-length local file is rejected before any backend call.
    #[instrument(skip(self), fields(backend = self.backend.kind()))]
    pub async fn put_object(&self, local_file: &Path, bucket: &str, path: &str) -> Result<()> {
        let size = fs::metadata(local_file)
            .await
            .map_err(|e| {
                error!(local_file = %local_file.display(), error = %e, "PutObject error getting size");
                Error::from(e)
            })?
            .len();
        if size == 0 {
            error!(local_file = %local_file.display(), "PutObject rejecting zero size file");
            return Err(Error::io(format!(
                "{} zero size",
                local_file.display()
            )));
        }

        self.backend.put_object(local_file, bucket, path, size).await?;
        info!(bucket, path, size, "Uploaded object");
        Ok(())
    }
}

fn tmp_path(destination: &Path) -> PathBuf {
    let mut os = destination.as_os_str().to_os_string();
    os.push(".tmp");
    PathBuf::from(os)
}
