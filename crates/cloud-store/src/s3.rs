//! S3 object-store backend
//!
//! Implements [`ObjectStoreBackend`] against Amazon S3 and S3-compatible
//! services (MinIO, LocalStack) via custom endpoint support. Uses the
//! marker-based ListObjects API so the provider's pagination contract
//! (lexicographic keys, optional next marker) holds.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::{
    config::Builder as S3ConfigBuilder,
    error::DisplayErrorContext,
    primitives::ByteStream,
    types::{BucketLocationConstraint, CreateBucketConfiguration},
    Client,
};
use bytes::Bytes;
use cloud_core::{Error, Result};
use tokio::fs::File;
use tracing::{debug, instrument};

use crate::backend::{ListPage, ObjectInfo, ObjectStoreBackend};

/// Configuration for the S3 backend
#[derive(Debug, Clone)]
pub struct S3Options {
    /// AWS region (default: "us-east-1")
    pub region: Option<String>,

    /// Optional custom endpoint URL (for MinIO, LocalStack, etc.)
    pub endpoint_url: Option<String>,

    /// Force path-style addressing (required for MinIO)
    pub force_path_style: bool,
}

impl Default for S3Options {
    fn default() -> Self {
        Self {
            region: Some("us-east-1".to_string()),
            endpoint_url: None,
            force_path_style: false,
        }
    }
}

/// S3-compatible object-store backend
#[derive(Debug, Clone)]
pub struct S3Store {
    client: Client,
}

impl S3Store {
    /// Create a backend with default AWS configuration
    ///
    /// Uses environment variables or instance profile for credentials.
    pub async fn new() -> Self {
        Self::with_options(S3Options::default()).await
    }

    /// Create a backend with custom configuration
    pub async fn with_options(options: S3Options) -> Self {
        let aws_config = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_sdk_s3::config::Region::new(
                options.region.unwrap_or_else(|| "us-east-1".to_string()),
            ))
            .load()
            .await;

        let mut builder = S3ConfigBuilder::from(&aws_config);

        if let Some(endpoint) = &options.endpoint_url {
            builder = builder.endpoint_url(endpoint);
        }

        if options.force_path_style {
            builder = builder.force_path_style(true);
        }

        Self {
            client: Client::from_conf(builder.build()),
        }
    }

    /// Create a backend for MinIO (convenience constructor)
    pub async fn minio(endpoint: &str) -> Self {
        Self::with_options(S3Options {
            endpoint_url: Some(endpoint.to_string()),
            force_path_style: true,
            ..Default::default()
        })
        .await
    }
}

/// Classify an SDK error into the core taxonomy
///
/// S3 reports absent objects in several shapes (NoSuchKey, NoSuchBucket,
/// bare 404s); all of them become `NotFound`.
fn classify<E>(what: &str, err: E) -> Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    let message = format!("{}", DisplayErrorContext(&err));
    if message.contains("NoSuchKey")
        || message.contains("NoSuchBucket")
        || message.contains("NotFound")
        || message.contains("404")
    {
        Error::not_found(format!("{}: {}", what, message))
    } else {
        Error::io(format!("{}: {}", what, message))
    }
}

#[async_trait]
impl ObjectStoreBackend for S3Store {
    fn kind(&self) -> &'static str {
        "s3"
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn create_bucket(&self, bucket: &str, location: Option<&str>) -> Result<()> {
        let mut request = self.client.create_bucket().bucket(bucket);

        // us-east-1 is the implied default and must not be sent as a
        // location constraint
        if let Some(region) = location.filter(|r| !r.is_empty() && *r != "us-east-1") {
            let constraint = BucketLocationConstraint::from(region);
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(constraint)
                    .build(),
            );
        }

        match request.send().await {
            Ok(_) => Ok(()),
            Err(e) => {
                let message = format!("{}", DisplayErrorContext(&e));
                if message.contains("BucketAlreadyOwnedByYou")
                    || message.contains("BucketAlreadyExists")
                {
                    Ok(())
                } else {
                    Err(Error::io(format!("create bucket {}: {}", bucket, message)))
                }
            }
        }
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        match self.client.head_bucket().bucket(bucket).send().await {
            Ok(_) => Ok(true),
            Err(e) => match classify(bucket, e) {
                err if err.is_not_found() => Ok(false),
                err => Err(err),
            },
        }
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        marker: Option<&str>,
        max_keys: usize,
    ) -> Result<ListPage> {
        let response = self
            .client
            .list_objects()
            .bucket(bucket)
            .prefix(prefix)
            .max_keys(max_keys as i32)
            .set_marker(marker.map(String::from))
            .send()
            .await
            .map_err(|e| classify(&format!("{}/{}", bucket, prefix), e))?;

        let keys: Vec<String> = response
            .contents()
            .iter()
            .filter_map(|o| o.key().map(String::from))
            .collect();

        debug!(bucket, prefix, count = keys.len(), "Listed page");
        Ok(ListPage {
            keys,
            is_truncated: response.is_truncated().unwrap_or(false),
            next_marker: response.next_marker().map(String::from),
        })
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn head_object(&self, bucket: &str, key: &str) -> Result<ObjectInfo> {
        let response = self
            .client
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| classify(&format!("{}/{}", bucket, key), e))?;

        Ok(ObjectInfo {
            size: response.content_length().unwrap_or(0) as u64,
            last_modified_ms: response
                .last_modified()
                .map(|t| t.to_millis().unwrap_or(0) as u64)
                .unwrap_or(0),
            metadata: response.metadata().cloned().unwrap_or_default(),
        })
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn get_object_range(
        &self,
        bucket: &str,
        key: &str,
        start: u64,
        end: u64,
    ) -> Result<Bytes> {
        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .range(format!("bytes={}-{}", start, end))
            .send()
            .await
            .map_err(|e| classify(&format!("{}/{}", bucket, key), e))?;

        let body = response
            .body
            .collect()
            .await
            .map_err(|e| Error::io(format!("reading response body for {}: {}", key, e)))?;

        Ok(body.into_bytes())
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn download_object(&self, bucket: &str, key: &str, destination: &Path) -> Result<u64> {
        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| classify(&format!("{}/{}", bucket, key), e))?;

        let reported = response.content_length();
        let mut body = response.body.into_async_read();
        let mut file = File::create(destination).await?;
        let copied = tokio::io::copy(&mut body, &mut file).await?;
        file.sync_all().await?;

        Ok(reported.map(|s| s as u64).unwrap_or(copied))
    }

    #[instrument(skip(self), fields(backend = "s3", size_hint))]
    async fn put_object(
        &self,
        local_path: &Path,
        bucket: &str,
        key: &str,
        _size_hint: u64,
    ) -> Result<()> {
        let body = ByteStream::from_path(local_path)
            .await
            .map_err(|e| Error::io(format!("opening {}: {}", local_path.display(), e)))?;

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body)
            .send()
            .await
            .map_err(|e| classify(&format!("{}/{}", bucket, key), e))?;
        Ok(())
    }

    /// S3 has no metadata-only update; this writes a zero-length object
    /// carrying the metadata, matching the directory-marker convention.
    #[instrument(skip(self, metadata), fields(backend = "s3"))]
    async fn put_object_metadata(
        &self,
        bucket: &str,
        key: &str,
        metadata: &HashMap<String, String>,
    ) -> Result<()> {
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .set_metadata(Some(metadata.clone()))
            .send()
            .await
            .map_err(|e| classify(&format!("{}/{}", bucket, key), e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| classify(&format!("{}/{}", bucket, key), e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn copy_object(
        &self,
        src_bucket: &str,
        src_key: &str,
        dst_bucket: &str,
        dst_key: &str,
    ) -> Result<()> {
        self.client
            .copy_object()
            .copy_source(format!("{}/{}", src_bucket, src_key))
            .bucket(dst_bucket)
            .key(dst_key)
            .send()
            .await
            .map_err(|e| classify(&format!("{}/{}", dst_bucket, dst_key), e))?;
        Ok(())
    }
}
