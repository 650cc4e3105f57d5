//! Cloud configuration types

use serde::{Deserialize, Serialize};

/// A configured bucket and the region it lives in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketOptions {
    /// Bucket name, without any scheme prefix
    pub name: String,

    /// Region or location hint for the bucket
    pub region: Option<String>,
}

impl BucketOptions {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            region: None,
        }
    }

    pub fn with_region(name: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            region: Some(region.into()),
        }
    }
}

/// Configuration for the cloud file layer
///
/// Set once at startup; the provider holds no other mutable shared state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudConfig {
    /// Bucket the engine was cloned from, if any
    pub src_bucket: Option<BucketOptions>,

    /// Bucket new files are uploaded to
    pub dest_bucket: Option<BucketOptions>,

    /// Create the destination bucket at startup if it does not exist
    pub create_bucket_if_missing: bool,

    /// Retain local copies of data files after upload
    pub keep_local_files: bool,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            src_bucket: None,
            dest_bucket: None,
            create_bucket_if_missing: true,
            keep_local_files: false,
        }
    }
}

impl CloudConfig {
    /// Convenience constructor for the common single-bucket setup
    pub fn with_dest_bucket(bucket: impl Into<String>) -> Self {
        Self {
            dest_bucket: Some(BucketOptions::new(bucket)),
            ..Default::default()
        }
    }

    pub fn has_dest_bucket(&self) -> bool {
        self.dest_bucket.is_some()
    }

    /// Region hint for the destination bucket, if configured
    pub fn dest_region(&self) -> Option<&str> {
        self.dest_bucket
            .as_ref()
            .and_then(|b| b.region.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CloudConfig::default();
        assert!(config.create_bucket_if_missing);
        assert!(!config.keep_local_files);
        assert!(!config.has_dest_bucket());
    }

    #[test]
    fn test_config_serialization() {
        let config = CloudConfig {
            dest_bucket: Some(BucketOptions::with_region("engine-files", "us-west-2")),
            ..Default::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let parsed: CloudConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.dest_bucket, config.dest_bucket);
        assert_eq!(parsed.dest_region(), Some("us-west-2"));
    }
}
