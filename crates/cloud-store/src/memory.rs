//! In-memory object-store backend for tests
//!
//! Deterministic `BTreeMap`-backed store that mimics the listing and
//! error classification of a real object store, plus fault injection for
//! the failure paths the provider must defend against: truncated pages
//! without a next marker, keys outside the requested prefix, misreported
//! download sizes, downloads that vanish before verification, and
//! failing deletes.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use bytes::Bytes;
use cloud_core::{Error, Result};
use parking_lot::{Mutex, RwLock};
use tokio::fs;

use crate::backend::{ListPage, ObjectInfo, ObjectStoreBackend};

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    metadata: HashMap<String, String>,
    modified_ms: u64,
}

#[derive(Debug, Default)]
struct Faults {
    suppress_next_marker: bool,
    rogue_list_key: Option<String>,
    misreport_download_size: Option<u64>,
    discard_downloaded_file: bool,
    fail_delete_keys: HashSet<String>,
}

/// In-memory object-store backend
#[derive(Default)]
pub struct InMemoryStore {
    buckets: RwLock<HashMap<String, BTreeMap<String, StoredObject>>>,
    faults: RwLock<Faults>,
    last_range: Mutex<Option<(u64, u64)>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an object directly, bypassing the upload path
    pub fn insert_object(&self, bucket: &str, key: &str, data: impl Into<Bytes>) {
        let mut buckets = self.buckets.write();
        buckets.entry(bucket.to_string()).or_default().insert(
            key.to_string(),
            StoredObject {
                data: data.into(),
                metadata: HashMap::new(),
                modified_ms: now_ms(),
            },
        );
    }

    /// Raw object contents, if present
    pub fn object(&self, bucket: &str, key: &str) -> Option<Bytes> {
        self.buckets
            .read()
            .get(bucket)
            .and_then(|b| b.get(key))
            .map(|o| o.data.clone())
    }

    /// Truncated list pages will omit `next_marker`
    pub fn suppress_next_marker(&self, on: bool) {
        self.faults.write().suppress_next_marker = on;
    }

    /// Prepend a key to the next list page regardless of its prefix
    pub fn inject_list_key(&self, key: impl Into<String>) {
        self.faults.write().rogue_list_key = Some(key.into());
    }

    /// Report this size from `download_object` instead of the real one
    pub fn misreport_download_size(&self, size: u64) {
        self.faults.write().misreport_download_size = Some(size);
    }

    /// Remove the downloaded file again before `download_object` returns
    pub fn discard_downloaded_file(&self, on: bool) {
        self.faults.write().discard_downloaded_file = on;
    }

    /// Fail deletes of this key with an I/O error
    pub fn fail_delete(&self, key: impl Into<String>) {
        self.faults.write().fail_delete_keys.insert(key.into());
    }

    /// Range of the most recent `get_object_range` call
    pub fn last_range(&self) -> Option<(u64, u64)> {
        *self.last_range.lock()
    }

    fn with_object<T>(
        &self,
        bucket: &str,
        key: &str,
        f: impl FnOnce(&StoredObject) -> T,
    ) -> Result<T> {
        let buckets = self.buckets.read();
        let objects = buckets
            .get(bucket)
            .ok_or_else(|| Error::not_found(bucket))?;
        let object = objects
            .get(key)
            .ok_or_else(|| Error::not_found(format!("{}/{}", bucket, key)))?;
        Ok(f(object))
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[async_trait]
impl ObjectStoreBackend for InMemoryStore {
    fn kind(&self) -> &'static str {
        "memory"
    }

    async fn create_bucket(&self, bucket: &str, _location: Option<&str>) -> Result<()> {
        self.buckets.write().entry(bucket.to_string()).or_default();
        Ok(())
    }

    async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        Ok(self.buckets.read().contains_key(bucket))
    }

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        marker: Option<&str>,
        max_keys: usize,
    ) -> Result<ListPage> {
        let buckets = self.buckets.read();
        let objects = buckets
            .get(bucket)
            .ok_or_else(|| Error::not_found(bucket))?;

        let mut matching: Vec<String> = objects
            .keys()
            .filter(|k| k.starts_with(prefix))
            .filter(|k| marker.map_or(true, |m| k.as_str() > m))
            .cloned()
            .collect();

        if let Some(rogue) = self.faults.write().rogue_list_key.take() {
            matching.insert(0, rogue);
        }

        let keys: Vec<String> = matching.iter().take(max_keys).cloned().collect();
        let is_truncated = matching.len() > keys.len();
        let next_marker = if is_truncated && !self.faults.read().suppress_next_marker {
            keys.last().cloned()
        } else {
            None
        };

        Ok(ListPage {
            keys,
            is_truncated,
            next_marker,
        })
    }

    async fn head_object(&self, bucket: &str, key: &str) -> Result<ObjectInfo> {
        self.with_object(bucket, key, |o| ObjectInfo {
            size: o.data.len() as u64,
            last_modified_ms: o.modified_ms,
            metadata: o.metadata.clone(),
        })
    }

    async fn get_object_range(
        &self,
        bucket: &str,
        key: &str,
        start: u64,
        end: u64,
    ) -> Result<Bytes> {
        if end < start {
            return Err(Error::io(format!(
                "invalid byte range {}-{} for {}/{}",
                start, end, bucket, key
            )));
        }
        *self.last_range.lock() = Some((start, end));

        self.with_object(bucket, key, |o| {
            let len = o.data.len() as u64;
            if start >= len {
                return Bytes::new();
            }
            let stop = (end + 1).min(len);
            o.data.slice(start as usize..stop as usize)
        })
    }

    async fn download_object(&self, bucket: &str, key: &str, destination: &Path) -> Result<u64> {
        let data = self.with_object(bucket, key, |o| o.data.clone())?;
        fs::write(destination, &data).await?;
        if self.faults.read().discard_downloaded_file {
            fs::remove_file(destination).await?;
        }
        let reported = self.faults.read().misreport_download_size;
        Ok(reported.unwrap_or(data.len() as u64))
    }

    async fn put_object(
        &self,
        local_path: &Path,
        bucket: &str,
        key: &str,
        _size_hint: u64,
    ) -> Result<()> {
        let data = fs::read(local_path).await?;
        let mut buckets = self.buckets.write();
        let objects = buckets
            .get_mut(bucket)
            .ok_or_else(|| Error::not_found(bucket))?;
        objects.insert(
            key.to_string(),
            StoredObject {
                data: Bytes::from(data),
                metadata: HashMap::new(),
                modified_ms: now_ms(),
            },
        );
        Ok(())
    }

    async fn put_object_metadata(
        &self,
        bucket: &str,
        key: &str,
        metadata: &HashMap<String, String>,
    ) -> Result<()> {
        let mut buckets = self.buckets.write();
        let objects = buckets
            .get_mut(bucket)
            .ok_or_else(|| Error::not_found(bucket))?;
        let object = objects.entry(key.to_string()).or_insert_with(|| StoredObject {
            data: Bytes::new(),
            metadata: HashMap::new(),
            modified_ms: 0,
        });
        object.metadata = metadata.clone();
        object.modified_ms = now_ms();
        Ok(())
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
        if self.faults.read().fail_delete_keys.contains(key) {
            return Err(Error::io(format!("simulated delete failure for {}", key)));
        }
        let mut buckets = self.buckets.write();
        let objects = buckets
            .get_mut(bucket)
            .ok_or_else(|| Error::not_found(bucket))?;
        objects
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| Error::not_found(format!("{}/{}", bucket, key)))
    }

    async fn copy_object(
        &self,
        src_bucket: &str,
        src_key: &str,
        dst_bucket: &str,
        dst_key: &str,
    ) -> Result<()> {
        let object = self.with_object(src_bucket, src_key, |o| o.clone())?;
        let mut buckets = self.buckets.write();
        let objects = buckets
            .get_mut(dst_bucket)
            .ok_or_else(|| Error::not_found(dst_bucket))?;
        objects.insert(dst_key.to_string(), object);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(bucket: &str, keys: &[(&str, &[u8])]) -> InMemoryStore {
        let store = InMemoryStore::new();
        {
            store.buckets.write().entry(bucket.to_string()).or_default();
        }
        for (key, data) in keys {
            store.insert_object(bucket, key, data.to_vec());
        }
        store
    }

    #[tokio::test]
    async fn test_head_and_not_found() {
        let store = store_with("b", &[("data/a.sst", b"0123456789")]);

        let info = store.head_object("b", "data/a.sst").await.unwrap();
        assert_eq!(info.size, 10);

        let err = store.head_object("b", "data/missing").await.unwrap_err();
        assert!(err.is_not_found());

        let err = store.head_object("nope", "data/a.sst").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_list_pagination_markers() {
        let store = store_with("b", &[]);
        for i in 0..7 {
            store.insert_object("b", &format!("data/{:02}.sst", i), vec![1u8]);
        }

        let page = store.list_objects("b", "data/", None, 3).await.unwrap();
        assert_eq!(page.keys.len(), 3);
        assert!(page.is_truncated);
        assert_eq!(page.next_marker.as_deref(), Some("data/02.sst"));

        let page = store
            .list_objects("b", "data/", Some("data/02.sst"), 10)
            .await
            .unwrap();
        assert_eq!(page.keys.len(), 4);
        assert!(!page.is_truncated);
        assert!(page.next_marker.is_none());
    }

    #[tokio::test]
    async fn test_range_read_inclusive() {
        let store = store_with("b", &[("k", b"abcdefgh")]);

        let bytes = store.get_object_range("b", "k", 2, 4).await.unwrap();
        assert_eq!(&bytes[..], b"cde");
        assert_eq!(store.last_range(), Some((2, 4)));

        // past the end of the object
        let bytes = store.get_object_range("b", "k", 100, 100).await.unwrap();
        assert!(bytes.is_empty());
    }

    #[tokio::test]
    async fn test_delete_fault_injection() {
        let store = store_with("b", &[("k1", b"x"), ("k2", b"y")]);
        store.fail_delete("k1");

        assert!(store.delete_object("b", "k1").await.is_err());
        store.delete_object("b", "k2").await.unwrap();
        assert!(store
            .delete_object("b", "k2")
            .await
            .unwrap_err()
            .is_not_found());
    }
}
