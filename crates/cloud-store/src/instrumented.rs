//! Instrumented backend wrapper
//!
//! Wraps any backend so that every call reports
//! `(op, byte_size, elapsed_micros, success)` to the configured hook
//! exactly once, on success and on failure alike.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use cloud_core::{OpGuard, OpKind, RequestHook, Result};

use crate::backend::{ListPage, ObjectInfo, ObjectStoreBackend};

/// Backend decorator that times and reports every call
pub struct InstrumentedStore<B> {
    inner: B,
    hook: Arc<RequestHook>,
}

impl<B: ObjectStoreBackend> InstrumentedStore<B> {
    pub fn new(inner: B, hook: Arc<RequestHook>) -> Self {
        Self { inner, hook }
    }

    /// The wrapped backend
    pub fn inner(&self) -> &B {
        &self.inner
    }

    fn hook(&self) -> Option<&RequestHook> {
        Some(self.hook.as_ref())
    }
}

#[async_trait]
impl<B: ObjectStoreBackend> ObjectStoreBackend for InstrumentedStore<B> {
    fn kind(&self) -> &'static str {
        self.inner.kind()
    }

    async fn create_bucket(&self, bucket: &str, location: Option<&str>) -> Result<()> {
        let mut guard = OpGuard::new(self.hook(), OpKind::Create);
        let res = self.inner.create_bucket(bucket, location).await;
        guard.set_success(res.is_ok());
        res
    }

    async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        let mut guard = OpGuard::new(self.hook(), OpKind::Info);
        let res = self.inner.bucket_exists(bucket).await;
        guard.set_success(res.is_ok());
        res
    }

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        marker: Option<&str>,
        max_keys: usize,
    ) -> Result<ListPage> {
        let mut guard = OpGuard::new(self.hook(), OpKind::List);
        let res = self.inner.list_objects(bucket, prefix, marker, max_keys).await;
        guard.set_success(res.is_ok());
        res
    }

    async fn head_object(&self, bucket: &str, key: &str) -> Result<ObjectInfo> {
        let mut guard = OpGuard::new(self.hook(), OpKind::Info);
        let res = self.inner.head_object(bucket, key).await;
        guard.set_success(res.is_ok());
        res
    }

    async fn get_object_range(
        &self,
        bucket: &str,
        key: &str,
        start: u64,
        end: u64,
    ) -> Result<Bytes> {
        let mut guard = OpGuard::new(self.hook(), OpKind::Read);
        let res = self.inner.get_object_range(bucket, key, start, end).await;
        if let Ok(bytes) = &res {
            guard.set_size(bytes.len() as u64);
            guard.set_success(true);
        }
        res
    }

    async fn download_object(&self, bucket: &str, key: &str, destination: &Path) -> Result<u64> {
        let mut guard = OpGuard::new(self.hook(), OpKind::Read);
        let res = self.inner.download_object(bucket, key, destination).await;
        if let Ok(size) = &res {
            guard.set_size(*size);
            guard.set_success(true);
        }
        res
    }

    async fn put_object(
        &self,
        local_path: &Path,
        bucket: &str,
        key: &str,
        size_hint: u64,
    ) -> Result<()> {
        let mut guard = OpGuard::with_size(self.hook(), OpKind::Write, size_hint);
        let res = self.inner.put_object(local_path, bucket, key, size_hint).await;
        guard.set_success(res.is_ok());
        res
    }

    async fn put_object_metadata(
        &self,
        bucket: &str,
        key: &str,
        metadata: &HashMap<String, String>,
    ) -> Result<()> {
        let mut guard = OpGuard::new(self.hook(), OpKind::Write);
        let res = self.inner.put_object_metadata(bucket, key, metadata).await;
        guard.set_success(res.is_ok());
        res
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
        let mut guard = OpGuard::new(self.hook(), OpKind::Delete);
        let res = self.inner.delete_object(bucket, key).await;
        guard.set_success(res.is_ok());
        res
    }

    async fn copy_object(
        &self,
        src_bucket: &str,
        src_key: &str,
        dst_bucket: &str,
        dst_key: &str,
    ) -> Result<()> {
        let mut guard = OpGuard::new(self.hook(), OpKind::Copy);
        let res = self
            .inner
            .copy_object(src_bucket, src_key, dst_bucket, dst_key)
            .await;
        guard.set_success(res.is_ok());
        res
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryStore;
    use parking_lot::Mutex;

    fn recording_store() -> (
        InstrumentedStore<InMemoryStore>,
        Arc<Mutex<Vec<(OpKind, u64, bool)>>>,
    ) {
        let calls: Arc<Mutex<Vec<(OpKind, u64, bool)>>> = Arc::new(Mutex::new(Vec::new()));
        let calls_clone = calls.clone();
        let hook: Arc<RequestHook> =
            Arc::new(move |op: OpKind, size: u64, _micros: u64, success: bool| {
                calls_clone.lock().push((op, size, success));
            });
        (InstrumentedStore::new(InMemoryStore::new(), hook), calls)
    }

    #[tokio::test]
    async fn test_hook_fires_once_per_call() {
        let (store, calls) = recording_store();

        store.create_bucket("b", None).await.unwrap();
        store.inner().insert_object("b", "k", b"hello".to_vec());
        store.get_object_range("b", "k", 0, 4).await.unwrap();
        store.delete_object("b", "k").await.unwrap();

        let calls = calls.lock();
        assert_eq!(
            calls.as_slice(),
            &[
                (OpKind::Create, 0, true),
                (OpKind::Read, 5, true),
                (OpKind::Delete, 0, true),
            ]
        );
    }

    #[tokio::test]
    async fn test_hook_fires_on_failure() {
        let (store, calls) = recording_store();

        // head of a missing bucket fails, but still reports
        let err = store.head_object("missing", "k").await.unwrap_err();
        assert!(err.is_not_found());

        let calls = calls.lock();
        assert_eq!(calls.as_slice(), &[(OpKind::Info, 0, false)]);
    }
}
