//! Sequential and positional reads over a cloud object

use std::sync::Arc;

use bytes::Bytes;
use cloud_core::Result;
use cloud_store::ObjectProvider;
use tracing::debug;

/// Read-only view of one cloud object
///
/// The object's size is fetched once when the file is opened and every
/// read is clamped against it, so a read can never run past the end of
/// the object. Sequential reads share a cursor; positional reads leave
/// it untouched.
pub struct CloudReadableFile {
    provider: Arc<ObjectProvider>,
    bucket: String,
    path: String,
    file_size: u64,
    offset: u64,
}

impl CloudReadableFile {
    /// Open a cloud object for reading
    ///
    /// Issues a head request up front; a missing object fails here, not
    /// on the first read.
    pub async fn open(
        provider: Arc<ObjectProvider>,
        bucket: impl Into<String>,
        path: impl Into<String>,
    ) -> Result<Self> {
        let bucket = bucket.into();
        let path = path.into();
        let file_size = provider.get_object_size(&bucket, &path).await?;
        debug!(bucket = %bucket, path = %path, file_size, "Opened cloud file");
        Ok(Self {
            provider,
            bucket,
            path,
            file_size,
            offset: 0,
        })
    }

    /// Size of the object at open time
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Current sequential read position
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Read up to `n` bytes at the cursor and advance it
    pub async fn read(&mut self, n: u64) -> Result<Bytes> {
        let bytes = self.read_at(self.offset, n).await?;
        self.offset = self.offset.saturating_add(bytes.len() as u64);
        Ok(bytes)
    }

    /// Read up to `n` bytes at an absolute offset
    ///
    /// A read starting at or past the end of the object returns no bytes
    /// without touching the backend. A zero-length read at a valid
    /// offset still issues a single-byte request, because backends
    /// cannot express an empty range; the byte is discarded.
    pub async fn read_at(&self, offset: u64, n: u64) -> Result<Bytes> {
        if offset >= self.file_size {
            return Ok(Bytes::new());
        }

        if n == 0 {
            self.provider
                .get_object_range(&self.bucket, &self.path, offset, offset)
                .await?;
            return Ok(Bytes::new());
        }

        // inclusive range, clamped to the last byte of the object
        let end = offset.saturating_add(n).min(self.file_size) - 1;
        self.provider
            .get_object_range(&self.bucket, &self.path, offset, end)
            .await
    }

    /// Advance the cursor by `n` bytes, clamped to the end of the object
    pub fn skip(&mut self, n: u64) {
        self.offset = self.offset.saturating_add(n).min(self.file_size);
    }
}
