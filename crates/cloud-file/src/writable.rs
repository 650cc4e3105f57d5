//! Locally buffered writes that reach the cloud on sync or close

use std::path::{Path, PathBuf};
use std::sync::Arc;

use cloud_core::{Error, Result};
use cloud_store::ObjectProvider;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument, warn};

/// What a writable file holds, and therefore when it must reach the cloud
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// Immutable once closed; uploaded exactly once, on close
    Data,

    /// Rewritten in place; uploaded on every sync
    Manifest,
}

/// A local file that is mirrored to a cloud object
///
/// Writes land in a local file first. Data files upload when they are
/// closed; manifest files upload on every [`sync`](Self::sync), behind a
/// temp-file/rename protocol: when the local target already holds a
/// manifest, writes go to `<path>.tmp` and the rename onto the real path
/// happens on the first sync, immediately before the upload.
/// A crash before that first sync leaves the previous local manifest in
/// place, consistent with the cloud copy.
///
/// A single writer per path is assumed; concurrent writers to the same
/// cloud path are the caller's bug.
pub struct CloudWritableFile {
    provider: Arc<ObjectProvider>,
    bucket: String,
    cloud_path: String,
    local_path: PathBuf,
    kind: FileKind,
    file: Option<File>,
    pending_rename: Option<PathBuf>,
    poisoned: Option<String>,
}

impl CloudWritableFile {
    /// Create the local file backing a new cloud object
    pub async fn create(
        provider: Arc<ObjectProvider>,
        bucket: impl Into<String>,
        cloud_path: impl Into<String>,
        local_path: impl Into<PathBuf>,
        kind: FileKind,
    ) -> Result<Self> {
        let bucket = bucket.into();
        let cloud_path = cloud_path.into();
        let local_path = local_path.into();

        // Rewriting a manifest must not clobber the existing valid copy
        // before the new one is durable; write to a temp file and rename
        // on the first sync.
        let pending_rename = if kind == FileKind::Manifest && fs::try_exists(&local_path).await? {
            Some(tmp_path(&local_path))
        } else {
            None
        };

        let write_path = pending_rename.as_deref().unwrap_or(&local_path);
        let file = File::create(write_path).await?;
        debug!(
            bucket = %bucket,
            cloud_path = %cloud_path,
            local = %write_path.display(),
            "Created writable cloud file"
        );

        Ok(Self {
            provider,
            bucket,
            cloud_path,
            local_path,
            kind,
            file: Some(file),
            pending_rename,
            poisoned: None,
        })
    }

    pub fn kind(&self) -> FileKind {
        self.kind
    }

    /// Local path of the finished file
    pub fn local_path(&self) -> &Path {
        &self.local_path
    }

    fn open_file(&mut self) -> Result<&mut File> {
        if let Some(msg) = &self.poisoned {
            return Err(Error::io(msg.clone()));
        }
        self.file
            .as_mut()
            .ok_or_else(|| Error::io(format!("{} already closed", self.local_path.display())))
    }

    /// Record a local failure; every later call fails with the same error
    fn poison<T>(&mut self, err: Error) -> Result<T> {
        self.poisoned = Some(err.to_string());
        self.file = None;
        Err(err)
    }

    /// Append bytes to the local file
    pub async fn append(&mut self, data: &[u8]) -> Result<()> {
        let file = self.open_file()?;
        match file.write_all(data).await {
            Ok(()) => Ok(()),
            Err(e) => self.poison(e.into()),
        }
    }

    /// Make the file durable
    ///
    /// Syncs the local file, completes any pending manifest rename, and
    /// for manifest files uploads the result. A failed upload fails this
    /// call but leaves the file usable; the local copy already holds the
    /// data and a later sync can upload it.
    #[instrument(skip(self), fields(cloud_path = %self.cloud_path))]
    pub async fn sync(&mut self) -> Result<()> {
        let file = self.open_file()?;
        if let Err(e) = file.sync_all().await {
            return self.poison(e.into());
        }

        if let Some(tmp) = self.pending_rename.take() {
            if let Err(e) = fs::rename(&tmp, &self.local_path).await {
                return self.poison(e.into());
            }
            debug!(local = %self.local_path.display(), "Manifest renamed into place");
        }

        if self.kind == FileKind::Manifest {
            self.provider
                .put_object(&self.local_path, &self.bucket, &self.cloud_path)
                .await?;
        }
        Ok(())
    }

    /// Finish the file
    ///
    /// Data files are synced, uploaded once, and the local copy removed
    /// unless `keep_local_files` is set. Manifest files only close the
    /// local handle; their uploads happened on sync. A failed upload
    /// leaves the local file in place.
    #[instrument(skip(self), fields(cloud_path = %self.cloud_path))]
    pub async fn close(&mut self) -> Result<()> {
        let file = self.open_file()?;
        if let Err(e) = file.sync_all().await {
            return self.poison(e.into());
        }
        self.file = None;

        if self.kind == FileKind::Manifest {
            return Ok(());
        }

        self.provider
            .put_object(&self.local_path, &self.bucket, &self.cloud_path)
            .await?;

        if !self.provider.config().keep_local_files {
            fs::remove_file(&self.local_path).await?;
            debug!(local = %self.local_path.display(), "Removed local file after upload");
        }
        info!(bucket = %self.bucket, cloud_path = %self.cloud_path, "Closed cloud file");
        Ok(())
    }
}

impl Drop for CloudWritableFile {
    fn drop(&mut self) {
        if self.file.is_some() {
            warn!(
                cloud_path = %self.cloud_path,
                "Writable cloud file dropped without close"
            );
        }
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_os_string();
    os.push(".tmp");
    PathBuf::from(os)
}
