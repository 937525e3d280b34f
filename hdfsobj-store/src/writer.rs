//! Atomic object creation.
//!
//! Data is streamed into a randomly named sibling of the target, closed,
//! then renamed over the target. Readers see either the previous object or
//! the new one, never a partial write, and concurrent writers to the same
//! key never share a temp file.

use hdfsobj_common::{FsError, ObjectError, RemoteFs, RemoteWriter};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, warn};

use crate::buffer::BufferPool;
use crate::path::{base_name, parent_of};

/// Block size hint passed to the namenode on create.
pub const BLOCK_SIZE: u64 = 128 << 20;
const FILE_MODE: u32 = 0o755;
const DIR_MODE: u32 = 0o755;

pub struct AtomicWriter<'a> {
    fs: &'a dyn RemoteFs,
    replication: u16,
    pool: &'a BufferPool,
}

impl<'a> AtomicWriter<'a> {
    pub fn new(fs: &'a dyn RemoteFs, replication: u16, pool: &'a BufferPool) -> Self {
        Self {
            fs,
            replication,
            pool,
        }
    }

    /// Replace the file at `path` with the contents of `reader`, or create
    /// the directory when `path` ends with `/`.
    pub async fn put(
        &self,
        path: &str,
        reader: &mut (dyn AsyncRead + Send + Unpin),
    ) -> Result<(), ObjectError> {
        if path.ends_with('/') {
            self.fs.mkdir_all(path, DIR_MODE).await?;
            return Ok(());
        }

        let tmp = temp_path(path);
        let result = match self.write_temp(&tmp, reader).await {
            Ok(()) => self.fs.rename(&tmp, path).await.map_err(ObjectError::from),
            Err(e) => Err(e),
        };

        if let Err(ref e) = result {
            debug!(path = %path, tmp = %tmp, error = %e, "Upload failed, removing temp file");
            if let Err(remove_err) = self.fs.remove(&tmp).await {
                if !remove_err.is_not_found() {
                    warn!(tmp = %tmp, error = %remove_err, "Failed to remove temp file");
                }
            }
        } else {
            debug!(path = %path, "Upload complete");
        }
        result
    }

    async fn write_temp(
        &self,
        tmp: &str,
        reader: &mut (dyn AsyncRead + Send + Unpin),
    ) -> Result<(), ObjectError> {
        let mut file = self.create_with_retry(tmp).await?;

        if let Err(e) = self.copy(reader, file.as_mut()).await {
            let _ = file.close().await;
            return Err(e);
        }

        match file.close().await {
            Ok(()) => Ok(()),
            Err(e) if e.is_replicating() => {
                debug!(tmp = %tmp, "Close returned while replication is in progress");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Create `tmp`, recovering once from a missing parent and once from a
    /// stale or contended temp file.
    async fn create_with_retry(&self, tmp: &str) -> Result<Box<dyn RemoteWriter>, FsError> {
        let mut result = self.create(tmp).await;

        if matches!(result, Err(ref e) if e.is_not_found()) {
            let parent = parent_of(tmp);
            if let Err(e) = self.fs.mkdir_all(parent, DIR_MODE).await {
                debug!(dir = %parent, error = %e, "mkdir_all failed");
            }
            result = self.create(tmp).await;
        }

        if matches!(result, Err(ref e) if e.is_concurrent_create()) {
            let _ = self.fs.remove(tmp).await;
            result = self.create(tmp).await;
        }

        result
    }

    async fn create(&self, tmp: &str) -> Result<Box<dyn RemoteWriter>, FsError> {
        self.fs
            .create(tmp, self.replication, BLOCK_SIZE, FILE_MODE)
            .await
    }

    async fn copy(
        &self,
        reader: &mut (dyn AsyncRead + Send + Unpin),
        file: &mut dyn RemoteWriter,
    ) -> Result<u64, ObjectError> {
        let mut buf = self.pool.get();
        let mut total = 0u64;
        loop {
            let n = reader.read(&mut buf[..]).await?;
            if n == 0 {
                return Ok(total);
            }
            file.write(&buf[..n]).await?;
            total += n as u64;
        }
    }
}

/// `/dir/.name.tmp.<random>` next to `path`.
fn temp_path(path: &str) -> String {
    let parent = parent_of(path);
    let name = base_name(path);
    let suffix: u64 = rand::random();
    if parent == "/" {
        format!("/.{}.tmp.{}", name, suffix)
    } else {
        format!("{}/.{}.tmp.{}", parent, name, suffix)
    }
}
