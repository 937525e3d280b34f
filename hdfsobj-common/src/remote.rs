//! The remote filesystem client boundary.
//!
//! Adapters talk to HDFS only through [`RemoteFs`]; the wire protocol,
//! leases and authentication live behind it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::io::{AsyncRead, AsyncSeek};

use crate::error::FsError;

/// Stat result for a single remote path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    /// Last path component, without any trailing `/`.
    pub name: String,
    pub size: u64,
    pub mtime: DateTime<Utc>,
    pub is_dir: bool,
    pub owner: String,
    pub group: String,
    /// Mode bits as the remote encodes them (sticky at `0o1000`).
    pub mode: u32,
}

pub trait SeekRead: AsyncRead + AsyncSeek + Send + Unpin {}

impl<T> SeekRead for T where T: AsyncRead + AsyncSeek + Send + Unpin {}

/// An opened remote path.
pub struct RemoteFile {
    pub info: FileInfo,
    pub reader: Box<dyn SeekRead>,
}

/// A file being written. Data becomes durable on [`RemoteWriter::close`].
#[async_trait]
pub trait RemoteWriter: Send {
    async fn write(&mut self, buf: &[u8]) -> Result<(), FsError>;

    /// May return [`FsError::Replicating`] after the data is already durable.
    async fn close(self: Box<Self>) -> Result<(), FsError>;
}

#[async_trait]
pub trait RemoteFs: Send + Sync {
    async fn stat(&self, path: &str) -> Result<FileInfo, FsError>;

    async fn open(&self, path: &str) -> Result<RemoteFile, FsError>;

    /// Direct children of a directory, in no particular order.
    async fn read_dir(&self, path: &str) -> Result<Vec<FileInfo>, FsError>;

    /// Create a new file. Fails with `NotFound` when the parent is missing
    /// and with `AlreadyExists` / `AlreadyBeingCreated` when the path is taken.
    async fn create(
        &self,
        path: &str,
        replication: u16,
        block_size: u64,
        mode: u32,
    ) -> Result<Box<dyn RemoteWriter>, FsError>;

    async fn mkdir_all(&self, path: &str, mode: u32) -> Result<(), FsError>;

    async fn remove(&self, path: &str) -> Result<(), FsError>;

    /// Atomically move `from` onto `to`, replacing an existing file.
    async fn rename(&self, from: &str, to: &str) -> Result<(), FsError>;

    async fn chmod(&self, path: &str, mode: u32) -> Result<(), FsError>;

    async fn chown(&self, path: &str, owner: &str, group: &str) -> Result<(), FsError>;

    async fn chtimes(
        &self,
        path: &str,
        atime: DateTime<Utc>,
        mtime: DateTime<Utc>,
    ) -> Result<(), FsError>;
}
