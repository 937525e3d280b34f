//! HDFS object store adapter.
//!
//! Keys map onto paths under the configured base directory. Writes go
//! through a temp file and an atomic rename; listings are produced from
//! directory reads sorted into key order.

use std::fmt;
use std::io::SeekFrom;
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeekExt};
use tracing::{debug, info};

use hdfsobj_common::{
    Entry, FileMode, FsError, Listing, ObjectError, ObjectReader, ObjectStorage, RemoteFs,
};

use crate::buffer::BufferPool;
use crate::config::{ResolvedConfig, StoreConfig};
use crate::identity::IdentityTranslator;
use crate::list::{stat_entry, Lister};
use crate::path::PathMapper;
use crate::walk::TreeWalker;
use crate::writer::AtomicWriter;

/// What a remote client needs to connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientOptions {
    pub addresses: Vec<String>,
    pub user: String,
}

pub struct HdfsStore {
    fs: Arc<dyn RemoteFs>,
    addresses: Vec<String>,
    mapper: PathMapper,
    identity: IdentityTranslator,
    replication: u16,
    principal: String,
    pool: BufferPool,
}

impl HdfsStore {
    pub fn new(fs: Arc<dyn RemoteFs>, config: ResolvedConfig) -> Self {
        Self {
            fs,
            addresses: config.address.addresses,
            mapper: PathMapper::new(config.address.base_path),
            identity: config.identity,
            replication: config.replication,
            principal: config.principal,
            pool: BufferPool::default(),
        }
    }

    /// Resolve `config` and build the store on a client produced by
    /// `connect`.
    pub fn connect<F>(config: &StoreConfig, connect: F) -> anyhow::Result<Self>
    where
        F: FnOnce(&ClientOptions) -> anyhow::Result<Arc<dyn RemoteFs>>,
    {
        let resolved = config.resolve()?;
        Self::connect_resolved(resolved, connect)
    }

    pub fn connect_resolved<F>(resolved: ResolvedConfig, connect: F) -> anyhow::Result<Self>
    where
        F: FnOnce(&ClientOptions) -> anyhow::Result<Arc<dyn RemoteFs>>,
    {
        let options = ClientOptions {
            addresses: resolved.address.addresses.clone(),
            user: resolved.principal.clone(),
        };
        let fs = connect(&options)
            .with_context(|| format!("new HDFS client {}", options.addresses.join(",")))?;
        info!(
            addresses = %options.addresses.join(","),
            base_path = %resolved.address.base_path,
            user = %options.user,
            replication = resolved.replication,
            "HDFS store ready"
        );
        Ok(Self::new(fs, resolved))
    }

    pub fn base_path(&self) -> &str {
        self.mapper.base_path()
    }

    pub fn principal(&self) -> &str {
        &self.principal
    }

    pub fn replication(&self) -> u16 {
        self.replication
    }

    fn walker(&self) -> TreeWalker {
        TreeWalker::new(self.fs.clone(), self.mapper.clone(), self.identity.clone())
    }

    fn not_found_ok(key: &str, result: Result<(), FsError>) -> Result<(), ObjectError> {
        match result {
            Err(e) if e.is_not_found() => {
                debug!(key = %key, "Already absent");
                Ok(())
            }
            other => other.map_err(ObjectError::from),
        }
    }
}

impl fmt::Display for HdfsStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "hdfs://{}{}", self.addresses.join(","), self.mapper.base_path())
    }
}

#[async_trait]
impl ObjectStorage for HdfsStore {
    async fn head(&self, key: &str) -> Result<Entry, ObjectError> {
        stat_entry(self.fs.as_ref(), &self.mapper, &self.identity, key).await
    }

    async fn get(&self, key: &str, offset: u64, limit: i64) -> Result<ObjectReader, ObjectError> {
        let path = self.mapper.to_remote(key);
        let mut file = self
            .fs
            .open(&path)
            .await
            .map_err(|e| ObjectError::from_fs(key, e))?;
        if file.info.is_dir {
            return Ok(Box::new(tokio::io::empty()));
        }
        if offset > 0 {
            file.reader.seek(SeekFrom::Start(offset)).await?;
        }
        if limit > 0 {
            Ok(Box::new(file.reader.take(limit as u64)))
        } else {
            Ok(Box::new(file.reader))
        }
    }

    async fn put(
        &self,
        key: &str,
        reader: &mut (dyn AsyncRead + Send + Unpin),
    ) -> Result<(), ObjectError> {
        let path = self.mapper.to_remote(key);
        AtomicWriter::new(self.fs.as_ref(), self.replication, &self.pool)
            .put(&path, reader)
            .await
    }

    async fn delete(&self, key: &str) -> Result<(), ObjectError> {
        let result = self.fs.remove(&self.mapper.to_remote(key)).await;
        Self::not_found_ok(key, result)
    }

    async fn list(
        &self,
        prefix: &str,
        marker: &str,
        delimiter: &str,
        limit: usize,
    ) -> Result<Vec<Entry>, ObjectError> {
        Lister::new(self.fs.as_ref(), &self.mapper, &self.identity)
            .list(prefix, marker, delimiter, limit)
            .await
    }

    async fn list_all(&self, prefix: &str, marker: &str) -> Result<Listing, ObjectError> {
        self.walker().list_all(prefix, marker).await
    }

    async fn chtimes(&self, key: &str, mtime: DateTime<Utc>) -> Result<(), ObjectError> {
        self.fs
            .chtimes(&self.mapper.to_remote(key), mtime, mtime)
            .await
            .map_err(|e| ObjectError::from_fs(key, e))
    }

    async fn chmod(&self, key: &str, mode: FileMode) -> Result<(), ObjectError> {
        self.fs
            .chmod(&self.mapper.to_remote(key), self.identity.mode_to_remote(mode))
            .await
            .map_err(|e| ObjectError::from_fs(key, e))
    }

    async fn chown(&self, key: &str, owner: &str, group: &str) -> Result<(), ObjectError> {
        let owner = self.identity.owner_to_remote(owner);
        let group = self.identity.group_to_remote(group);
        self.fs
            .chown(&self.mapper.to_remote(key), &owner, &group)
            .await
            .map_err(|e| ObjectError::from_fs(key, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address;
    use crate::memory::MemoryFs;
    use std::collections::BTreeMap;

    fn store(fs: &MemoryFs) -> HdfsStore {
        let resolved = ResolvedConfig {
            address: address::resolve("hdfs://nn1:8020,nn2:8020/jfs", &BTreeMap::new()),
            principal: "jfs".into(),
            replication: 3,
            identity: IdentityTranslator::default(),
        };
        HdfsStore::new(Arc::new(fs.clone()), resolved)
    }

    async fn read_all(mut reader: ObjectReader) -> Vec<u8> {
        let mut out = Vec::new();
        reader.read_to_end(&mut out).await.unwrap();
        out
    }

    #[tokio::test]
    async fn test_head() {
        let fs = MemoryFs::default();
        fs.insert_file("/jfs/a/b", "12345").unwrap();
        let store = store(&fs);

        let entry = store.head("a/b").await.unwrap();
        assert_eq!(entry.key, "a/b");
        assert_eq!(entry.size, 5);
        assert!(!entry.is_dir);
        assert_eq!(entry.owner, "root");

        let dir = store.head("a").await.unwrap();
        assert_eq!(dir.key, "a/");
        assert!(dir.is_dir);
        assert_eq!(dir.size, 0);

        assert!(matches!(store.head("nope").await, Err(ObjectError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_get_ranges() {
        let fs = MemoryFs::default();
        fs.insert_file("/jfs/obj", "0123456789").unwrap();
        let store = store(&fs);

        assert_eq!(read_all(store.get("obj", 0, -1).await.unwrap()).await, b"0123456789");
        assert_eq!(read_all(store.get("obj", 2, 3).await.unwrap()).await, b"234");
        assert_eq!(read_all(store.get("obj", 7, 0).await.unwrap()).await, b"789");
        assert_eq!(read_all(store.get("obj", 8, 100).await.unwrap()).await, b"89");
        assert!(store.get("missing", 0, -1).await.err().unwrap().is_not_found());
    }

    #[tokio::test]
    async fn test_get_directory_is_empty() {
        let fs = MemoryFs::default();
        fs.insert_file("/jfs/d/x", "data").unwrap();
        let store = store(&fs);
        assert!(read_all(store.get("d/", 0, -1).await.unwrap()).await.is_empty());
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let fs = MemoryFs::default();
        let store = store(&fs);
        let mut data: &[u8] = b"payload";
        store.put("x/y/z", &mut data).await.unwrap();
        assert_eq!(read_all(store.get("x/y/z", 0, -1).await.unwrap()).await, b"payload");

        let mut empty: &[u8] = b"";
        store.put("m/", &mut empty).await.unwrap();
        assert!(store.head("m/").await.unwrap().is_dir);
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let fs = MemoryFs::default();
        fs.insert_file("/jfs/obj", "x").unwrap();
        let store = store(&fs);
        store.delete("obj").await.unwrap();
        store.delete("obj").await.unwrap();
        store.delete("never-existed").await.unwrap();
        assert!(store.head("obj").await.is_err());
    }

    #[tokio::test]
    async fn test_chown_translates_root() {
        let fs = MemoryFs::new("jfs", "users");
        fs.insert_file("/jfs/obj", "x").unwrap();
        let store = store(&fs);

        store.chown("obj", "root", "root").await.unwrap();
        let info = fs.stat("/jfs/obj").await.unwrap();
        assert_eq!(info.owner, "hdfs");
        assert_eq!(info.group, "supergroup");
        let entry = store.head("obj").await.unwrap();
        assert_eq!(entry.owner, "root");
        assert_eq!(entry.group, "root");

        store.chown("obj", "alice", "staff").await.unwrap();
        let entry = store.head("obj").await.unwrap();
        assert_eq!(entry.owner, "alice");
        assert_eq!(entry.group, "staff");
    }

    #[tokio::test]
    async fn test_chmod_round_trips_sticky() {
        let fs = MemoryFs::default();
        fs.insert_file("/jfs/d/x", "x").unwrap();
        let store = store(&fs);
        store
            .chmod("d/", FileMode::new(0o777).with_sticky(true))
            .await
            .unwrap();
        assert_eq!(fs.stat("/jfs/d").await.unwrap().mode, 0o1777);
        let entry = store.head("d/").await.unwrap();
        assert_eq!(entry.mode, FileMode::new(0o777).with_sticky(true));
    }

    #[tokio::test]
    async fn test_chtimes() {
        let fs = MemoryFs::default();
        fs.insert_file("/jfs/obj", "x").unwrap();
        let store = store(&fs);
        let mtime = DateTime::parse_from_rfc3339("2020-01-02T03:04:05Z")
            .unwrap()
            .with_timezone(&Utc);
        store.chtimes("obj", mtime).await.unwrap();
        assert_eq!(store.head("obj").await.unwrap().mtime, mtime);
        assert!(store.chtimes("missing", mtime).await.unwrap_err().is_not_found());
    }

    #[test]
    fn test_display() {
        let fs = MemoryFs::default();
        assert_eq!(store(&fs).to_string(), "hdfs://nn1:8020,nn2:8020/jfs/");
    }

    #[test]
    fn test_connect_passes_client_options() {
        let resolved = ResolvedConfig {
            address: address::resolve("hdfs://nn:8020/data", &BTreeMap::new()),
            principal: "svc".into(),
            replication: 2,
            identity: IdentityTranslator::default(),
        };
        let store = HdfsStore::connect_resolved(resolved, |options| {
            assert_eq!(options.addresses, vec!["nn:8020"]);
            assert_eq!(options.user, "svc");
            Ok(Arc::new(MemoryFs::default()) as Arc<dyn RemoteFs>)
        })
        .unwrap();
        assert_eq!(store.base_path(), "/data/");
        assert_eq!(store.replication(), 2);
        assert_eq!(store.principal(), "svc");

        let resolved = ResolvedConfig {
            address: address::resolve("nn:8020", &BTreeMap::new()),
            principal: "svc".into(),
            replication: 3,
            identity: IdentityTranslator::default(),
        };
        let err = HdfsStore::connect_resolved(resolved, |_| anyhow::bail!("connection refused"))
            .err()
            .unwrap();
        assert!(err.to_string().contains("nn:8020"));
    }
}
