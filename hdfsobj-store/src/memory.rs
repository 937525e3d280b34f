//! In-process `RemoteFs` with HDFS create/rename semantics.
//!
//! Files are invisible-until-close the same way an HDFS file under
//! construction is unusable by others: a second create on the same path
//! fails with `AlreadyBeingCreated` until the writer closes. Faults can be
//! injected to exercise the adapter's recovery paths.

use std::collections::{BTreeMap, VecDeque};
use std::io::Cursor;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};

use hdfsobj_common::{FileInfo, FsError, RemoteFile, RemoteFs, RemoteWriter};

use crate::identity::{DEFAULT_SUPERGROUP, DEFAULT_SUPERUSER};
use crate::path::{base_name, parent_of};

#[derive(Debug, Clone)]
struct Node {
    is_dir: bool,
    data: Bytes,
    /// Create lease still held by a writer.
    writing: bool,
    mtime: DateTime<Utc>,
    owner: String,
    group: String,
    mode: u32,
}

impl Node {
    fn dir(owner: &str, group: &str, mode: u32) -> Self {
        Self {
            is_dir: true,
            data: Bytes::new(),
            writing: false,
            mtime: Utc::now(),
            owner: owner.to_string(),
            group: group.to_string(),
            mode,
        }
    }

    fn info(&self, path: &str) -> FileInfo {
        FileInfo {
            name: base_name(path).to_string(),
            size: self.data.len() as u64,
            mtime: self.mtime,
            is_dir: self.is_dir,
            owner: self.owner.clone(),
            group: self.group.clone(),
            mode: self.mode,
        }
    }
}

#[derive(Default)]
struct State {
    nodes: BTreeMap<String, Node>,
    create_faults: VecDeque<FsError>,
    close_faults: VecDeque<FsError>,
    stat_faults: BTreeMap<String, String>,
    read_dir_faults: BTreeMap<String, String>,
    replicating_on_close: bool,
    read_dir_calls: usize,
}

impl State {
    fn children(&self, dir: &str) -> Vec<(String, Node)> {
        let prefix = child_prefix(dir);
        self.nodes
            .range(prefix.clone()..)
            .take_while(|(p, _)| p.starts_with(&prefix))
            .filter(|(p, _)| is_child(p, &prefix))
            .map(|(p, n)| (p.clone(), n.clone()))
            .collect()
    }

    fn has_children(&self, dir: &str) -> bool {
        let prefix = child_prefix(dir);
        self.nodes
            .range(prefix.clone()..)
            .take_while(|(p, _)| p.starts_with(&prefix))
            .any(|(p, _)| p.len() > prefix.len())
    }

    fn require_dir(&self, path: &str, missing: &str) -> Result<(), FsError> {
        match self.nodes.get(path) {
            Some(node) if node.is_dir => Ok(()),
            Some(_) => Err(not_a_directory(path)),
            None => Err(FsError::NotFound(missing.to_string())),
        }
    }
}

#[derive(Clone)]
pub struct MemoryFs {
    state: Arc<Mutex<State>>,
    user: String,
    group: String,
}

impl Default for MemoryFs {
    fn default() -> Self {
        Self::new(DEFAULT_SUPERUSER, DEFAULT_SUPERGROUP)
    }
}

impl MemoryFs {
    /// New filesystem whose files are created as `user:group`. The root
    /// directory belongs to the default HDFS superuser.
    pub fn new(user: &str, group: &str) -> Self {
        let mut state = State::default();
        state.nodes.insert(
            "/".to_string(),
            Node::dir(DEFAULT_SUPERUSER, DEFAULT_SUPERGROUP, 0o755),
        );
        Self {
            state: Arc::new(Mutex::new(state)),
            user: user.to_string(),
            group: group.to_string(),
        }
    }

    /// Fail the next `create` call with `err`.
    pub fn fail_next_create(&self, err: FsError) {
        self.state.lock().unwrap().create_faults.push_back(err);
    }

    /// Fail the next `close` with `err`. The data is discarded and the
    /// lease released, leaving an empty file behind.
    pub fn fail_next_close(&self, err: FsError) {
        self.state.lock().unwrap().close_faults.push_back(err);
    }

    /// Fail every `stat` of `path`.
    pub fn fail_stat(&self, path: &str) {
        self.state
            .lock()
            .unwrap()
            .stat_faults
            .insert(normalize(path), "Permission denied".to_string());
    }

    /// Fail every `read_dir` of `path`.
    pub fn fail_read_dir(&self, path: &str) {
        self.state
            .lock()
            .unwrap()
            .read_dir_faults
            .insert(normalize(path), "injected read_dir failure".to_string());
    }

    /// Make `close` report replication in progress after committing data.
    pub fn set_replicating_on_close(&self, replicating: bool) {
        self.state.lock().unwrap().replicating_on_close = replicating;
    }

    pub fn read_dir_calls(&self) -> usize {
        self.state.lock().unwrap().read_dir_calls
    }

    /// All paths currently present, directories included.
    pub fn paths(&self) -> Vec<String> {
        self.state.lock().unwrap().nodes.keys().cloned().collect()
    }

    /// Write a complete file, creating its parents.
    pub fn insert_file(&self, path: &str, data: impl Into<Bytes>) -> Result<(), FsError> {
        let path = normalize(path);
        let mut state = self.state.lock().unwrap();
        make_dirs(&mut state, parent_of(&path), &self.user, &self.group, 0o755)?;
        state.nodes.insert(
            path,
            Node {
                is_dir: false,
                data: data.into(),
                writing: false,
                mtime: Utc::now(),
                owner: self.user.clone(),
                group: self.group.clone(),
                mode: 0o644,
            },
        );
        Ok(())
    }
}

#[async_trait]
impl RemoteFs for MemoryFs {
    async fn stat(&self, path: &str) -> Result<FileInfo, FsError> {
        let path = normalize(path);
        let state = self.state.lock().unwrap();
        if let Some(message) = state.stat_faults.get(&path) {
            return Err(FsError::Remote {
                path: path.clone(),
                exception: "org.apache.hadoop.security.AccessControlException".to_string(),
                message: message.clone(),
            });
        }
        state
            .nodes
            .get(&path)
            .map(|node| node.info(&path))
            .ok_or(FsError::NotFound(path))
    }

    async fn open(&self, path: &str) -> Result<RemoteFile, FsError> {
        let path = normalize(path);
        let state = self.state.lock().unwrap();
        let node = state
            .nodes
            .get(&path)
            .ok_or_else(|| FsError::NotFound(path.clone()))?;
        Ok(RemoteFile {
            info: node.info(&path),
            reader: Box::new(Cursor::new(node.data.clone())),
        })
    }

    async fn read_dir(&self, path: &str) -> Result<Vec<FileInfo>, FsError> {
        let path = normalize(path);
        let mut state = self.state.lock().unwrap();
        state.read_dir_calls += 1;
        if let Some(message) = state.read_dir_faults.get(&path) {
            return Err(FsError::Remote {
                path: path.clone(),
                exception: "java.io.IOException".to_string(),
                message: message.clone(),
            });
        }
        state.require_dir(&path, &path)?;
        Ok(state
            .children(&path)
            .iter()
            .map(|(p, node)| node.info(p))
            .collect())
    }

    async fn create(
        &self,
        path: &str,
        _replication: u16,
        _block_size: u64,
        mode: u32,
    ) -> Result<Box<dyn RemoteWriter>, FsError> {
        let path = normalize(path);
        let mut state = self.state.lock().unwrap();
        if let Some(err) = state.create_faults.pop_front() {
            return Err(err);
        }
        state.require_dir(parent_of(&path), &path)?;
        match state.nodes.get(&path) {
            Some(node) if node.writing => return Err(FsError::AlreadyBeingCreated(path)),
            Some(_) => return Err(FsError::AlreadyExists(path)),
            None => {}
        }
        state.nodes.insert(
            path.clone(),
            Node {
                is_dir: false,
                data: Bytes::new(),
                writing: true,
                mtime: Utc::now(),
                owner: self.user.clone(),
                group: self.group.clone(),
                mode,
            },
        );
        Ok(Box::new(MemoryWriter {
            state: self.state.clone(),
            path,
            buf: Vec::new(),
        }))
    }

    async fn mkdir_all(&self, path: &str, mode: u32) -> Result<(), FsError> {
        let mut state = self.state.lock().unwrap();
        make_dirs(&mut state, &normalize(path), &self.user, &self.group, mode)
    }

    async fn remove(&self, path: &str) -> Result<(), FsError> {
        let path = normalize(path);
        let mut state = self.state.lock().unwrap();
        let node = state
            .nodes
            .get(&path)
            .ok_or_else(|| FsError::NotFound(path.clone()))?;
        if node.is_dir && state.has_children(&path) {
            return Err(FsError::Remote {
                path,
                exception: "org.apache.hadoop.fs.PathIsNotEmptyDirectoryException".to_string(),
                message: "directory is not empty".to_string(),
            });
        }
        state.nodes.remove(&path);
        Ok(())
    }

    async fn rename(&self, from: &str, to: &str) -> Result<(), FsError> {
        let from = normalize(from);
        let to = normalize(to);
        let mut state = self.state.lock().unwrap();
        let node = state
            .nodes
            .get(&from)
            .cloned()
            .ok_or_else(|| FsError::NotFound(from.clone()))?;
        state.require_dir(parent_of(&to), &to)?;
        if state.nodes.get(&to).is_some_and(|n| n.is_dir) {
            return Err(FsError::AlreadyExists(to));
        }

        if node.is_dir {
            let old_prefix = child_prefix(&from);
            let moved: Vec<String> = state
                .nodes
                .range(old_prefix.clone()..)
                .take_while(|(p, _)| p.starts_with(&old_prefix))
                .map(|(p, _)| p.clone())
                .collect();
            let new_prefix = child_prefix(&to);
            for old in moved {
                if let Some(child) = state.nodes.remove(&old) {
                    let new = format!("{}{}", new_prefix, &old[old_prefix.len()..]);
                    state.nodes.insert(new, child);
                }
            }
        }
        state.nodes.remove(&from);
        state.nodes.insert(to, node);
        Ok(())
    }

    async fn chmod(&self, path: &str, mode: u32) -> Result<(), FsError> {
        self.update(path, |node| node.mode = mode)
    }

    async fn chown(&self, path: &str, owner: &str, group: &str) -> Result<(), FsError> {
        self.update(path, |node| {
            if !owner.is_empty() {
                node.owner = owner.to_string();
            }
            if !group.is_empty() {
                node.group = group.to_string();
            }
        })
    }

    async fn chtimes(
        &self,
        path: &str,
        _atime: DateTime<Utc>,
        mtime: DateTime<Utc>,
    ) -> Result<(), FsError> {
        self.update(path, |node| node.mtime = mtime)
    }
}

impl MemoryFs {
    fn update(&self, path: &str, f: impl FnOnce(&mut Node)) -> Result<(), FsError> {
        let path = normalize(path);
        let mut state = self.state.lock().unwrap();
        match state.nodes.get_mut(&path) {
            Some(node) => {
                f(node);
                Ok(())
            }
            None => Err(FsError::NotFound(path)),
        }
    }
}

struct MemoryWriter {
    state: Arc<Mutex<State>>,
    path: String,
    buf: Vec<u8>,
}

#[async_trait]
impl RemoteWriter for MemoryWriter {
    async fn write(&mut self, buf: &[u8]) -> Result<(), FsError> {
        self.buf.extend_from_slice(buf);
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<(), FsError> {
        let MemoryWriter { state, path, buf } = *self;
        let mut state = state.lock().unwrap();
        let replicating = state.replicating_on_close;
        if let Some(err) = state.close_faults.pop_front() {
            if let Some(node) = state.nodes.get_mut(&path) {
                node.writing = false;
            }
            return Err(err);
        }
        match state.nodes.get_mut(&path) {
            Some(node) if node.writing => {
                node.data = Bytes::from(buf);
                node.writing = false;
                node.mtime = Utc::now();
            }
            // The lease was lost: the file was removed or replaced under us.
            _ => return Err(FsError::NotFound(path)),
        }
        if replicating {
            return Err(FsError::Replicating(path));
        }
        Ok(())
    }
}

fn make_dirs(
    state: &mut State,
    path: &str,
    owner: &str,
    group: &str,
    mode: u32,
) -> Result<(), FsError> {
    let mut current = String::new();
    for component in path.split('/').filter(|c| !c.is_empty()) {
        current.push('/');
        current.push_str(component);
        match state.nodes.get(&current) {
            Some(node) if node.is_dir => {}
            Some(_) => return Err(not_a_directory(&current)),
            None => {
                state
                    .nodes
                    .insert(current.clone(), Node::dir(owner, group, mode));
            }
        }
    }
    Ok(())
}

fn not_a_directory(path: &str) -> FsError {
    FsError::Remote {
        path: path.to_string(),
        exception: "org.apache.hadoop.fs.ParentNotDirectoryException".to_string(),
        message: "not a directory".to_string(),
    }
}

/// Strip trailing slashes; the root stays `/`.
fn normalize(path: &str) -> String {
    match path.trim_end_matches('/') {
        "" => "/".to_string(),
        trimmed => trimmed.to_string(),
    }
}

/// A direct child of the directory whose child prefix is `prefix`. The
/// root's own key also starts with `/` and is excluded.
fn is_child(path: &str, prefix: &str) -> bool {
    path.len() > prefix.len() && !path[prefix.len()..].contains('/')
}

fn child_prefix(dir: &str) -> String {
    if dir == "/" {
        "/".to_string()
    } else {
        format!("{}/", dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn test_create_requires_parent() {
        let fs = MemoryFs::default();
        let err = fs.create("/a/b", 3, 1024, 0o644).await.err().unwrap();
        assert!(err.is_not_found());

        fs.mkdir_all("/a", 0o755).await.unwrap();
        let mut w = fs.create("/a/b", 3, 1024, 0o644).await.unwrap();
        w.write(b"hello").await.unwrap();
        w.close().await.unwrap();

        let mut file = fs.open("/a/b").await.unwrap();
        let mut out = String::new();
        file.reader.read_to_string(&mut out).await.unwrap();
        assert_eq!(out, "hello");
        assert_eq!(file.info.size, 5);
    }

    #[tokio::test]
    async fn test_create_conflicts() {
        let fs = MemoryFs::default();
        let w = fs.create("/t", 3, 1024, 0o644).await.unwrap();
        let err = fs.create("/t", 3, 1024, 0o644).await.err().unwrap();
        assert!(matches!(err, FsError::AlreadyBeingCreated(_)));
        w.close().await.unwrap();
        let err = fs.create("/t", 3, 1024, 0o644).await.err().unwrap();
        assert!(matches!(err, FsError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_rename_replaces_file() {
        let fs = MemoryFs::default();
        fs.insert_file("/d/old", "old").unwrap();
        fs.insert_file("/d/new", "new").unwrap();
        fs.rename("/d/new", "/d/old").await.unwrap();
        assert!(fs.stat("/d/new").await.unwrap_err().is_not_found());
        assert_eq!(fs.stat("/d/old").await.unwrap().size, 3);
    }

    #[tokio::test]
    async fn test_rename_moves_subtree() {
        let fs = MemoryFs::default();
        fs.insert_file("/a/x/y", "1").unwrap();
        fs.rename("/a/x", "/a/z").await.unwrap();
        assert!(fs.stat("/a/z/y").await.is_ok());
        assert!(fs.stat("/a/x/y").await.is_err());
    }

    #[tokio::test]
    async fn test_read_dir_direct_children_only() {
        let fs = MemoryFs::default();
        fs.insert_file("/a/b", "1").unwrap();
        fs.insert_file("/a/c/d", "2").unwrap();
        fs.insert_file("/ab", "3").unwrap();
        let mut names: Vec<String> = fs
            .read_dir("/a")
            .await
            .unwrap()
            .into_iter()
            .map(|i| i.name)
            .collect();
        names.sort();
        assert_eq!(names, vec!["b", "c"]);
        assert_eq!(fs.read_dir("/").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_root_is_not_its_own_child() {
        let fs = MemoryFs::default();
        assert!(fs.read_dir("/").await.unwrap().is_empty());

        fs.insert_file("/x", "1").unwrap();
        let names: Vec<String> = fs
            .read_dir("/")
            .await
            .unwrap()
            .into_iter()
            .map(|i| i.name)
            .collect();
        assert_eq!(names, vec!["x"]);
        assert!(fs.remove("/").await.is_err());
    }

    #[tokio::test]
    async fn test_injected_faults() {
        let fs = MemoryFs::default();
        fs.insert_file("/a/b", "1").unwrap();
        fs.fail_stat("/a");
        assert!(!fs.stat("/a").await.unwrap_err().is_not_found());
        assert!(fs.stat("/a/b").await.is_ok());

        fs.fail_next_close(FsError::Remote {
            path: "/t".into(),
            exception: "java.io.IOException".into(),
            message: "pipeline failed".into(),
        });
        let mut w = fs.create("/t", 3, 1024, 0o644).await.unwrap();
        w.write(b"lost").await.unwrap();
        assert!(w.close().await.is_err());
        assert_eq!(fs.stat("/t").await.unwrap().size, 0);
        fs.remove("/t").await.unwrap();
    }

    #[tokio::test]
    async fn test_remove() {
        let fs = MemoryFs::default();
        fs.insert_file("/a/b", "1").unwrap();
        assert!(fs.remove("/a").await.is_err());
        fs.remove("/a/b").await.unwrap();
        assert!(fs.remove("/a/b").await.unwrap_err().is_not_found());
        fs.remove("/a").await.unwrap();
    }

    #[tokio::test]
    async fn test_close_after_remove_loses_lease() {
        let fs = MemoryFs::default();
        let w = fs.create("/t", 3, 1024, 0o644).await.unwrap();
        fs.remove("/t").await.unwrap();
        assert!(w.close().await.is_err());
    }
}
