//! Recursive listing.
//!
//! A spawned task walks the tree depth-first, visiting siblings in sorted
//! order with directory names suffixed by `/`, which yields keys in full
//! byte-wise order. Entries flow to the caller through a bounded channel.
//! Subtrees that cannot contain a matching key are pruned without being
//! read.

use std::sync::Arc;

use hdfsobj_common::{Entry, FileInfo, ListItem, Listing, ObjectError, RemoteFs};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::identity::IdentityTranslator;
use crate::list::sorted_children;
use crate::path::{dir_of, PathMapper};

/// Entries buffered ahead of a slow consumer.
pub const LIST_ALL_BUFFER: usize = 10240;

#[derive(Clone)]
pub struct TreeWalker {
    fs: Arc<dyn RemoteFs>,
    mapper: PathMapper,
    identity: IdentityTranslator,
    capacity: usize,
}

impl TreeWalker {
    pub fn new(fs: Arc<dyn RemoteFs>, mapper: PathMapper, identity: IdentityTranslator) -> Self {
        Self {
            fs,
            mapper,
            identity,
            capacity: LIST_ALL_BUFFER,
        }
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    /// Every entry that starts with `prefix` and sorts after `marker`.
    pub async fn list_all(&self, prefix: &str, marker: &str) -> Result<Listing, ObjectError> {
        let (listing, _) = self.start(prefix, marker).await?;
        Ok(listing)
    }

    /// Resolve the traversal root and spawn the producer. The handle is
    /// `None` when there is nothing to walk.
    pub async fn start(
        &self,
        prefix: &str,
        marker: &str,
    ) -> Result<(Listing, Option<JoinHandle<()>>), ObjectError> {
        let Some((root_key, root_info)) = self.resolve_root(prefix).await? else {
            return Ok((Listing::empty(), None));
        };

        let (tx, rx) = mpsc::channel(self.capacity);
        let cancel = CancellationToken::new();
        let walk = Walk {
            fs: self.fs.clone(),
            mapper: self.mapper.clone(),
            identity: self.identity.clone(),
            prefix: prefix.to_string(),
            marker: marker.to_string(),
            tx,
            cancel: cancel.clone(),
        };
        let handle = tokio::spawn(walk.run(root_key, root_info));
        Ok((Listing::new(rx, cancel), Some(handle)))
    }

    /// The directory to walk: `prefix` itself when it names an existing
    /// directory, otherwise the directory containing it. `None` when that
    /// directory does not exist.
    async fn resolve_root(&self, prefix: &str) -> Result<Option<(String, FileInfo)>, ObjectError> {
        let full = self.mapper.to_remote(prefix);
        let root = dir_of(&full);
        let info = match self.fs.stat(root).await {
            Ok(info) => info,
            Err(e) if e.is_not_found() => {
                debug!(root = %root, "List root does not exist");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        if !info.is_dir {
            return Ok(None);
        }
        Ok(self
            .mapper
            .to_logical(root)
            .map(|key| (key.to_string(), info)))
    }
}

struct Walk {
    fs: Arc<dyn RemoteFs>,
    mapper: PathMapper,
    identity: IdentityTranslator,
    prefix: String,
    marker: String,
    tx: mpsc::Sender<ListItem>,
    cancel: CancellationToken,
}

impl Walk {
    async fn run(self, root_key: String, root_info: FileInfo) {
        let mut stack = vec![(root_key, root_info)];
        let mut emitted = 0u64;

        while let Some((key, info)) = stack.pop() {
            if self.cancel.is_cancelled() {
                debug!(prefix = %self.prefix, emitted, "List cancelled");
                return;
            }

            let matched = self.matches(&key);
            if !matched && !(info.is_dir && self.is_ancestor(&key)) {
                continue;
            }
            if matched && !key.is_empty() {
                let entry: Entry = self.identity.to_entry(key.clone(), &info);
                if !self.send(Ok(entry)).await {
                    return;
                }
                emitted += 1;
            }
            if !info.is_dir {
                continue;
            }

            let path = self.mapper.to_remote(&key);
            match self.fs.read_dir(&path).await {
                Ok(children) => {
                    let children = sorted_children(children);
                    stack.extend(
                        children
                            .into_iter()
                            .rev()
                            .map(|(name, info)| (format!("{}{}", key, name), info)),
                    );
                }
                Err(e) if e.is_not_found() => {
                    debug!(path = %path, "Directory vanished during list");
                }
                Err(e) => {
                    error!(path = %path, error = %e, "List directory failed");
                    if !self.send(Err(ObjectError::from(e))).await {
                        return;
                    }
                }
            }
        }
        debug!(prefix = %self.prefix, emitted, "List complete");
    }

    fn matches(&self, key: &str) -> bool {
        key.starts_with(self.prefix.as_str())
            && (self.marker.is_empty() || key > self.marker.as_str())
    }

    /// A directory whose subtree may still hold the prefix or the marker.
    fn is_ancestor(&self, key: &str) -> bool {
        self.prefix.starts_with(key) || self.marker.starts_with(key)
    }

    /// False once the consumer is gone or has cancelled.
    async fn send(&self, item: ListItem) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            sent = self.tx.send(item) => sent.is_ok(),
        }
    }
}
