//! Single-level paginated listing.

use hdfsobj_common::{Entry, FileInfo, ObjectError, RemoteFs};
use tracing::debug;

use crate::identity::IdentityTranslator;
use crate::path::{dir_of, PathMapper};

pub struct Lister<'a> {
    fs: &'a dyn RemoteFs,
    mapper: &'a PathMapper,
    identity: &'a IdentityTranslator,
}

impl<'a> Lister<'a> {
    pub fn new(
        fs: &'a dyn RemoteFs,
        mapper: &'a PathMapper,
        identity: &'a IdentityTranslator,
    ) -> Self {
        Self {
            fs,
            mapper,
            identity,
        }
    }

    /// Up to `limit` entries that start with `prefix` and sort after
    /// `marker`, in byte-wise key order. Only the `/` delimiter is
    /// supported.
    ///
    /// A prefix ending in `/` lists that directory, starting with the
    /// directory's own entry when no marker is given. Any other prefix lists
    /// the directory containing it and keeps the matching children.
    pub async fn list(
        &self,
        prefix: &str,
        marker: &str,
        delimiter: &str,
        limit: usize,
    ) -> Result<Vec<Entry>, ObjectError> {
        if delimiter != "/" {
            return Err(ObjectError::Unsupported(format!(
                "list with delimiter {:?}",
                delimiter
            )));
        }
        if limit == 0 {
            return Ok(Vec::new());
        }

        let full = self.mapper.to_remote(prefix);
        let mut entries = Vec::new();
        if prefix.ends_with('/') && marker.is_empty() {
            match stat_entry(self.fs, self.mapper, self.identity, prefix).await {
                Ok(entry) => entries.push(entry),
                Err(e) if e.is_not_found() => return Ok(Vec::new()),
                Err(e) => return Err(e),
            }
        }
        let dir = dir_of(&full);

        let children = match self.fs.read_dir(dir).await {
            Ok(children) => children,
            Err(e) if e.is_not_found() => {
                debug!(dir = %dir, "Listing directory does not exist");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        for (name, info) in sorted_children(children) {
            if entries.len() >= limit {
                break;
            }
            let path = format!("{}{}", dir, name);
            let Some(key) = self.mapper.to_logical(&path) else {
                continue;
            };
            if !key.starts_with(prefix) || (!marker.is_empty() && key <= marker) {
                continue;
            }
            entries.push(self.identity.to_entry(key.to_string(), &info));
        }
        Ok(entries)
    }
}

/// Metadata for a single key. A key ending in `/` only names a directory;
/// on a file it is not found.
pub async fn stat_entry(
    fs: &dyn RemoteFs,
    mapper: &PathMapper,
    identity: &IdentityTranslator,
    key: &str,
) -> Result<Entry, ObjectError> {
    let info = fs
        .stat(&mapper.to_remote(key))
        .await
        .map_err(|e| ObjectError::from_fs(key, e))?;
    if key.ends_with('/') && !info.is_dir {
        return Err(ObjectError::NotFound(key.to_string()));
    }
    Ok(identity.to_entry(key.to_string(), &info))
}

/// Children keyed by name, directories suffixed with `/`, in byte order.
/// Nameless entries are dropped; the walker would otherwise revisit the
/// parent.
///
/// Sorting on the suffixed name is what makes a directory's subtree sort
/// right after the directory and before any sibling greater than it.
pub(crate) fn sorted_children(children: Vec<FileInfo>) -> Vec<(String, FileInfo)> {
    let mut named: Vec<(String, FileInfo)> = children
        .into_iter()
        .filter(|info| !info.name.is_empty())
        .map(|info| {
            let name = if info.is_dir {
                format!("{}/", info.name)
            } else {
                info.name.clone()
            };
            (name, info)
        })
        .collect();
    named.sort_by(|a, b| a.0.cmp(&b.0));
    named
}
