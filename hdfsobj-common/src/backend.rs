use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::io::AsyncRead;

use crate::entry::{Entry, FileMode};
use crate::error::ObjectError;
use crate::listing::Listing;

pub type ObjectReader = Box<dyn AsyncRead + Send + Unpin>;

/// Trait implemented by object-store backends.
///
/// The caller sees a flat key space: keys are slash-structured strings and
/// directory markers are keys ending in `/`. The backend owns the mapping
/// onto whatever it stores underneath.
#[async_trait]
pub trait ObjectStorage: Send + Sync + fmt::Display {
    /// Metadata for a key, or `ObjectError::NotFound`.
    async fn head(&self, key: &str) -> Result<Entry, ObjectError>;

    /// Stream the object starting at `offset`. A positive `limit` bounds
    /// the number of bytes; zero or negative reads to the end.
    async fn get(&self, key: &str, offset: u64, limit: i64) -> Result<ObjectReader, ObjectError>;

    /// Replace the object at `key` with the full contents of `reader`.
    /// A key ending in `/` creates a directory marker instead.
    async fn put(
        &self,
        key: &str,
        reader: &mut (dyn AsyncRead + Send + Unpin),
    ) -> Result<(), ObjectError>;

    /// Remove a key. Removing an absent key succeeds.
    async fn delete(&self, key: &str) -> Result<(), ObjectError>;

    /// Up to `limit` entries under `prefix` and after `marker`, in key order.
    async fn list(
        &self,
        prefix: &str,
        marker: &str,
        delimiter: &str,
        limit: usize,
    ) -> Result<Vec<Entry>, ObjectError>;

    /// Every entry under `prefix` and after `marker`, in key order.
    async fn list_all(&self, prefix: &str, marker: &str) -> Result<Listing, ObjectError>;

    async fn chtimes(&self, key: &str, mtime: DateTime<Utc>) -> Result<(), ObjectError>;

    async fn chmod(&self, key: &str, mode: FileMode) -> Result<(), ObjectError>;

    async fn chown(&self, key: &str, owner: &str, group: &str) -> Result<(), ObjectError>;
}
