//! Lazily produced listing results.
//!
//! A producer task pushes entries into a bounded channel; the consumer pulls
//! them through [`Listing::next`]. Dropping the `Listing` cancels the
//! producer, so walking away from a half-read listing never strands a task
//! blocked on a full channel.

use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::entry::Entry;
use crate::error::ObjectError;

/// One element of a listing: an entry, or the error hit while visiting a
/// node. Errors do not end the listing.
pub type ListItem = Result<Entry, ObjectError>;

pub struct Listing {
    rx: mpsc::Receiver<ListItem>,
    cancel: Option<DropGuard>,
}

impl Listing {
    pub fn new(rx: mpsc::Receiver<ListItem>, cancel: CancellationToken) -> Self {
        Self {
            rx,
            cancel: Some(cancel.drop_guard()),
        }
    }

    /// A listing that yields nothing.
    pub fn empty() -> Self {
        let (_, rx) = mpsc::channel(1);
        Self { rx, cancel: None }
    }

    /// Next item, or `None` once the producer has finished.
    pub async fn next(&mut self) -> Option<ListItem> {
        self.rx.recv().await
    }

    /// Stop the producer. Items already buffered can still be drained.
    pub fn cancel(&mut self) {
        // Dropping the guard cancels the token.
        self.cancel.take();
        self.rx.close();
    }

    /// Drain the listing, failing on the first error element.
    pub async fn try_collect(mut self) -> Result<Vec<Entry>, ObjectError> {
        let mut entries = Vec::new();
        while let Some(item) = self.next().await {
            entries.push(item?);
        }
        Ok(entries)
    }
}
