pub mod backend;
pub mod entry;
pub mod error;
pub mod listing;
pub mod remote;

pub use backend::{ObjectReader, ObjectStorage};
pub use entry::{Entry, FileMode};
pub use error::{FsError, ObjectError};
pub use listing::{ListItem, Listing};
pub use remote::{FileInfo, RemoteFile, RemoteFs, RemoteWriter};
