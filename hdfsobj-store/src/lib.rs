//! HDFS exposed as a flat object store.

pub mod address;
pub mod buffer;
pub mod config;
pub mod hdfs;
pub mod identity;
pub mod list;
pub mod memory;
pub mod path;
pub mod walk;
pub mod writer;

pub use config::{ResolvedConfig, StoreConfig};
pub use hdfs::{ClientOptions, HdfsStore};
pub use memory::MemoryFs;
