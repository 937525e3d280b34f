//! Namenode address resolution.
//!
//! An address looks like `hdfs://authority/sub/path`. The authority is
//! either a nameservice declared in the Hadoop configuration (resolved to
//! every `dfs.namenode.rpc-address.<ns>[.<nn>]` entry) or a literal
//! comma-separated `host:port` list. A configured nameservice always wins
//! over the literal reading of the same string.

use std::collections::BTreeMap;
use std::fmt;

use tracing::debug;

const RPC_ADDRESS_KEY: &str = "dfs.namenode.rpc-address.";
const DEFAULT_FS_KEY: &str = "fs.defaultFS";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressSource {
    /// Addresses came from the nameservice's rpc-address entries.
    Nameservice(String),
    /// The authority was taken as a literal `host:port` list.
    Literal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAddress {
    pub addresses: Vec<String>,
    /// Absolute, always ends with `/`.
    pub base_path: String,
    pub source: AddressSource,
}

impl fmt::Display for ResolvedAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "hdfs://{}{}", self.addresses.join(","), self.base_path)
    }
}

/// Resolve `addr` against the Hadoop configuration. An empty `addr` falls
/// back to `fs.defaultFS`.
pub fn resolve(addr: &str, conf: &BTreeMap<String, String>) -> ResolvedAddress {
    let addr = if addr.is_empty() {
        conf.get(DEFAULT_FS_KEY).map(String::as_str).unwrap_or("")
    } else {
        addr
    };

    let without_scheme = match addr.split_once("://") {
        Some((_, rest)) => rest,
        None => addr,
    };
    let (authority, sub_path) = match without_scheme.split_once('/') {
        Some((authority, sub_path)) => (authority, sub_path),
        None => (without_scheme, ""),
    };

    let base_path = match sub_path.trim_end_matches('/') {
        "" => "/".to_string(),
        trimmed => format!("/{}/", trimmed),
    };

    let nameservice_key = format!("{}{}", RPC_ADDRESS_KEY, authority);
    let nameservice_prefix = format!("{}.", nameservice_key);
    let namenodes: Vec<String> = conf
        .iter()
        .filter(|(k, _)| **k == nameservice_key || k.starts_with(&nameservice_prefix))
        .map(|(_, v)| v.clone())
        .collect();

    if !authority.is_empty() && !namenodes.is_empty() {
        debug!(nameservice = %authority, count = namenodes.len(), "Resolved nameservice");
        return ResolvedAddress {
            addresses: namenodes,
            base_path,
            source: AddressSource::Nameservice(authority.to_string()),
        };
    }

    let addresses = authority
        .split(',')
        .filter(|a| !a.is_empty())
        .map(|a| a.to_string())
        .collect();
    ResolvedAddress {
        addresses,
        base_path,
        source: AddressSource::Literal,
    }
}
