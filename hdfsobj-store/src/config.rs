use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::address::{self, ResolvedAddress};
use crate::identity::{IdentityTranslator, DEFAULT_SUPERGROUP, DEFAULT_SUPERUSER};

pub const DEFAULT_REPLICATION: u16 = 3;
const REPLICATION_KEY: &str = "dfs.replication";

/// Store configuration as read from a TOML file.
///
/// ```toml
/// address = "hdfs://ns1/user/jfs"
/// user = "jfs"
///
/// [hadoop]
/// "dfs.namenode.rpc-address.ns1.nn1" = "nn1:8020"
/// "dfs.namenode.rpc-address.ns1.nn2" = "nn2:8020"
/// "dfs.replication" = "2"
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub superuser: Option<String>,
    #[serde(default)]
    pub supergroup: Option<String>,
    /// Hadoop configuration properties (core-site / hdfs-site).
    #[serde(default)]
    pub hadoop: BTreeMap<String, String>,
}

/// Everything the store needs, fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub address: ResolvedAddress,
    pub principal: String,
    pub replication: u16,
    pub identity: IdentityTranslator,
}

impl StoreConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;
        let config: StoreConfig = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse {}: {}", path.display(), e))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.address.is_empty() && !self.hadoop.contains_key("fs.defaultFS") {
            anyhow::bail!("address must be set when fs.defaultFS is not configured");
        }
        if matches!(self.superuser.as_deref(), Some("")) {
            anyhow::bail!("superuser must not be empty");
        }
        if matches!(self.supergroup.as_deref(), Some("")) {
            anyhow::bail!("supergroup must not be empty");
        }
        if let Some(value) = self.hadoop.get(REPLICATION_KEY) {
            if value.trim().parse::<u16>().map_or(true, |r| r == 0) {
                tracing::warn!(value = %value, "Ignoring invalid dfs.replication");
            }
        }
        Ok(())
    }

    /// Resolve against the process environment.
    pub fn resolve(&self) -> anyhow::Result<ResolvedConfig> {
        self.resolve_with(|name| std::env::var(name).ok())
    }

    /// Resolve using `env` to look up environment variables.
    ///
    /// Identities come from the file first, then `HADOOP_SUPER_USER` /
    /// `HADOOP_SUPER_GROUP`, then the HDFS defaults. The principal comes
    /// from `user`, then `HADOOP_USER_NAME`, then `USER`.
    pub fn resolve_with<F>(&self, env: F) -> anyhow::Result<ResolvedConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = |name: &str| env(name).filter(|v| !v.is_empty());

        let principal = self
            .user
            .clone()
            .filter(|u| !u.is_empty())
            .or_else(|| env("HADOOP_USER_NAME"))
            .or_else(|| env("USER"))
            .ok_or_else(|| anyhow::anyhow!("Cannot determine HDFS user: set user or HADOOP_USER_NAME"))?;

        let superuser = self
            .superuser
            .clone()
            .or_else(|| env("HADOOP_SUPER_USER"))
            .unwrap_or_else(|| DEFAULT_SUPERUSER.to_string());
        let supergroup = self
            .supergroup
            .clone()
            .or_else(|| env("HADOOP_SUPER_GROUP"))
            .unwrap_or_else(|| DEFAULT_SUPERGROUP.to_string());

        let replication = self
            .hadoop
            .get(REPLICATION_KEY)
            .and_then(|v| v.trim().parse::<u16>().ok())
            .filter(|r| *r > 0)
            .unwrap_or(DEFAULT_REPLICATION);

        let address = address::resolve(&self.address, &self.hadoop);
        if address.addresses.is_empty() {
            anyhow::bail!("No namenode address resolved from {:?}", self.address);
        }

        Ok(ResolvedConfig {
            address,
            principal,
            replication,
            identity: IdentityTranslator::new(superuser, supergroup),
        })
    }
}
