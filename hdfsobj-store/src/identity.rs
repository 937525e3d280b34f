//! Owner, group and mode translation between HDFS and the canonical model.
//!
//! HDFS has no `root`; its superuser and supergroup play that role. The
//! sticky bit also lives elsewhere: HDFS reports it as `0o1000` in the
//! mode, the canonical model carries it as a separate flag.

use hdfsobj_common::{Entry, FileInfo, FileMode};

pub const DEFAULT_SUPERUSER: &str = "hdfs";
pub const DEFAULT_SUPERGROUP: &str = "supergroup";
pub const ROOT: &str = "root";

const REMOTE_STICKY_BIT: u32 = 0o1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityTranslator {
    superuser: String,
    supergroup: String,
}

impl Default for IdentityTranslator {
    fn default() -> Self {
        Self::new(DEFAULT_SUPERUSER, DEFAULT_SUPERGROUP)
    }
}

impl IdentityTranslator {
    pub fn new(superuser: impl Into<String>, supergroup: impl Into<String>) -> Self {
        Self {
            superuser: superuser.into(),
            supergroup: supergroup.into(),
        }
    }

    pub fn superuser(&self) -> &str {
        &self.superuser
    }

    pub fn supergroup(&self) -> &str {
        &self.supergroup
    }

    pub fn owner_to_canonical(&self, owner: &str) -> String {
        if owner == self.superuser {
            ROOT.to_string()
        } else {
            owner.to_string()
        }
    }

    pub fn group_to_canonical(&self, group: &str) -> String {
        if group == self.supergroup {
            ROOT.to_string()
        } else {
            group.to_string()
        }
    }

    pub fn owner_to_remote(&self, owner: &str) -> String {
        if owner == ROOT {
            self.superuser.clone()
        } else {
            owner.to_string()
        }
    }

    pub fn group_to_remote(&self, group: &str) -> String {
        if group == ROOT {
            self.supergroup.clone()
        } else {
            group.to_string()
        }
    }

    pub fn mode_to_canonical(&self, bits: u32) -> FileMode {
        if bits & REMOTE_STICKY_BIT != 0 {
            FileMode::new(bits & !REMOTE_STICKY_BIT).with_sticky(true)
        } else {
            FileMode::new(bits)
        }
    }

    pub fn mode_to_remote(&self, mode: FileMode) -> u32 {
        if mode.sticky {
            mode.perm | REMOTE_STICKY_BIT
        } else {
            mode.perm
        }
    }

    /// Build the entry for `key` from a remote stat result.
    pub fn to_entry(&self, mut key: String, info: &FileInfo) -> Entry {
        let size = if info.is_dir {
            if !key.is_empty() && !key.ends_with('/') {
                key.push('/');
            }
            0
        } else {
            while key.ends_with('/') {
                key.pop();
            }
            info.size
        };
        Entry {
            key,
            size,
            mtime: info.mtime,
            is_dir: info.is_dir,
            owner: self.owner_to_canonical(&info.owner),
            group: self.group_to_canonical(&info.group),
            mode: self.mode_to_canonical(info.mode),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn info(is_dir: bool, mode: u32) -> FileInfo {
        FileInfo {
            name: "x".into(),
            size: 4096,
            mtime: Utc::now(),
            is_dir,
            owner: "hdfs".into(),
            group: "supergroup".into(),
            mode,
        }
    }

    #[test]
    fn test_root_round_trip() {
        for (user, group) in [("hdfs", "supergroup"), ("admin", "wheel"), ("root", "root")] {
            let ids = IdentityTranslator::new(user, group);
            assert_eq!(ids.owner_to_canonical(&ids.owner_to_remote("root")), "root");
            assert_eq!(ids.group_to_canonical(&ids.group_to_remote("root")), "root");
        }
    }

    #[test]
    fn test_other_names_pass_through() {
        let ids = IdentityTranslator::default();
        assert_eq!(ids.owner_to_canonical("alice"), "alice");
        assert_eq!(ids.owner_to_remote("alice"), "alice");
        assert_eq!(ids.group_to_remote("root"), "supergroup");
        assert_eq!(ids.owner_to_canonical("hdfs"), "root");
    }

    #[test]
    fn test_sticky_bit() {
        let ids = IdentityTranslator::default();
        let mode = ids.mode_to_canonical(0o1777);
        assert_eq!(mode.perm, 0o777);
        assert!(mode.sticky);
        assert_eq!(ids.mode_to_remote(mode), 0o1777);

        let mode = ids.mode_to_canonical(0o644);
        assert!(!mode.sticky);
        assert_eq!(ids.mode_to_remote(mode), 0o644);
    }

    #[test]
    fn test_to_entry() {
        let ids = IdentityTranslator::default();
        let dir = ids.to_entry("a".into(), &info(true, 0o755));
        assert_eq!(dir.key, "a/");
        assert_eq!(dir.size, 0);
        assert_eq!(dir.owner, "root");
        assert_eq!(dir.group, "root");

        let root = ids.to_entry(String::new(), &info(true, 0o755));
        assert_eq!(root.key, "");

        let file = ids.to_entry("a/b".into(), &info(false, 0o644));
        assert_eq!(file.key, "a/b");
        assert_eq!(file.size, 4096);

        let file = ids.to_entry("a/".into(), &info(false, 0o644));
        assert_eq!(file.key, "a");
        assert!(!file.is_dir);
    }
}
