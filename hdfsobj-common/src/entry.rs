use chrono::{DateTime, Utc};

/// Permission bits plus the sticky flag, kept apart from the bits because
/// the remote store and the canonical model disagree on where it lives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileMode {
    pub perm: u32,
    pub sticky: bool,
}

impl FileMode {
    pub fn new(perm: u32) -> Self {
        Self { perm, sticky: false }
    }

    pub fn with_sticky(mut self, sticky: bool) -> Self {
        self.sticky = sticky;
        self
    }
}

/// Metadata for one object or directory marker.
///
/// Directory keys end with `/` (the empty root key excepted); file keys
/// never do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub key: String,
    /// Always 0 for directories.
    pub size: u64,
    pub mtime: DateTime<Utc>,
    pub is_dir: bool,
    pub owner: String,
    pub group: String,
    pub mode: FileMode,
}

impl Entry {
    pub fn is_root(&self) -> bool {
        self.key.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_mode_sticky() {
        let mode = FileMode::new(0o755);
        assert!(!mode.sticky);
        let mode = mode.with_sticky(true);
        assert_eq!(mode.perm, 0o755);
        assert!(mode.sticky);
    }
}
