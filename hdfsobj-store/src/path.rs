/// Maps object keys onto absolute remote paths under a base directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathMapper {
    base_path: String,
}

impl PathMapper {
    /// `base_path` must be absolute and end with `/`.
    pub fn new(base_path: impl Into<String>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    pub fn to_remote(&self, key: &str) -> String {
        format!("{}{}", self.base_path, key)
    }

    /// The key for a remote path, or `None` for paths outside the base.
    pub fn to_logical<'a>(&self, path: &'a str) -> Option<&'a str> {
        path.strip_prefix(self.base_path.as_str())
    }
}

/// Everything up to and including the last `/` of `path`. A path that
/// already ends in `/` is returned unchanged.
pub fn dir_of(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[..=idx],
        None => "/",
    }
}

/// Parent directory of `path` without a trailing `/` (`/` for top level).
pub fn parent_of(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(0) | None => "/",
        Some(idx) => &trimmed[..idx],
    }
}

/// Last path component, ignoring a trailing `/`.
pub fn base_name(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(idx) => &trimmed[idx + 1..],
        None => trimmed,
    }
}
