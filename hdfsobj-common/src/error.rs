/// Errors reported by a remote filesystem client.
#[derive(Debug, thiserror::Error)]
pub enum FsError {
    #[error("{0}: file does not exist")]
    NotFound(String),
    #[error("{0}: file already exists")]
    AlreadyExists(String),
    /// Another client holds the create lease on the path.
    #[error("{0}: file is already being created")]
    AlreadyBeingCreated(String),
    /// Close returned before the last block reached its replication target.
    /// The data is durable; only the replica count is still catching up.
    #[error("{0}: replication in progress")]
    Replicating(String),
    #[error("{path}: {exception}: {message}")]
    Remote {
        path: String,
        exception: String,
        message: String,
    },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FsError {
    pub fn is_not_found(&self) -> bool {
        match self {
            FsError::NotFound(_) => true,
            FsError::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }

    /// Both spellings of "somebody else owns this path right now".
    pub fn is_concurrent_create(&self) -> bool {
        matches!(self, FsError::AlreadyExists(_) | FsError::AlreadyBeingCreated(_))
    }

    pub fn is_replicating(&self) -> bool {
        matches!(self, FsError::Replicating(_))
    }
}

/// Errors surfaced to callers of an object store.
#[derive(Debug, thiserror::Error)]
pub enum ObjectError {
    #[error("object not found: {0}")]
    NotFound(String),
    #[error("operation not supported: {0}")]
    Unsupported(String),
    #[error(transparent)]
    Remote(#[from] FsError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ObjectError {
    /// Convert a remote error for `key`, folding not-found into
    /// `ObjectError::NotFound` so callers only check one variant.
    pub fn from_fs(key: &str, err: FsError) -> Self {
        if err.is_not_found() {
            ObjectError::NotFound(key.to_string())
        } else {
            ObjectError::Remote(err)
        }
    }

    pub fn is_not_found(&self) -> bool {
        match self {
            ObjectError::NotFound(_) => true,
            ObjectError::Remote(e) => e.is_not_found(),
            ObjectError::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            ObjectError::Unsupported(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_folding() {
        let err = ObjectError::from_fs("a/b", FsError::NotFound("/base/a/b".into()));
        assert!(matches!(err, ObjectError::NotFound(ref k) if k == "a/b"));

        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert!(ObjectError::from_fs("x", FsError::Io(io)).is_not_found());

        let err = ObjectError::from_fs("x", FsError::AlreadyExists("/x".into()));
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_concurrent_create_kinds() {
        assert!(FsError::AlreadyExists("/t".into()).is_concurrent_create());
        assert!(FsError::AlreadyBeingCreated("/t".into()).is_concurrent_create());
        assert!(!FsError::NotFound("/t".into()).is_concurrent_create());
        assert!(FsError::Replicating("/t".into()).is_replicating());
    }
}
