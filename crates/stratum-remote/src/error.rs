use stratum_types::{BlockId, ErrorKind, Interrupted, TypeError};

/// Errors from remote object operations.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    /// The object, lease or resource does not exist.
    #[error("not found: {what}")]
    NotFound { what: String },

    /// No block with this id has been pushed.
    #[error("block not found: {0}")]
    BlockNotFound(BlockId),

    /// The named root has never been set.
    #[error("undefined root: {name}")]
    UndefinedRoot { name: String },

    /// The requested byte range does not fit inside the object.
    #[error("range out of bounds: offset {offset} + len {len} exceeds size {size}")]
    Range { offset: u64, len: u64, size: u64 },

    /// Stored content disagrees with what the caller asserted.
    #[error("conflict on {key}: {reason}")]
    Conflict { key: String, reason: String },

    /// A conditional write found the object in an unexpected state.
    #[error("precondition failed for {key}")]
    PreconditionFailed { key: String },

    /// Fewer bytes arrived than were requested.
    #[error("short copy: expected {expected} bytes, got {actual}")]
    ShortCopy { expected: u64, actual: u64 },

    /// I/O error writing to a sink or reading a source.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Transport failure talking to a remote service.
    #[error("network error: {0}")]
    Network(String),

    /// The backend cannot perform the requested operation.
    #[error("unsupported: {0}")]
    Capability(String),

    /// The caller's context was cancelled or expired.
    #[error(transparent)]
    Interrupted(#[from] Interrupted),

    /// A stored record could not be decoded, or a response does not match
    /// what was requested.
    #[error("corrupt data at {key}: {reason}")]
    Corrupt { key: String, reason: String },

    /// Invalid prefix or other construction parameter.
    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] TypeError),

    /// A backend lock was poisoned by a panicking writer.
    #[error("backend lock poisoned")]
    Poisoned,
}

impl RemoteError {
    /// Position of this error in the shared taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            RemoteError::NotFound { .. } | RemoteError::BlockNotFound(_) => ErrorKind::NotFound,
            RemoteError::UndefinedRoot { .. } => ErrorKind::UndefinedRoot,
            RemoteError::Range { .. } => ErrorKind::Range,
            RemoteError::Conflict { .. } | RemoteError::PreconditionFailed { .. } => {
                ErrorKind::Conflict
            }
            RemoteError::ShortCopy { .. } | RemoteError::Io(_) | RemoteError::Poisoned => {
                ErrorKind::Io
            }
            RemoteError::Network(_) => ErrorKind::Network,
            RemoteError::Capability(_) => ErrorKind::Capability,
            RemoteError::Interrupted(_) => ErrorKind::Cancelled,
            RemoteError::Corrupt { .. } => ErrorKind::Corrupt,
            RemoteError::InvalidConfig(_) => ErrorKind::InvalidName,
        }
    }

    /// Returns `true` for the "does not exist" family of errors.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            RemoteError::NotFound { .. } | RemoteError::BlockNotFound(_)
        )
    }

    pub(crate) fn not_found(what: impl Into<String>) -> Self {
        RemoteError::NotFound { what: what.into() }
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(e: reqwest::Error) -> Self {
        RemoteError::Network(e.to_string())
    }
}

/// Result alias for remote operations.
pub type RemoteResult<T> = Result<T, RemoteError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds() {
        assert_eq!(RemoteError::not_found("x").kind(), ErrorKind::NotFound);
        assert_eq!(
            RemoteError::BlockNotFound(BlockId::of(b"b")).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            RemoteError::UndefinedRoot { name: "main".into() }.kind(),
            ErrorKind::UndefinedRoot
        );
        assert_eq!(
            RemoteError::Range { offset: 1, len: 2, size: 2 }.kind(),
            ErrorKind::Range
        );
        assert_eq!(
            RemoteError::PreconditionFailed { key: "k".into() }.kind(),
            ErrorKind::Conflict
        );
        assert_eq!(
            RemoteError::Interrupted(Interrupted::DeadlineExceeded).kind(),
            ErrorKind::Cancelled
        );
    }

    #[test]
    fn not_found_family() {
        assert!(RemoteError::BlockNotFound(BlockId::null()).is_not_found());
        assert!(!RemoteError::UndefinedRoot { name: "r".into() }.is_not_found());
    }

    #[test]
    fn display_messages() {
        let err = RemoteError::Range { offset: 10, len: 5, size: 12 };
        assert_eq!(
            err.to_string(),
            "range out of bounds: offset 10 + len 5 exceeds size 12"
        );
        let err = RemoteError::Conflict {
            key: "CAS/abc".into(),
            reason: "different content".into(),
        };
        assert!(err.to_string().contains("CAS/abc"));
    }
}
