use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("invalid base64 string: {0}")]
    InvalidBase64(String),

    #[error("invalid byte length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("invalid key prefix {prefix:?}: {reason}")]
    InvalidPrefix { prefix: String, reason: String },
}

/// Storage error kinds shared by every Stratum crate.
///
/// Concrete error types map themselves onto one of these kinds through a
/// `kind()` method, so layers above the storage core can branch on the kind
/// (for example treating [`ErrorKind::UndefinedRoot`] as a first run)
/// without depending on backend-specific error types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Error)]
pub enum ErrorKind {
    /// Identifier space exhausted.
    #[error("identifier space exhausted")]
    ResourceExhausted,
    /// Parent node does not exist.
    #[error("parent does not exist")]
    ParentMissing,
    /// Operation requires a directory.
    #[error("not a directory")]
    NotADirectory,
    /// Node, root, lease, or block is absent.
    #[error("does not exist")]
    NotFound,
    /// Name is not a valid file name.
    #[error("invalid file name")]
    InvalidName,
    /// Name contains a forbidden character.
    #[error("file name contains invalid character")]
    InvalidNameCharacter,
    /// Target already exists.
    #[error("file already exists")]
    AlreadyExists,
    /// Directory still has entries.
    #[error("directory is not empty")]
    DirectoryNotEmpty,
    /// Operation requires a plain file.
    #[error("is a directory, not a normal file")]
    IsADirectory,
    /// Path is already a mount point.
    #[error("path is already mounted")]
    AlreadyMounted,
    /// Path is not a mount point.
    #[error("not a valid mount")]
    NoSuchMount,
    /// Root name was never set.
    #[error("root is not defined")]
    UndefinedRoot,
    /// Byte range outside object bounds.
    #[error("byte range out of bounds")]
    Range,
    /// Conditional write target already exists or changed.
    #[error("conflicting write")]
    Conflict,
    /// Local or backend I/O failure.
    #[error("i/o failure")]
    Io,
    /// Network transport failure.
    #[error("network failure")]
    Network,
    /// Request beyond what the backend supports.
    #[error("operation not supported by backend")]
    Capability,
    /// Operation cancelled or its deadline passed.
    #[error("operation cancelled")]
    Cancelled,
    /// Stored data could not be decoded.
    #[error("corrupt data")]
    Corrupt,
}
