//! Error types for key-value store operations.

use stratum_types::ErrorKind;
use thiserror::Error;

/// Errors raised by the store itself, as opposed to errors returned by a
/// transaction body.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KvError {
    /// The bucket was never declared.
    #[error("bucket not found: {name}")]
    BucketNotFound { name: String },

    /// `create_bucket` named a bucket that already exists.
    #[error("bucket already exists: {name}")]
    BucketExists { name: String },

    /// The store has been closed.
    #[error("store is closed")]
    Closed,

    /// A transaction panicked while holding the store lock.
    #[error("store lock poisoned")]
    Poisoned,
}

impl KvError {
    /// Position of this error in the shared taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            KvError::BucketNotFound { .. } => ErrorKind::NotFound,
            KvError::BucketExists { .. } => ErrorKind::AlreadyExists,
            KvError::Closed | KvError::Poisoned => ErrorKind::Io,
        }
    }

    pub(crate) fn bucket_not_found(name: &[u8]) -> Self {
        KvError::BucketNotFound {
            name: String::from_utf8_lossy(name).into_owned(),
        }
    }
}

/// Convenience type alias for store operations.
pub type KvResult<T> = std::result::Result<T, KvError>;
