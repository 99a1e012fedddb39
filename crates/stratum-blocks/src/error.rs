use stratum_remote::RemoteError;
use stratum_types::{BlockId, ErrorKind, Interrupted};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BlocksError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Interrupted(#[from] Interrupted),

    #[error("block not found: {0}")]
    BlockNotFound(BlockId),

    #[error("seek to invalid position: {0}")]
    InvalidSeek(String),

    #[error("seek not supported: {0}")]
    UnsupportedSeek(String),

    #[error("freezer state lock poisoned")]
    Poisoned,
}

impl BlocksError {
    /// Position of this error in the shared taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            BlocksError::Io(_) | BlocksError::Poisoned => ErrorKind::Io,
            BlocksError::Remote(e) => e.kind(),
            BlocksError::Interrupted(_) => ErrorKind::Cancelled,
            BlocksError::BlockNotFound(_) => ErrorKind::NotFound,
            BlocksError::InvalidSeek(_) => ErrorKind::Range,
            BlocksError::UnsupportedSeek(_) => ErrorKind::Capability,
        }
    }
}

impl From<BlocksError> for std::io::Error {
    fn from(e: BlocksError) -> Self {
        match e {
            BlocksError::Io(e) => e,
            other => std::io::Error::other(other),
        }
    }
}

pub type BlocksResult<T> = Result<T, BlocksError>;
