use stratum_blocks::BlocksError;
use stratum_kv::KvError;
use stratum_remote::RemoteError;
use stratum_types::ErrorKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SdkError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("metadata store error: {0}")]
    Kv(#[from] KvError),

    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),

    #[error("block error: {0}")]
    Blocks(#[from] BlocksError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SdkError {
    /// Position of this error in the shared taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SdkError::Config(_) => ErrorKind::InvalidName,
            SdkError::Kv(e) => e.kind(),
            SdkError::Remote(e) => e.kind(),
            SdkError::Blocks(e) => e.kind(),
            SdkError::Io(_) => ErrorKind::Io,
        }
    }
}

pub type SdkResult<T> = Result<T, SdkError>;
