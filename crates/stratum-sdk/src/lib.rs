//! Entry point for embedding the Stratum storage core.
//!
//! [`StorageConfig`] describes where blocks, scratch files and metadata
//! live; [`Storage`] wires the metadata store, remote factory, writeable
//! store and freezer together from it.

pub mod config;
pub mod error;
pub mod storage;

pub use config::StorageConfig;
pub use error::{SdkError, SdkResult};
pub use storage::Storage;

pub use stratum_blocks::{Freezer, FrozenRef, NewBlock, Reader, WritableRef, WriteableStore};
pub use stratum_kv::{KvStore, ReadBucket, ReadTx, WriteBucket, WriteTx};
pub use stratum_remote::{RemoteRef, RemoteRefFactory};
pub use stratum_types::{BlockId, Context, ErrorKind, NodeRepr};
