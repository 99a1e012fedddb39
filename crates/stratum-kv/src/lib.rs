//! Transactional key-value store for Stratum metadata.
//!
//! Metadata (directory tables, named roots) lives in a small store with
//! byte-string keys partitioned into named buckets. Access happens only
//! through transactions: [`KvStore::view`] for reads and [`KvStore::update`]
//! for writes. A failed update rolls back every mutation it made.
//!
//! # Modules
//!
//! - [`error`]: [`KvError`] and the [`KvResult`] alias
//! - [`traits`]: [`KvStore`] plus the transaction and bucket handles
//! - [`memory`]: [`InMemoryKvStore`] backed by in-process maps

pub mod error;
pub mod memory;
pub mod traits;
mod undo;

pub use error::{KvError, KvResult};
pub use memory::InMemoryKvStore;
pub use traits::{KvStore, ReadBucket, ReadTx, WriteBucket, WriteTx};
