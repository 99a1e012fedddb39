//! The [`KvStore`] trait and its transaction and bucket handles.
//!
//! Any backend (in-memory, on-disk) implements these traits. The contract a
//! backend must honor:
//!
//! - [`KvStore::view`] never observes the partial effects of an in-flight
//!   [`KvStore::update`].
//! - An `update` whose body returns `Err` leaves no observable mutation.
//! - Values handed out by [`ReadBucket::get`] are private copies.
//! - Deleted keys are tombstones and are invisible to reads and enumeration.

use crate::error::{KvError, KvResult};

/// Read access to one bucket.
pub trait ReadBucket {
    /// Value stored under `key`, or `None` if absent or deleted.
    fn get(&self, key: &[u8]) -> Option<Vec<u8>>;

    /// Call `f` for every live key starting with `prefix`.
    ///
    /// Stops at the first error `f` returns and hands it back.
    fn for_each_with_prefix<E, F>(&self, prefix: &[u8], f: F) -> Result<(), E>
    where
        F: FnMut(&[u8], &[u8]) -> Result<(), E>;
}

/// Write access to one bucket inside an update transaction.
pub trait WriteBucket: ReadBucket {
    /// Store a copy of `value` under `key`.
    fn put(&mut self, key: &[u8], value: &[u8]) -> KvResult<()>;

    /// Tombstone `key`.
    fn delete(&mut self, key: &[u8]) -> KvResult<()>;
}

/// A read-only transaction.
pub trait ReadTx {
    type Bucket<'a>: ReadBucket
    where
        Self: 'a;

    /// Open a declared bucket for reading.
    fn bucket(&self, name: &[u8]) -> KvResult<Self::Bucket<'_>>;
}

/// A read-write transaction.
pub trait WriteTx: ReadTx {
    type BucketMut<'a>: WriteBucket
    where
        Self: 'a;

    /// Open a declared bucket for writing.
    fn bucket_mut(&mut self, name: &[u8]) -> KvResult<Self::BucketMut<'_>>;

    /// Declare a new, empty bucket. Undone if the transaction aborts.
    fn create_bucket(&mut self, name: &[u8]) -> KvResult<()>;
}

/// Bucket-partitioned transactional key-value store.
///
/// Transaction bodies may return any error type that can carry a
/// [`KvError`], so store failures and caller failures share one result
/// channel.
pub trait KvStore: Send + Sync {
    type ReadTx<'a>: ReadTx;
    type WriteTx<'a>: WriteTx;

    /// Run `f` against a read-only transaction.
    fn view<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Self::ReadTx<'_>) -> Result<T, E>,
        E: From<KvError>;

    /// Run `f` against a read-write transaction, rolling back every
    /// mutation if `f` fails.
    fn update<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut Self::WriteTx<'_>) -> Result<T, E>,
        E: From<KvError>;

    /// Close the store. Later transactions fail with [`KvError::Closed`].
    fn close(&self) -> KvResult<()>;
}
