//! In-memory key-value store for tests and ephemeral use.
//!
//! [`InMemoryKvStore`] keeps every bucket in a `BTreeMap` behind one
//! `RwLock`. Views share the read lock; an update holds the write lock for
//! its whole body, so updates are serialized and views never see a
//! half-applied update. Mutations are applied in place and undone from the
//! undo log if the body fails or panics.

use std::ops::Bound;
use std::panic::{self, AssertUnwindSafe};
use std::sync::RwLock;

use tracing::{debug, warn};

use crate::error::{KvError, KvResult};
use crate::traits::{KvStore, ReadBucket, ReadTx, WriteBucket, WriteTx};
use crate::undo::{Buckets, Entries, UndoLog};

#[derive(Debug, Default)]
struct State {
    buckets: Buckets,
    closed: bool,
}

/// An in-memory implementation of [`KvStore`].
///
/// Data is lost when the store is dropped.
pub struct InMemoryKvStore {
    state: RwLock<State>,
}

impl InMemoryKvStore {
    /// Create a store with the given buckets declared.
    pub fn new<I, N>(bucket_names: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: AsRef<[u8]>,
    {
        let buckets = bucket_names
            .into_iter()
            .map(|name| (name.as_ref().to_vec(), Entries::new()))
            .collect();
        Self {
            state: RwLock::new(State {
                buckets,
                closed: false,
            }),
        }
    }

    /// Number of keys physically held in `bucket`, tombstones included.
    pub fn raw_len(&self, bucket: &[u8]) -> KvResult<usize> {
        let state = self.state.read().map_err(|_| KvError::Poisoned)?;
        state
            .buckets
            .get(bucket)
            .map(|entries| entries.len())
            .ok_or_else(|| KvError::bucket_not_found(bucket))
    }
}

impl Default for InMemoryKvStore {
    fn default() -> Self {
        Self::new(Vec::<Vec<u8>>::new())
    }
}

impl std::fmt::Debug for InMemoryKvStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let bucket_count = self.state.read().map(|s| s.buckets.len()).unwrap_or(0);
        f.debug_struct("InMemoryKvStore")
            .field("bucket_count", &bucket_count)
            .finish()
    }
}

fn get_live(entries: &Entries, key: &[u8]) -> Option<Vec<u8>> {
    entries.get(key).cloned().flatten()
}

fn scan_prefix<E, F>(entries: &Entries, prefix: &[u8], mut f: F) -> Result<(), E>
where
    F: FnMut(&[u8], &[u8]) -> Result<(), E>,
{
    let range = entries.range::<[u8], _>((Bound::Included(prefix), Bound::Unbounded));
    for (key, value) in range {
        if !key.starts_with(prefix) {
            break;
        }
        if let Some(value) = value {
            f(key, value)?;
        }
    }
    Ok(())
}

/// Read handle on one bucket.
#[derive(Debug)]
pub struct MemBucket<'a> {
    entries: &'a Entries,
}

impl ReadBucket for MemBucket<'_> {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        get_live(self.entries, key)
    }

    fn for_each_with_prefix<E, F>(&self, prefix: &[u8], f: F) -> Result<(), E>
    where
        F: FnMut(&[u8], &[u8]) -> Result<(), E>,
    {
        scan_prefix(self.entries, prefix, f)
    }
}

/// Write handle on one bucket; every mutation is logged before it applies.
#[derive(Debug)]
pub struct MemBucketMut<'a> {
    name: Vec<u8>,
    entries: &'a mut Entries,
    undo: &'a mut UndoLog,
}

impl MemBucketMut<'_> {
    fn set(&mut self, key: &[u8], value: Option<Vec<u8>>) {
        let prior = self.entries.insert(key.to_vec(), value);
        self.undo.record_key(&self.name, key, prior);
    }
}

impl ReadBucket for MemBucketMut<'_> {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        get_live(self.entries, key)
    }

    fn for_each_with_prefix<E, F>(&self, prefix: &[u8], f: F) -> Result<(), E>
    where
        F: FnMut(&[u8], &[u8]) -> Result<(), E>,
    {
        scan_prefix(self.entries, prefix, f)
    }
}

impl WriteBucket for MemBucketMut<'_> {
    fn put(&mut self, key: &[u8], value: &[u8]) -> KvResult<()> {
        self.set(key, Some(value.to_vec()));
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> KvResult<()> {
        self.set(key, None);
        Ok(())
    }
}

/// Read-only transaction over the in-memory store.
#[derive(Debug)]
pub struct MemReadTx<'a> {
    buckets: &'a Buckets,
}

impl ReadTx for MemReadTx<'_> {
    type Bucket<'b>
        = MemBucket<'b>
    where
        Self: 'b;

    fn bucket(&self, name: &[u8]) -> KvResult<MemBucket<'_>> {
        self.buckets
            .get(name)
            .map(|entries| MemBucket { entries })
            .ok_or_else(|| KvError::bucket_not_found(name))
    }
}

/// Read-write transaction over the in-memory store.
#[derive(Debug)]
pub struct MemWriteTx<'a> {
    buckets: &'a mut Buckets,
    undo: UndoLog,
}

impl ReadTx for MemWriteTx<'_> {
    type Bucket<'b>
        = MemBucket<'b>
    where
        Self: 'b;

    fn bucket(&self, name: &[u8]) -> KvResult<MemBucket<'_>> {
        self.buckets
            .get(name)
            .map(|entries| MemBucket { entries })
            .ok_or_else(|| KvError::bucket_not_found(name))
    }
}

impl WriteTx for MemWriteTx<'_> {
    type BucketMut<'b>
        = MemBucketMut<'b>
    where
        Self: 'b;

    fn bucket_mut(&mut self, name: &[u8]) -> KvResult<MemBucketMut<'_>> {
        let entries = self
            .buckets
            .get_mut(name)
            .ok_or_else(|| KvError::bucket_not_found(name))?;
        Ok(MemBucketMut {
            name: name.to_vec(),
            entries,
            undo: &mut self.undo,
        })
    }

    fn create_bucket(&mut self, name: &[u8]) -> KvResult<()> {
        if self.buckets.contains_key(name) {
            return Err(KvError::BucketExists {
                name: String::from_utf8_lossy(name).into_owned(),
            });
        }
        self.buckets.insert(name.to_vec(), Entries::new());
        self.undo.record_bucket(name);
        Ok(())
    }
}

impl KvStore for InMemoryKvStore {
    type ReadTx<'a> = MemReadTx<'a>;
    type WriteTx<'a> = MemWriteTx<'a>;

    fn view<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Self::ReadTx<'_>) -> Result<T, E>,
        E: From<KvError>,
    {
        let state = self.state.read().map_err(|_| KvError::Poisoned)?;
        if state.closed {
            return Err(KvError::Closed.into());
        }
        let tx = MemReadTx {
            buckets: &state.buckets,
        };
        f(&tx)
    }

    fn update<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut Self::WriteTx<'_>) -> Result<T, E>,
        E: From<KvError>,
    {
        let mut state = self.state.write().map_err(|_| KvError::Poisoned)?;
        if state.closed {
            return Err(KvError::Closed.into());
        }
        let mut tx = MemWriteTx {
            buckets: &mut state.buckets,
            undo: UndoLog::default(),
        };
        // Catch a panicking body so the undo log is replayed while the lock
        // is still held, and the lock is released unpoisoned.
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| f(&mut tx)));
        match outcome {
            Ok(Ok(value)) => {
                debug!(mutations = tx.undo.len(), "kv update committed");
                Ok(value)
            }
            Ok(Err(err)) => {
                let MemWriteTx { buckets, undo } = tx;
                let mutations = undo.len();
                undo.rollback(buckets);
                warn!(mutations, "kv update failed; rolled back");
                Err(err)
            }
            Err(payload) => {
                let MemWriteTx { buckets, undo } = tx;
                let mutations = undo.len();
                undo.rollback(buckets);
                warn!(mutations, "kv update panicked; rolled back");
                drop(state);
                panic::resume_unwind(payload)
            }
        }
    }

    fn close(&self) -> KvResult<()> {
        let mut state = self.state.write().map_err(|_| KvError::Poisoned)?;
        state.closed = true;
        Ok(())
    }
}
