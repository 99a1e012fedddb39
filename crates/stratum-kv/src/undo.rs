//! Undo log recording the prior state of everything an update touches.
//!
//! Entries are appended in mutation order and replayed newest-first on
//! abort, so a key written several times in one transaction ends at its
//! pre-transaction state rather than at an intermediate value.

use std::collections::{BTreeMap, HashMap};

/// Key state inside a bucket: `None` is a tombstone.
pub(crate) type Entries = BTreeMap<Vec<u8>, Option<Vec<u8>>>;
/// All buckets by name.
pub(crate) type Buckets = HashMap<Vec<u8>, Entries>;

#[derive(Debug)]
enum UndoEntry {
    /// A key was written; `prior` is `None` if the key was physically absent.
    Key {
        bucket: Vec<u8>,
        key: Vec<u8>,
        prior: Option<Option<Vec<u8>>>,
    },
    /// A bucket was created.
    Bucket(Vec<u8>),
}

/// Ordered log of prior values for one update transaction.
#[derive(Debug, Default)]
pub(crate) struct UndoLog {
    entries: Vec<UndoEntry>,
}

impl UndoLog {
    pub(crate) fn record_key(
        &mut self,
        bucket: &[u8],
        key: &[u8],
        prior: Option<Option<Vec<u8>>>,
    ) {
        self.entries.push(UndoEntry::Key {
            bucket: bucket.to_vec(),
            key: key.to_vec(),
            prior,
        });
    }

    pub(crate) fn record_bucket(&mut self, bucket: &[u8]) {
        self.entries.push(UndoEntry::Bucket(bucket.to_vec()));
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Restore every touched key and bucket, newest entry first.
    pub(crate) fn rollback(self, buckets: &mut Buckets) {
        for entry in self.entries.into_iter().rev() {
            match entry {
                UndoEntry::Key { bucket, key, prior } => {
                    let Some(entries) = buckets.get_mut(&bucket) else {
                        continue;
                    };
                    match prior {
                        Some(value) => {
                            entries.insert(key, value);
                        }
                        None => {
                            entries.remove(&key);
                        }
                    }
                }
                UndoEntry::Bucket(bucket) => {
                    buckets.remove(&bucket);
                }
            }
        }
    }
}
