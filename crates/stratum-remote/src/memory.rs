use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::error::{RemoteError, RemoteResult};
use crate::listing::fold_delimited;
use crate::object_client::{ListEntry, ObjectAttrs, ObjectClient, WriteCondition};
use crate::traits::check_range;

#[derive(Clone, Debug)]
struct StoredObject {
    data: Bytes,
    generation: i64,
    updated: DateTime<Utc>,
}

impl StoredObject {
    fn attrs(&self, key: &str) -> ObjectAttrs {
        ObjectAttrs {
            key: key.to_string(),
            size: self.data.len() as u64,
            generation: self.generation,
            updated: self.updated,
        }
    }
}

#[derive(Debug, Default)]
struct State {
    objects: BTreeMap<(String, String), StoredObject>,
    last_generation: i64,
}

/// In-memory object storage.
///
/// Intended for tests and single-process use. Each instance is an
/// independent namespace; share it with `Arc` to give several factories the
/// same view. Objects are replaced atomically and every write takes a fresh
/// generation.
#[derive(Debug, Default)]
pub struct InMemoryObjectClient {
    state: RwLock<State>,
}

impl InMemoryObjectClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects across all buckets.
    pub fn len(&self) -> usize {
        self.state.read().map(|s| s.objects.len()).unwrap_or(0)
    }

    /// Returns `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` if `key` exists in `bucket`.
    pub fn contains(&self, bucket: &str, key: &str) -> bool {
        self.state
            .read()
            .map(|s| s.objects.contains_key(&(bucket.to_string(), key.to_string())))
            .unwrap_or(false)
    }

    /// Delete `key`, returning `true` if it existed.
    pub fn remove(&self, bucket: &str, key: &str) -> RemoteResult<bool> {
        let mut state = self.state.write().map_err(|_| RemoteError::Poisoned)?;
        Ok(state
            .objects
            .remove(&(bucket.to_string(), key.to_string()))
            .is_some())
    }

    fn lookup(&self, bucket: &str, key: &str) -> RemoteResult<StoredObject> {
        let state = self.state.read().map_err(|_| RemoteError::Poisoned)?;
        state
            .objects
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| RemoteError::not_found(format!("{bucket}/{key}")))
    }
}

#[async_trait]
impl ObjectClient for InMemoryObjectClient {
    async fn stat(&self, bucket: &str, key: &str) -> RemoteResult<ObjectAttrs> {
        Ok(self.lookup(bucket, key)?.attrs(key))
    }

    async fn read_range(
        &self,
        bucket: &str,
        key: &str,
        generation: Option<i64>,
        offset: u64,
        len: u64,
    ) -> RemoteResult<Bytes> {
        let object = self.lookup(bucket, key)?;
        if let Some(generation) = generation {
            if generation != object.generation {
                return Err(RemoteError::not_found(format!(
                    "{bucket}/{key}#{generation}"
                )));
            }
        }
        check_range(offset, len, object.data.len() as u64)?;
        // In bounds, so both fit in usize.
        let start = offset as usize;
        Ok(object.data.slice(start..start + len as usize))
    }

    async fn write(
        &self,
        bucket: &str,
        key: &str,
        data: Bytes,
        condition: WriteCondition,
    ) -> RemoteResult<ObjectAttrs> {
        let mut state = self.state.write().map_err(|_| RemoteError::Poisoned)?;
        let id = (bucket.to_string(), key.to_string());
        let current = state.objects.get(&id).map(|o| o.generation);
        let allowed = match condition {
            WriteCondition::None => true,
            WriteCondition::DoesNotExist => current.is_none(),
            WriteCondition::GenerationMatch(expected) => current == Some(expected),
        };
        if !allowed {
            return Err(RemoteError::PreconditionFailed {
                key: key.to_string(),
            });
        }

        state.last_generation += 1;
        let object = StoredObject {
            data,
            generation: state.last_generation,
            updated: Utc::now(),
        };
        let attrs = object.attrs(key);
        state.objects.insert(id, object);
        Ok(attrs)
    }

    async fn list(
        &self,
        bucket: &str,
        prefix: &str,
        delimiter: Option<char>,
    ) -> RemoteResult<Vec<ListEntry>> {
        let matching: Vec<ObjectAttrs> = {
            let state = self.state.read().map_err(|_| RemoteError::Poisoned)?;
            let start = (bucket.to_string(), prefix.to_string());
            state
                .objects
                .range(start..)
                .take_while(|((b, k), _)| b == bucket && k.starts_with(prefix))
                .map(|((_, k), o)| o.attrs(k))
                .collect()
        };
        Ok(match delimiter {
            Some(delimiter) => fold_delimited(prefix, matching, delimiter),
            None => matching.into_iter().map(ListEntry::Object).collect(),
        })
    }
}
