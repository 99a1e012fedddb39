//! The object-storage seam.
//!
//! [`ObjectClient`] is the narrow surface the bucket factory needs from a
//! cloud object store: stat, ranged reads, conditional writes and delimited
//! listing. Backend-specific failures are mapped onto [`RemoteError`] by the
//! implementation, so the factory never sees vendor error types.
//!
//! [`RemoteError`]: crate::error::RemoteError

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::error::RemoteResult;

/// Metadata of one stored object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectAttrs {
    pub key: String,
    pub size: u64,
    /// Monotonically increasing per write; never `0` for a stored object.
    pub generation: i64,
    pub updated: DateTime<Utc>,
}

/// Precondition attached to a write.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum WriteCondition {
    /// Unconditional overwrite.
    #[default]
    None,
    /// Fail if any object exists at the key.
    DoesNotExist,
    /// Fail unless the current generation equals this one.
    GenerationMatch(i64),
}

/// One element of a delimited listing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ListEntry {
    /// A common prefix ending in the delimiter.
    Prefix(String),
    /// An object directly under the listed prefix.
    Object(ObjectAttrs),
}

/// Minimal object-store client.
#[async_trait]
pub trait ObjectClient: Send + Sync {
    /// Attributes of `key`, or `NotFound`.
    async fn stat(&self, bucket: &str, key: &str) -> RemoteResult<ObjectAttrs>;

    /// Read `len` bytes at `offset`.
    ///
    /// With `generation` set, the read fails with `NotFound` unless that
    /// generation is still current.
    async fn read_range(
        &self,
        bucket: &str,
        key: &str,
        generation: Option<i64>,
        offset: u64,
        len: u64,
    ) -> RemoteResult<Bytes>;

    /// Store `data` at `key`, atomically replacing any previous object.
    ///
    /// A failed condition is reported as `PreconditionFailed`.
    async fn write(
        &self,
        bucket: &str,
        key: &str,
        data: Bytes,
        condition: WriteCondition,
    ) -> RemoteResult<ObjectAttrs>;

    /// List keys starting with `prefix`.
    ///
    /// Without a delimiter every matching object is returned. With one,
    /// keys whose remainder contains it are folded into a single
    /// [`ListEntry::Prefix`].
    async fn list(
        &self,
        bucket: &str,
        prefix: &str,
        delimiter: Option<char>,
    ) -> RemoteResult<Vec<ListEntry>>;
}

/// Read the whole current generation of `key`.
pub async fn read_object<C: ObjectClient + ?Sized>(
    client: &C,
    bucket: &str,
    key: &str,
) -> RemoteResult<(ObjectAttrs, Bytes)> {
    let attrs = client.stat(bucket, key).await?;
    let data = client
        .read_range(bucket, key, Some(attrs.generation), 0, attrs.size)
        .await?;
    Ok((attrs, data))
}
