use async_trait::async_trait;
use chrono::{DateTime, Utc};
use stratum_types::{BlockId, Context, GcsAttrs, Lease, NodeRepr, RemoteFile};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::{RemoteError, RemoteResult};

/// A handle on one piece of remote content with a known size.
///
/// Implementations must satisfy:
/// - `copy` writes exactly `len` bytes or fails; a short transfer is an
///   error, never a silent truncation.
/// - A range that does not fit inside `size()` is rejected before any I/O.
#[async_trait]
pub trait RemoteRef: Send + Sync {
    /// Total size of the content in bytes.
    fn size(&self) -> u64;

    /// Copy `len` bytes starting at `offset` into `sink`.
    async fn copy(
        &self,
        ctx: &Context,
        offset: u64,
        len: u64,
        sink: &mut (dyn AsyncWrite + Unpin + Send),
    ) -> RemoteResult<()>;

    /// The locator this ref was resolved from.
    fn locator(&self) -> NodeRepr;
}

/// Resolves locators and manages the shared remote namespaces.
///
/// Blocks live under `<prefix>CAS/`, roots under `<prefix>root/` and leases
/// under `<prefix>lease/`. Factories built over the same bucket and prefix
/// share all three namespaces.
#[async_trait]
pub trait RemoteRefFactory: Send + Sync {
    /// Resolve a locator into a readable ref.
    async fn get_ref(&self, ctx: &Context, locator: &NodeRepr) -> RemoteResult<Box<dyn RemoteRef>>;

    /// Read `reader` to the end and store it as block `bid`.
    ///
    /// The content must hash to `bid`. Pushing content that is already
    /// stored is a no-op.
    async fn push(
        &self,
        ctx: &Context,
        bid: &BlockId,
        reader: &mut (dyn AsyncRead + Unpin + Send),
    ) -> RemoteResult<()>;

    /// Overwrite the lease `name`.
    async fn set_lease(
        &self,
        ctx: &Context,
        name: &str,
        expiry: DateTime<Utc>,
        bid: &BlockId,
    ) -> RemoteResult<()>;

    /// Read the lease `name`.
    async fn get_lease(&self, ctx: &Context, name: &str) -> RemoteResult<Lease>;

    /// Point root `name` at `bid`, last writer wins.
    async fn set_root(&self, ctx: &Context, name: &str, bid: &BlockId) -> RemoteResult<()>;

    /// Point root `name` at `bid` only if it currently holds `expected`
    /// (`None` meaning "unset").
    async fn set_root_if(
        &self,
        ctx: &Context,
        name: &str,
        expected: Option<&BlockId>,
        bid: &BlockId,
    ) -> RemoteResult<()>;

    /// Current value of root `name`.
    async fn get_root(&self, ctx: &Context, name: &str) -> RemoteResult<BlockId>;

    /// Immediate children of a directory-like locator.
    async fn get_child_nodes(&self, ctx: &Context, locator: &NodeRepr)
        -> RemoteResult<Vec<RemoteFile>>;

    /// Attributes of an object key. Keys that are empty or end in `/` are
    /// directories.
    async fn object_attrs(&self, ctx: &Context, bucket: &str, key: &str) -> RemoteResult<GcsAttrs>;
}

/// Reject `offset..offset + len` unless it lies inside `0..size`.
pub fn check_range(offset: u64, len: u64, size: u64) -> RemoteResult<()> {
    match offset.checked_add(len) {
        Some(end) if end <= size => Ok(()),
        _ => Err(RemoteError::Range { offset, len, size }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn range_edges() {
        assert!(check_range(0, 0, 0).is_ok());
        assert!(check_range(0, 10, 10).is_ok());
        assert!(check_range(10, 0, 10).is_ok());
        assert!(check_range(9, 2, 10).is_err());
        assert!(check_range(11, 0, 10).is_err());
    }

    #[test]
    fn overflowing_range_is_rejected() {
        let err = check_range(u64::MAX, 2, u64::MAX).unwrap_err();
        assert!(matches!(err, RemoteError::Range { .. }));
    }

    proptest! {
        #[test]
        fn range_accepted_iff_inside(offset in 0u64..1000, len in 0u64..1000, size in 0u64..1000) {
            prop_assert_eq!(check_range(offset, len, size).is_ok(), offset + len <= size);
        }
    }
}
