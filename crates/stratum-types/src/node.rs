//! Locators and listing records for remote content.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::block::BlockId;

/// Where the bytes of a node live.
///
/// Exactly one variant is active. Resolvers dispatch with `match` and never
/// combine fields from different variants.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeRepr {
    /// A content-addressed block in the factory's own CAS namespace.
    Block(BlockId),
    /// An object in a cloud bucket.
    Object {
        bucket: String,
        key: String,
        /// Object generation; `0` means "whatever is current".
        generation: i64,
        size: u64,
    },
    /// A resource served over HTTP.
    Url {
        url: String,
        /// Entity tag the content must still carry; empty when unknown.
        etag: String,
        size: u64,
    },
}

impl NodeRepr {
    /// Locator of an object in a bucket at its current generation.
    pub fn object(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self::Object {
            bucket: bucket.into(),
            key: key.into(),
            generation: 0,
            size: 0,
        }
    }

    /// Locator of an HTTP resource.
    pub fn url(url: impl Into<String>, etag: impl Into<String>, size: u64) -> Self {
        Self::Url {
            url: url.into(),
            etag: etag.into(),
            size,
        }
    }

    /// The block id, if this is a CAS locator.
    pub fn block_id(&self) -> Option<&BlockId> {
        match self {
            Self::Block(bid) => Some(bid),
            _ => None,
        }
    }

    /// Short label of the active variant, for logs.
    pub fn variant_name(&self) -> &'static str {
        match self {
            Self::Block(_) => "block",
            Self::Object { .. } => "object",
            Self::Url { .. } => "url",
        }
    }
}

impl From<BlockId> for NodeRepr {
    fn from(bid: BlockId) -> Self {
        Self::Block(bid)
    }
}

/// One entry produced by a remote listing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFile {
    pub name: String,
    pub is_dir: bool,
    pub size: u64,
    pub mod_time: DateTime<Utc>,
    /// Locator that addresses this entry.
    pub locator: NodeRepr,
}

/// Object-storage attributes of a key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GcsAttrs {
    pub generation: i64,
    pub size: u64,
    pub mod_time: DateTime<Utc>,
    pub is_dir: bool,
}

impl GcsAttrs {
    /// Attributes of a synthesized directory.
    pub fn directory() -> Self {
        Self {
            generation: 0,
            size: 0,
            mod_time: DateTime::<Utc>::UNIX_EPOCH,
            is_dir: true,
        }
    }
}

/// HTTP resource attributes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpAttrs {
    pub etag: String,
    pub size: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_locator_exposes_id() {
        let bid = BlockId::of(b"data");
        let node = NodeRepr::from(bid);
        assert_eq!(node.block_id(), Some(&bid));
        assert_eq!(node.variant_name(), "block");
    }

    #[test]
    fn object_locator_has_no_block_id() {
        let node = NodeRepr::object("bucket", "dir/a.txt");
        assert!(node.block_id().is_none());
        match node {
            NodeRepr::Object {
                generation, size, ..
            } => {
                assert_eq!(generation, 0);
                assert_eq!(size, 0);
            }
            other => panic!("unexpected variant {other:?}"),
        }
    }

    #[test]
    fn locator_serde_keeps_variant() {
        let node = NodeRepr::url("http://example.test/a", "\"v1\"", 11);
        let json = serde_json::to_string(&node).unwrap();
        let parsed: NodeRepr = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, node);
        assert_eq!(parsed.variant_name(), "url");
    }

    #[test]
    fn directory_attrs() {
        let attrs = GcsAttrs::directory();
        assert!(attrs.is_dir);
        assert_eq!(attrs.size, 0);
    }
}
