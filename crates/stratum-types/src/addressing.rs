//! Mapping of block ids and named records onto remote object keys.
//!
//! A remote namespace is laid out under one base prefix:
//!
//! ```text
//! <base>CAS/<url-safe-base64(block id)>   content-addressed blocks
//! <base>root/<name>                        root pointers
//! <base>lease/<name>                       lease records
//! ```

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;

use crate::block::BlockId;
use crate::error::TypeError;

/// Segment appended to the base prefix for content-addressed blocks.
pub const CAS_SEGMENT: &str = "CAS/";
/// Segment appended to the base prefix for root records.
pub const ROOT_SEGMENT: &str = "root/";
/// Segment appended to the base prefix for lease records.
pub const LEASE_SEGMENT: &str = "lease/";

/// URL-safe base64 text of a block id.
pub fn encode_block_id(bid: &BlockId) -> String {
    URL_SAFE.encode(bid.as_bytes())
}

/// Parse the URL-safe base64 text of a block id.
pub fn decode_block_id(text: &[u8]) -> Result<BlockId, TypeError> {
    let bytes = URL_SAFE
        .decode(text)
        .map_err(|e| TypeError::InvalidBase64(e.to_string()))?;
    BlockId::from_slice(&bytes)
}

/// Canonical remote key of a block: `prefix + base64(bid)`.
pub fn canonical_key(prefix: &str, bid: &BlockId) -> String {
    let mut key = String::with_capacity(prefix.len() + 44);
    key.push_str(prefix);
    key.push_str(&encode_block_id(bid));
    key
}

/// The three key namespaces derived from one base prefix.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyLayout {
    cas_prefix: String,
    root_prefix: String,
    lease_prefix: String,
}

impl KeyLayout {
    /// Derive the layout from a base prefix, which must end in `/`.
    ///
    /// The empty prefix is accepted and places the namespaces at the top of
    /// the bucket.
    pub fn new(base: &str) -> Result<Self, TypeError> {
        if !base.is_empty() && !base.ends_with('/') {
            return Err(TypeError::InvalidPrefix {
                prefix: base.to_string(),
                reason: "prefix must end in '/'".into(),
            });
        }
        Ok(Self {
            cas_prefix: format!("{base}{CAS_SEGMENT}"),
            root_prefix: format!("{base}{ROOT_SEGMENT}"),
            lease_prefix: format!("{base}{LEASE_SEGMENT}"),
        })
    }

    pub fn cas_prefix(&self) -> &str {
        &self.cas_prefix
    }

    pub fn root_prefix(&self) -> &str {
        &self.root_prefix
    }

    pub fn lease_prefix(&self) -> &str {
        &self.lease_prefix
    }

    /// Key under which the block `bid` is stored.
    pub fn block_key(&self, bid: &BlockId) -> String {
        canonical_key(&self.cas_prefix, bid)
    }

    /// Key of the root record `name`.
    pub fn root_key(&self, name: &str) -> String {
        format!("{}{name}", self.root_prefix)
    }

    /// Key of the lease record `name`.
    pub fn lease_key(&self, name: &str) -> String {
        format!("{}{name}", self.lease_prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn canonical_key_is_prefix_plus_base64() {
        let bid = BlockId::from_hash([0xfb; 32]);
        let key = canonical_key("blocks/", &bid);
        assert!(key.starts_with("blocks/"));
        let encoded = &key["blocks/".len()..];
        assert_eq!(encoded.len(), 44);
        // URL-safe alphabet: no '+' or '/'.
        assert!(!encoded.contains('+'));
        assert!(!encoded.contains('/'));
    }

    #[test]
    fn layout_namespaces_are_disjoint() {
        let layout = KeyLayout::new("fs/").unwrap();
        assert_eq!(layout.cas_prefix(), "fs/CAS/");
        assert_eq!(layout.root_key("main"), "fs/root/main");
        assert_eq!(layout.lease_key("main"), "fs/lease/main");
        let block_key = layout.block_key(&BlockId::of(b"x"));
        assert!(block_key.starts_with("fs/CAS/"));
    }

    #[test]
    fn layout_rejects_prefix_without_slash() {
        let err = KeyLayout::new("fs").unwrap_err();
        assert!(matches!(err, TypeError::InvalidPrefix { .. }));
    }

    #[test]
    fn layout_accepts_empty_prefix() {
        let layout = KeyLayout::new("").unwrap();
        assert_eq!(layout.root_key("r"), "root/r");
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(matches!(
            decode_block_id(b"not base64!"),
            Err(TypeError::InvalidBase64(_))
        ));
        let short = URL_SAFE.encode([1u8; 4]);
        assert!(matches!(
            decode_block_id(short.as_bytes()),
            Err(TypeError::InvalidLength { .. })
        ));
    }

    proptest! {
        #[test]
        fn block_id_text_roundtrips(bytes in any::<[u8; 32]>()) {
            let bid = BlockId::from_hash(bytes);
            let text = encode_block_id(&bid);
            prop_assert_eq!(decode_block_id(text.as_bytes()).unwrap(), bid);
        }

        #[test]
        fn distinct_ids_get_distinct_keys(a in any::<[u8; 32]>(), b in any::<[u8; 32]>()) {
            prop_assume!(a != b);
            let ka = canonical_key("CAS/", &BlockId::from_hash(a));
            let kb = canonical_key("CAS/", &BlockId::from_hash(b));
            prop_assert_ne!(ka, kb);
        }
    }
}
