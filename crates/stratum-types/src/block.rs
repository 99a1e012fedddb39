use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::addressing::{decode_block_id, encode_block_id};
use crate::error::TypeError;

/// Length of a [`BlockId`] in bytes.
pub const BLOCK_ID_LEN: usize = 32;

/// Identity of one immutable block: the BLAKE3 hash of its bytes.
///
/// The textual form (`Display`/`FromStr`) is URL-safe padded base64, the
/// same text that names the block in remote keys, root records and the
/// local frozen directory.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockId([u8; BLOCK_ID_LEN]);

impl BlockId {
    pub fn of(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    /// Wrap hash bytes computed elsewhere. No hashing is done.
    pub const fn from_hash(hash: [u8; BLOCK_ID_LEN]) -> Self {
        Self(hash)
    }

    /// The all-zero id, used to mean "no block". The empty block has a
    /// real hash and is not null.
    pub const fn null() -> Self {
        Self([0u8; BLOCK_ID_LEN])
    }

    pub fn is_null(&self) -> bool {
        self.0 == [0u8; BLOCK_ID_LEN]
    }

    pub fn as_bytes(&self) -> &[u8; BLOCK_ID_LEN] {
        &self.0
    }

    /// First four bytes in hex, for log fields.
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..4])
    }

    /// Accept exactly [`BLOCK_ID_LEN`] raw bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, TypeError> {
        let hash: [u8; BLOCK_ID_LEN] = bytes.try_into().map_err(|_| TypeError::InvalidLength {
            expected: BLOCK_ID_LEN,
            actual: bytes.len(),
        })?;
        Ok(Self(hash))
    }
}

impl fmt::Debug for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockId({})", self.short_hex())
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&encode_block_id(self))
    }
}

impl FromStr for BlockId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_block_id(s.as_bytes())
    }
}

impl From<[u8; BLOCK_ID_LEN]> for BlockId {
    fn from(hash: [u8; BLOCK_ID_LEN]) -> Self {
        Self(hash)
    }
}

/// Streaming form of [`BlockId::of`] for content read in chunks.
///
/// Also counts the bytes fed, so a freezer learns the block size from the
/// same pass.
#[derive(Clone, Default)]
pub struct BlockHasher {
    inner: blake3::Hasher,
    len: u64,
}

impl BlockHasher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, data: &[u8]) {
        self.inner.update(data);
        self.len += data.len() as u64;
    }

    /// Bytes fed so far.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The id of everything fed so far. The hasher can keep going.
    pub fn finalize(&self) -> BlockId {
        BlockId(*self.inner.finalize().as_bytes())
    }
}

impl fmt::Debug for BlockHasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockHasher").field("len", &self.len).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addressing::{canonical_key, KeyLayout};

    #[test]
    fn identical_content_shares_an_id() {
        let first = BlockId::of(b"block body");
        let copy = BlockId::of(&b"block body".to_vec());
        assert_eq!(first, copy);
        assert_ne!(first, BlockId::of(b"block body."));
    }

    #[test]
    fn empty_block_is_not_the_null_id() {
        assert!(BlockId::null().is_null());
        assert_eq!(BlockId::null().as_bytes(), &[0u8; BLOCK_ID_LEN]);
        let empty = BlockId::of(b"");
        assert!(!empty.is_null());
        assert_ne!(empty, BlockId::null());
    }

    #[test]
    fn from_slice_requires_exact_length() {
        assert_eq!(
            BlockId::from_slice(&[7; 31]).unwrap_err(),
            TypeError::InvalidLength {
                expected: 32,
                actual: 31
            }
        );
        assert_eq!(
            BlockId::from_slice(&[7; 33]).unwrap_err(),
            TypeError::InvalidLength {
                expected: 32,
                actual: 33
            }
        );
        assert_eq!(
            BlockId::from_slice(&[7; 32]).unwrap(),
            BlockId::from_hash([7; 32])
        );
    }

    #[test]
    fn display_is_the_canonical_key_suffix() {
        let bid = BlockId::of(b"hello world");
        let text = bid.to_string();
        assert_eq!(text.len(), 44);
        assert!(text.ends_with('='));
        assert_eq!(text, encode_block_id(&bid));
        assert_eq!(canonical_key("CAS/", &bid), format!("CAS/{bid}"));

        let layout = KeyLayout::new("fs/").unwrap();
        assert_eq!(layout.block_key(&bid), format!("fs/CAS/{bid}"));
    }

    #[test]
    fn parses_its_display_form() {
        let bid = BlockId::of(b"round trip through text");
        assert_eq!(bid.to_string().parse::<BlockId>().unwrap(), bid);
        assert!(matches!(
            "not base64!".parse::<BlockId>(),
            Err(TypeError::InvalidBase64(_))
        ));
        // Valid base64 of the wrong length.
        assert!(matches!(
            "AAAA".parse::<BlockId>(),
            Err(TypeError::InvalidLength { actual: 3, .. })
        ));
    }

    #[test]
    fn debug_uses_short_form() {
        let bid = BlockId::from_hash([0xab; 32]);
        assert_eq!(bid.short_hex(), "abababab");
        assert_eq!(format!("{bid:?}"), "BlockId(abababab)");
    }

    #[test]
    fn chunked_hashing_matches_whole_block() {
        let data: Vec<u8> = (0..10_000u32).map(|i| (i % 239) as u8).collect();
        let mut hasher = BlockHasher::new();
        assert!(hasher.is_empty());
        for chunk in data.chunks(777) {
            hasher.update(chunk);
        }
        assert_eq!(hasher.len(), data.len() as u64);
        assert_eq!(hasher.finalize(), BlockId::of(&data));
    }

    #[test]
    fn serde_keeps_raw_bytes() {
        let bid = BlockId::of(b"serialized");
        let json = serde_json::to_string(&bid).unwrap();
        assert_eq!(serde_json::from_str::<BlockId>(&json).unwrap(), bid);
        let encoded = bincode::serialize(&bid).unwrap();
        assert_eq!(encoded.len(), BLOCK_ID_LEN);
    }
}
