//! Foundation types for Stratum.
//!
//! Every other Stratum crate depends on `stratum-types`.
//!
//! # Key Types
//!
//! - [`BlockId`]: content hash (BLAKE3) identifying one immutable block
//! - [`NodeRepr`]: tagged locator for a CAS block, bucket object or HTTP URL
//! - [`RemoteFile`]: one entry of a remote listing
//! - [`KeyLayout`]: CAS, root, and lease key namespaces under a base prefix
//! - [`Lease`]: named time-bound claim on a block
//! - [`Context`]: cancellation token and deadline for blocking calls
//! - [`ErrorKind`]: error taxonomy shared by all crates

pub mod addressing;
pub mod block;
pub mod context;
pub mod error;
pub mod lease;
pub mod node;

pub use addressing::{canonical_key, decode_block_id, encode_block_id, KeyLayout};
pub use block::{BlockHasher, BlockId, BLOCK_ID_LEN};
pub use context::{CancelHandle, Context, Interrupted};
pub use error::{ErrorKind, TypeError};
pub use lease::Lease;
pub use node::{GcsAttrs, HttpAttrs, NodeRepr, RemoteFile};
