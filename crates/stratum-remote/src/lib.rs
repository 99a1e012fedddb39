//! Remote content access for Stratum.
//!
//! Blocks, roots and leases live in an object store; arbitrary objects and
//! HTTP resources can be read through the same [`RemoteRef`] interface. A
//! [`RemoteRefFactory`] resolves [`NodeRepr`](stratum_types::NodeRepr)
//! locators into refs and manages the shared namespaces.
//!
//! # Modules
//!
//! - [`traits`]: [`RemoteRef`] and [`RemoteRefFactory`]
//! - [`object_client`]: the [`ObjectClient`] seam to an object store
//! - [`memory`]: [`InMemoryObjectClient`]
//! - [`bucket`]: [`BucketRemoteFactory`], the factory over any object client
//! - [`http`]: [`HttpRemoteRef`] and [`HttpAttrClient`]
//! - [`listing`]: directory synthesis over flat key listings
//! - [`error`]: [`RemoteError`] and [`RemoteResult`]

pub mod bucket;
pub mod error;
pub mod http;
pub mod listing;
pub mod memory;
pub mod object_client;
pub mod traits;

pub use bucket::{BucketObjectRef, BucketRemoteFactory};
pub use error::{RemoteError, RemoteResult};
pub use http::{HttpAttrClient, HttpRemoteRef};
pub use memory::InMemoryObjectClient;
pub use object_client::{read_object, ListEntry, ObjectAttrs, ObjectClient, WriteCondition};
pub use traits::{check_range, RemoteRef, RemoteRefFactory};
