//! Block lifecycle for Stratum.
//!
//! New content is written to scratch files through a [`WritableRef`], frozen
//! into an immutable block named by its content hash, and later pushed to
//! remote storage. Frozen blocks are read through [`FrozenRef`] whether they
//! are resident locally or fetched on demand.
//!
//! # Modules
//!
//! - [`writable`]: [`WriteableStore`], [`WritableRef`] and their local
//!   implementations
//! - [`reader`]: the [`Reader`] and [`FrozenRef`] traits and readers over
//!   local and remote blocks
//! - [`freezer`]: [`Freezer`] and [`LocalFreezer`]
//! - [`adapter`]: [`PinnedReader`], a `Reader` as `AsyncRead`
//! - [`error`]: [`BlocksError`] and [`BlocksResult`]

pub mod adapter;
pub mod error;
pub mod freezer;
pub mod reader;
pub mod writable;

pub use adapter::PinnedReader;
pub use error::{BlocksError, BlocksResult};
pub use freezer::{Freezer, LocalFreezer, NewBlock};
pub use reader::{FrozenRef, LocalFrozenRef, Reader, RemoteFrozenRef};
pub use writable::{LocalWritableRef, LocalWriteableStore, WritableRef, WriteableStore};
