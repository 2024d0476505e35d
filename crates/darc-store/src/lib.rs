//! Content-addressed blob storage for the digest archive.
//!
//! Objects are encoded envelopes (see `darc-codec`) keyed by the hex SHA-1
//! of their uncompressed form. On disk they live in a sharded layout
//! analogous to git's loose objects:
//!
//! ```text
//! <root>/<hash[0:2]>/<hash[2:]>
//! ```
//!
//! # Storage Backends
//!
//! All backends implement the [`BlobStore`] trait:
//!
//! - [`FsBlobStore`] -- on-disk store, safe for concurrent writers
//! - [`InMemoryBlobStore`] -- `HashMap`-based store for tests and embedding
//!
//! # Design Rules
//!
//! 1. Objects are immutable once written (content-addressing guarantees this).
//! 2. A write never fails just because another writer stored the same
//!    object first; it fails only if the target is occupied by something
//!    that is not a regular object.
//! 3. Reads verify the digest against the requested id.
//! 4. No cross-process locks; correctness rests on atomic no-clobber moves.
//! 5. All I/O errors are propagated, never silently ignored.

pub mod error;
pub mod fs;
pub mod memory;
pub mod path;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use fs::{FsBlobStore, FsStoreConfig};
pub use memory::InMemoryBlobStore;
pub use path::hash_to_path;
pub use traits::{BlobStore, RawObject};
