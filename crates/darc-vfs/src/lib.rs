//! Filesystem view over a digest archive tree.
//!
//! [`DarcFileSystem`] mounts a [`darc_tree::DarcTree`] on top of a blob store
//! and exposes path-based lookups as [`FileObject`]s. A mount is writable
//! only when [`VfsConfig::session`] names a change session; otherwise every
//! mutation fails with [`VfsError::ReadOnly`].
//!
//! File objects are plain snapshots. Each carries the mount generation it
//! was resolved in, and the mount bumps its generation on every mutation, so
//! an object from an earlier generation is re-resolved before its content is
//! read.

pub mod config;
pub mod error;
pub mod fs;

pub use config::VfsConfig;
pub use error::{VfsError, VfsResult};
pub use fs::{DarcFileSystem, FileObject, FileType};
