//! Foundation types for the digest archive (darc).
//!
//! Every other darc crate depends on `darc-types`.
//!
//! # Key Types
//!
//! - [`ObjectId`]: Content-addressed identifier (SHA-1 digest, git compatible)
//! - [`ObjectKind`]: Type tag carried in every object header

pub mod error;
pub mod kind;
pub mod object;

pub use error::TypeError;
pub use kind::ObjectKind;
pub use object::ObjectId;
