//! Object envelope codec for the digest archive.
//!
//! Every object, whether file content or a directory listing, is persisted
//! in the same git-compatible envelope:
//!
//! ```text
//! <ascii type> ' ' <ascii decimal length> NUL <payload bytes>
//! ```
//!
//! The whole envelope is zlib-deflated for storage. The object's identity is
//! the SHA-1 of the *uncompressed* envelope, so a `blob` object hashes to the
//! same name git would give it.
//!
//! - [`encode_object`] / [`encode_bytes`] stream a payload into the envelope
//!   and return the digest computed on the way through.
//! - [`ObjectReader`] inflates an envelope, parses the header eagerly and
//!   verifies the digest incrementally as the payload is consumed.

pub mod encode;
pub mod error;
pub mod header;
pub mod reader;

pub use encode::{encode_bytes, encode_object, hash_object};
pub use error::{CodecError, CodecResult};
pub use header::ObjectHeader;
pub use reader::ObjectReader;
