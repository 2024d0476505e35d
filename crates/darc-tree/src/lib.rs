//! Merkle directory tree for the digest archive.
//!
//! A tree is a graph of directories and files held in an arena owned by
//! [`DarcTree`]. Directories are identified by the hash of their serialized
//! record list (object type `seetree`); files are `(size, blob hash)` pairs.
//!
//! - Directories opened from a hash stay unloaded until a lookup needs their
//!   children; loading verifies the object digest.
//! - Mutations (`add_file`, `create_folder`, `delete`) only touch the
//!   in-memory maps and mark the affected directory modified.
//! - [`DarcTree::commit_changes`] walks the tree depth-first, re-encodes only
//!   modified directories and propagates changed hashes up to the root.
//!
//! The directory record format lives in [`record`].

pub mod error;
pub mod node;
pub mod path;
pub mod record;
pub mod tree;

pub use error::{TreeError, TreeResult};
pub use node::{Entry, NodeId};
pub use record::{decode_records, encode_records, RecordError, TreeRecord};
pub use tree::DarcTree;
