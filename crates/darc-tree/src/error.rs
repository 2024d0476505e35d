use darc_store::StoreError;
use darc_types::ObjectId;

use crate::node::NodeId;
use crate::record::RecordError;

/// Errors from tree traversal, mutation and commit.
///
/// A plain lookup miss is not an error: resolvers return `Ok(None)`.
/// The variants below are structurally invalid requests or damaged data.
#[derive(Debug, thiserror::Error)]
pub enum TreeError {
    /// The path contains a segment that can never name an entry.
    #[error("invalid path {path:?}: {reason}")]
    InvalidPath { path: String, reason: String },

    /// Attempted to descend through (or create a folder over) a file.
    #[error("not a folder: {0}")]
    NotAFolder(String),

    /// Attempted to put a file where a folder is.
    #[error("is a folder: {0}")]
    IsAFolder(String),

    /// Deletion target does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Mutations addressed at `/` itself.
    #[error("cannot {0} the root folder")]
    RootProtected(&'static str),

    /// A stored directory object has an invalid record list.
    #[error("corrupt tree object {id}: {source}")]
    CorruptTree { id: ObjectId, source: RecordError },

    /// A directory could not be encoded.
    #[error("cannot encode directory {path}: {source}")]
    Encode { path: String, source: RecordError },

    /// A child directory has no hash while its parent is being encoded.
    #[error("directory {0} has no hash")]
    Uncommitted(String),

    /// A node id that no longer refers to a live entry.
    #[error("stale node id {0:?}")]
    StaleNode(NodeId),

    /// Failure reading or writing the blob store.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl TreeError {
    /// Returns `true` if stored tree data failed integrity checks.
    pub fn is_corruption(&self) -> bool {
        match self {
            Self::CorruptTree { .. } => true,
            Self::Store(e) => e.is_corruption(),
            _ => false,
        }
    }
}

/// Result alias for tree operations.
pub type TreeResult<T> = Result<T, TreeError>;
