use std::path::PathBuf;

use darc_codec::CodecError;
use darc_types::ObjectId;

/// Errors from blob store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested object was not found.
    #[error("object not found: {0}")]
    NotFound(ObjectId),

    /// A hash string cannot be mapped to a storage path.
    #[error("invalid object hash {hash:?}: {reason}")]
    InvalidHash { hash: String, reason: String },

    /// The target path is occupied by something other than a regular object.
    #[error("corrupted or colliding blob {id} at {}", path.display())]
    Collision { id: ObjectId, path: PathBuf },

    /// Encoding or verification of the object envelope failed.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Returns `true` if the stored bytes failed integrity verification.
    pub fn is_corruption(&self) -> bool {
        matches!(self, Self::Codec(e) if e.is_corruption())
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
