use darc_codec::CodecError;
use darc_store::StoreError;
use darc_tree::TreeError;

#[derive(Debug, thiserror::Error)]
pub enum VfsError {
    /// The mount has no change session.
    #[error("filesystem is mounted read-only")]
    ReadOnly,

    #[error("not a file: {0}")]
    NotAFile(String),

    #[error("not a folder: {0}")]
    NotAFolder(String),

    #[error("no such file or folder: {0}")]
    NotFound(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("tree error: {0}")]
    Tree(#[from] TreeError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
}

impl VfsError {
    /// Returns `true` if stored data failed integrity checks.
    pub fn is_corruption(&self) -> bool {
        match self {
            Self::Tree(e) => e.is_corruption(),
            Self::Store(e) => e.is_corruption(),
            Self::Codec(e) => e.is_corruption(),
            _ => false,
        }
    }
}

pub type VfsResult<T> = Result<T, VfsError>;
