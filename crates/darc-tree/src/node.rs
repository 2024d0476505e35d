use std::collections::BTreeMap;

use darc_types::ObjectId;

/// Stable index of an entry in a tree's arena.
///
/// Ids stay valid until the entry is deleted; the slot may then be reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

/// Read-only view of a resolved entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Entry {
    Directory {
        id: NodeId,
        name: String,
        /// `None` until the directory is first committed.
        hash: Option<ObjectId>,
    },
    File {
        id: NodeId,
        name: String,
        size: u64,
        hash: ObjectId,
    },
}

impl Entry {
    pub fn id(&self) -> NodeId {
        match self {
            Self::Directory { id, .. } | Self::File { id, .. } => *id,
        }
    }

    /// Last path segment; empty for the root.
    pub fn name(&self) -> &str {
        match self {
            Self::Directory { name, .. } | Self::File { name, .. } => name,
        }
    }

    pub fn hash(&self) -> Option<ObjectId> {
        match self {
            Self::Directory { hash, .. } => *hash,
            Self::File { hash, .. } => Some(*hash),
        }
    }

    pub fn is_directory(&self) -> bool {
        matches!(self, Self::Directory { .. })
    }

    pub fn is_file(&self) -> bool {
        matches!(self, Self::File { .. })
    }
}

#[derive(Debug)]
pub(crate) enum Node {
    Directory(DirState),
    File { size: u64, hash: ObjectId },
}

/// A directory is either known only by hash, or has its children in memory.
#[derive(Debug)]
pub(crate) enum DirState {
    Unloaded {
        hash: ObjectId,
    },
    Loaded {
        entries: BTreeMap<String, NodeId>,
        hash: Option<ObjectId>,
        modified: bool,
    },
}

impl DirState {
    /// A new, never-committed, empty directory.
    pub(crate) fn empty() -> Self {
        Self::Loaded {
            entries: BTreeMap::new(),
            hash: None,
            modified: true,
        }
    }

    pub(crate) fn hash(&self) -> Option<ObjectId> {
        match self {
            Self::Unloaded { hash } => Some(*hash),
            Self::Loaded { hash, .. } => *hash,
        }
    }

    pub(crate) fn is_modified(&self) -> bool {
        matches!(self, Self::Loaded { modified: true, .. })
    }
}
