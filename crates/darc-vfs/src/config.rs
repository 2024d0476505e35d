use darc_types::ObjectId;
use serde::{Deserialize, Serialize};

use crate::error::{VfsError, VfsResult};

/// Mount options for a [`DarcFileSystem`](crate::DarcFileSystem).
///
/// ```toml
/// session = "import-2024"
/// root = "4b825dc642cb6eb9a060e54bf8d69288fbee4904"
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VfsConfig {
    /// Change session name. Present and non-empty means writable.
    pub session: Option<String>,
    /// Root directory hash to open. `None` mounts an empty tree.
    pub root: Option<ObjectId>,
}

impl VfsConfig {
    /// Read-only view of an existing tree.
    pub fn read_only(root: ObjectId) -> Self {
        Self {
            session: None,
            root: Some(root),
        }
    }

    /// Writable mount of a fresh, empty tree.
    pub fn session(name: impl Into<String>) -> Self {
        Self {
            session: Some(name.into()),
            root: None,
        }
    }

    pub fn with_root(mut self, root: ObjectId) -> Self {
        self.root = Some(root);
        self
    }

    pub fn is_writable(&self) -> bool {
        self.session.as_deref().is_some_and(|name| !name.is_empty())
    }

    /// Parse from TOML text.
    pub fn from_toml(text: &str) -> VfsResult<Self> {
        toml::from_str(text).map_err(|e| VfsError::Config(e.to_string()))
    }
}
