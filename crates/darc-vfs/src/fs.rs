use std::io::Read;
use std::sync::Arc;

use darc_codec::ObjectReader;
use darc_store::{BlobStore, RawObject};
use darc_tree::path::{join_path, split_path};
use darc_tree::{DarcTree, Entry, TreeError};
use darc_types::{ObjectId, ObjectKind};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::VfsConfig;
use crate::error::{VfsError, VfsResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    File,
    Folder,
}

/// A resolved path, valid for the generation it was resolved in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileObject {
    path: String,
    file_type: FileType,
    size: Option<u64>,
    hash: Option<ObjectId>,
    generation: u64,
}

impl FileObject {
    fn from_entry(path: String, entry: Entry, generation: u64) -> Self {
        let (file_type, size) = match &entry {
            Entry::Directory { .. } => (FileType::Folder, None),
            Entry::File { size, .. } => (FileType::File, Some(*size)),
        };
        Self {
            path,
            file_type,
            size,
            hash: entry.hash(),
            generation,
        }
    }

    /// Absolute, normalized path (`/` for the root).
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Last path segment; empty for the root.
    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or_default()
    }

    pub fn file_type(&self) -> FileType {
        self.file_type
    }

    pub fn is_file(&self) -> bool {
        self.file_type == FileType::File
    }

    pub fn is_folder(&self) -> bool {
        self.file_type == FileType::Folder
    }

    /// Content length; `None` for folders.
    pub fn size(&self) -> Option<u64> {
        self.size
    }

    /// Blob hash for files; last committed hash for folders.
    pub fn hash(&self) -> Option<ObjectId> {
        self.hash
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// A mounted digest archive.
pub struct DarcFileSystem {
    tree: DarcTree,
    session: Option<String>,
    generation: u64,
}

impl DarcFileSystem {
    /// Mount the tree named by `config.root`, or an empty tree.
    pub fn mount(store: Arc<dyn BlobStore>, config: VfsConfig) -> Self {
        let writable = config.is_writable();
        let tree = match config.root {
            Some(root) => DarcTree::open(store, root),
            None => DarcTree::new(store),
        };
        info!(
            root = %config.root.map(|r| r.to_hex()).unwrap_or_else(|| "(empty)".into()),
            session = config.session.as_deref().unwrap_or("-"),
            writable,
            "mounted archive"
        );
        Self {
            tree,
            session: config.session.filter(|_| writable),
            generation: 0,
        }
    }

    pub fn session(&self) -> Option<&str> {
        self.session.as_deref()
    }

    pub fn is_writable(&self) -> bool {
        self.session.is_some()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether `obj` was resolved after the latest mutation.
    pub fn is_current(&self, obj: &FileObject) -> bool {
        obj.generation == self.generation
    }

    /// Root hash as of the last commit, or the hash the mount was opened at.
    pub fn root_hash(&self) -> Option<ObjectId> {
        self.tree.root_hash()
    }

    pub fn is_dirty(&self) -> bool {
        self.tree.is_dirty()
    }

    fn store(&self) -> &Arc<dyn BlobStore> {
        self.tree.store()
    }

    // -----------------------------------------------------------------------
    // Lookup
    // -----------------------------------------------------------------------

    /// Resolve `path`. A missing entry is `Ok(None)`.
    pub fn resolve(&mut self, path: &str) -> VfsResult<Option<FileObject>> {
        let normalized = join_path(&split_path(path)?);
        let generation = self.generation;
        Ok(self
            .tree
            .resolve_name(&normalized)?
            .map(|entry| FileObject::from_entry(normalized, entry, generation)))
    }

    /// Bring `obj` up to date with the current generation.
    pub fn refresh(&mut self, obj: &FileObject) -> VfsResult<Option<FileObject>> {
        if self.is_current(obj) {
            return Ok(Some(obj.clone()));
        }
        debug!(
            path = obj.path(),
            from = obj.generation,
            to = self.generation,
            "re-resolving stale object"
        );
        self.resolve(&obj.path)
    }

    /// Sorted child names of a folder.
    pub fn children(&mut self, obj: &FileObject) -> VfsResult<Vec<String>> {
        if obj.is_file() {
            return Err(VfsError::NotAFolder(obj.path.clone()));
        }
        match self.tree.list(&obj.path) {
            Ok(names) => Ok(names),
            Err(TreeError::NotFound(path)) => Err(VfsError::NotFound(path)),
            Err(TreeError::NotAFolder(path)) => Err(VfsError::NotAFolder(path)),
            Err(e) => Err(e.into()),
        }
    }

    /// Verifying reader over a file's content.
    ///
    /// A stale `obj` is re-resolved first, so the reader always serves the
    /// content currently at its path.
    pub fn open(&mut self, obj: &FileObject) -> VfsResult<ObjectReader<RawObject>> {
        let current = self
            .refresh(obj)?
            .ok_or_else(|| VfsError::NotFound(obj.path.clone()))?;
        match (current.file_type, current.hash) {
            (FileType::File, Some(hash)) => {
                Ok(self.store().open_verified(ObjectKind::Blob, &hash)?)
            }
            _ => Err(VfsError::NotAFile(current.path)),
        }
    }

    /// Read a whole file, verifying its hash.
    pub fn read(&mut self, path: &str) -> VfsResult<Vec<u8>> {
        let obj = self
            .resolve(path)?
            .ok_or_else(|| VfsError::NotFound(path.to_string()))?;
        Ok(self.open(&obj)?.read_to_end_verified()?)
    }

    // -----------------------------------------------------------------------
    // Mutation
    // -----------------------------------------------------------------------

    /// Store `len` bytes from `reader` as a blob and place it at `path`.
    pub fn write_file(
        &mut self,
        path: &str,
        reader: &mut dyn Read,
        len: u64,
    ) -> VfsResult<FileObject> {
        self.ensure_writable()?;
        let segments = split_path(path)?;
        if segments.is_empty() {
            return Err(TreeError::RootProtected("replace").into());
        }
        let normalized = join_path(&segments);

        let hash = self.store().write_stream(ObjectKind::Blob, len, reader)?;
        self.tree.add_file(&normalized, hash, len)?;
        self.bump();
        debug!(path = %normalized, blob = %hash.short_hex(), size = len, "wrote file");

        self.resolve(&normalized)?
            .ok_or(VfsError::NotFound(normalized))
    }

    pub fn write_bytes(&mut self, path: &str, data: &[u8]) -> VfsResult<FileObject> {
        let mut reader = data;
        self.write_file(path, &mut reader, data.len() as u64)
    }

    pub fn create_folder(&mut self, path: &str) -> VfsResult<()> {
        self.ensure_writable()?;
        self.tree.create_folder(path)?;
        self.bump();
        Ok(())
    }

    pub fn delete(&mut self, path: &str) -> VfsResult<()> {
        self.ensure_writable()?;
        match self.tree.delete(path) {
            Ok(()) => {}
            Err(TreeError::NotFound(path)) => return Err(VfsError::NotFound(path)),
            Err(e) => return Err(e.into()),
        }
        self.bump();
        Ok(())
    }

    /// Persist pending changes and return the new root hash.
    ///
    /// The hash is the mount's only durable identity; the caller records it.
    pub fn commit(&mut self) -> VfsResult<ObjectId> {
        self.ensure_writable()?;
        let root = self.tree.commit_changes()?;
        info!(root = %root, session = self.session.as_deref().unwrap_or("-"), "session committed");
        Ok(root)
    }

    fn ensure_writable(&self) -> VfsResult<()> {
        if self.is_writable() {
            Ok(())
        } else {
            Err(VfsError::ReadOnly)
        }
    }

    fn bump(&mut self) {
        self.generation += 1;
    }
}

impl std::fmt::Debug for DarcFileSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DarcFileSystem")
            .field("session", &self.session)
            .field("generation", &self.generation)
            .field("tree", &self.tree)
            .finish()
    }
}
