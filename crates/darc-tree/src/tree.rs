use std::collections::BTreeMap;
use std::sync::Arc;

use darc_store::BlobStore;
use darc_types::{ObjectId, ObjectKind};
use tracing::{debug, info};

use crate::error::{TreeError, TreeResult};
use crate::node::{DirState, Entry, Node, NodeId};
use crate::path::{join_path, split_path};
use crate::record::{decode_records, encode_records, TreeRecord};

/// An editable merkle tree of folders and files backed by a [`BlobStore`].
///
/// Nodes live in an arena indexed by [`NodeId`]. A directory reached from a
/// stored hash is materialized on first lookup; until then it costs one
/// arena slot and no I/O. The tree is not thread-safe; wrap it in a lock to
/// share it.
pub struct DarcTree {
    store: Arc<dyn BlobStore>,
    nodes: Vec<Option<Node>>,
    free: Vec<usize>,
    root: NodeId,
}

impl DarcTree {
    /// Start an empty tree. The root is dirty until the first commit.
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self::with_root(store, DirState::empty())
    }

    /// Open the tree whose root directory has hash `root`.
    ///
    /// Nothing is read until a lookup needs it, so a missing or damaged root
    /// object surfaces on first access.
    pub fn open(store: Arc<dyn BlobStore>, root: ObjectId) -> Self {
        Self::with_root(store, DirState::Unloaded { hash: root })
    }

    fn with_root(store: Arc<dyn BlobStore>, state: DirState) -> Self {
        Self {
            store,
            nodes: vec![Some(Node::Directory(state))],
            free: Vec::new(),
            root: NodeId(0),
        }
    }

    pub fn store(&self) -> &Arc<dyn BlobStore> {
        &self.store
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Hash of the root as of the last commit (or open).
    pub fn root_hash(&self) -> Option<ObjectId> {
        self.dir(self.root).ok().and_then(DirState::hash)
    }

    /// Whether any directory has changes not yet committed.
    pub fn is_dirty(&self) -> bool {
        self.nodes
            .iter()
            .flatten()
            .any(|node| matches!(node, Node::Directory(state) if state.is_modified()))
    }

    /// Whether `id` is a directory whose children are in memory.
    pub fn is_loaded(&self, id: NodeId) -> bool {
        matches!(
            self.nodes.get(id.0),
            Some(Some(Node::Directory(DirState::Loaded { .. })))
        )
    }

    // -----------------------------------------------------------------------
    // Lookup
    // -----------------------------------------------------------------------

    /// Resolve `path` from the root.
    ///
    /// Returns `Ok(None)` when some segment does not exist. Descending
    /// through a file is an error. Directories along the way are loaded.
    pub fn resolve_name(&mut self, path: &str) -> TreeResult<Option<Entry>> {
        let segments = split_path(path)?;
        let mut current = self.root;
        for (i, segment) in segments.iter().enumerate() {
            if matches!(self.node(current)?, Node::File { .. }) {
                return Err(TreeError::NotAFolder(join_path(&segments[..i])));
            }
            match self.lookup(current, segment)? {
                Some(child) => current = child,
                None => return Ok(None),
            }
        }
        let name = segments.last().copied().unwrap_or_default();
        self.entry(current, name).map(Some)
    }

    /// Look up `name` directly under `parent`, loading `parent` if needed.
    pub fn get_child(&mut self, parent: &Entry, name: &str) -> TreeResult<Option<Entry>> {
        match parent {
            Entry::File { name: file, .. } => Err(TreeError::NotAFolder(file.clone())),
            Entry::Directory { id, .. } => match self.lookup(*id, name)? {
                Some(child) => self.entry(child, name).map(Some),
                None => Ok(None),
            },
        }
    }

    /// Names of the entries in the folder at `path`, in ascending order.
    pub fn list(&mut self, path: &str) -> TreeResult<Vec<String>> {
        match self.resolve_name(path)? {
            Some(Entry::Directory { id, .. }) => Ok(self.entries(id)?.keys().cloned().collect()),
            Some(Entry::File { .. }) => Err(TreeError::NotAFolder(normalize(path))),
            None => Err(TreeError::NotFound(normalize(path))),
        }
    }

    // -----------------------------------------------------------------------
    // Mutation
    // -----------------------------------------------------------------------

    /// Place a file at `path`, creating missing parent folders.
    ///
    /// An existing file with the same name is replaced. Re-adding the same
    /// `(hash, size)` leaves the tree clean.
    pub fn add_file(&mut self, path: &str, hash: ObjectId, size: u64) -> TreeResult<()> {
        let segments = split_path(path)?;
        let Some((name, parents)) = segments.split_last() else {
            return Err(TreeError::RootProtected("replace"));
        };
        let parent = self
            .walk(parents, true)?
            .ok_or_else(|| TreeError::NotFound(join_path(parents)))?;

        if let Some(existing) = self.lookup(parent, name)? {
            match self.node(existing)? {
                Node::Directory(_) => return Err(TreeError::IsAFolder(join_path(&segments))),
                Node::File {
                    size: old_size,
                    hash: old_hash,
                } if *old_size == size && *old_hash == hash => return Ok(()),
                Node::File { .. } => {}
            }
        }

        let child = self.alloc(Node::File { size, hash });
        if let Some(old) = self.insert(parent, name, child)? {
            self.release(old);
        }
        Ok(())
    }

    /// Create the folder at `path` and any missing parents.
    ///
    /// An existing folder is left as is; an existing file anywhere on the
    /// path is an error.
    pub fn create_folder(&mut self, path: &str) -> TreeResult<()> {
        let segments = split_path(path)?;
        if segments.is_empty() {
            return Err(TreeError::RootProtected("create"));
        }
        self.walk(&segments, true)?;
        Ok(())
    }

    /// Remove the entry at `path` together with everything below it.
    pub fn delete(&mut self, path: &str) -> TreeResult<()> {
        let segments = split_path(path)?;
        let Some((name, parents)) = segments.split_last() else {
            return Err(TreeError::RootProtected("delete"));
        };
        let not_found = || TreeError::NotFound(join_path(&segments));
        let parent = self.walk(parents, false)?.ok_or_else(not_found)?;

        let (entries, modified) = self.entries_mut(parent)?;
        let removed = entries.remove(*name).ok_or_else(not_found)?;
        *modified = true;
        self.release(removed);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Commit
    // -----------------------------------------------------------------------

    /// Write every modified directory, children before parents, and return
    /// the new root hash.
    ///
    /// Unloaded subtrees are never visited. With nothing modified this
    /// performs no writes and returns the current root hash.
    pub fn commit_changes(&mut self) -> TreeResult<ObjectId> {
        let mut written = 0usize;
        let root = self.root;
        let hash = match self.commit_dir(root, "/", &mut written)? {
            Some(hash) => hash,
            None => self
                .dir(root)?
                .hash()
                .ok_or_else(|| TreeError::Uncommitted("/".into()))?,
        };
        info!(root = %hash, written, "committed tree");
        Ok(hash)
    }

    /// Returns the directory's new hash when it was rewritten.
    fn commit_dir(
        &mut self,
        id: NodeId,
        path: &str,
        written: &mut usize,
    ) -> TreeResult<Option<ObjectId>> {
        let children: Vec<(String, NodeId)> = match self.dir(id)? {
            DirState::Unloaded { .. } => return Ok(None),
            DirState::Loaded { entries, .. } => {
                entries.iter().map(|(name, child)| (name.clone(), *child)).collect()
            }
        };

        for (name, child) in &children {
            let Node::Directory(state) = self.node(*child)? else {
                continue;
            };
            let prior = state.hash();
            let Some(hash) = self.commit_dir(*child, &child_path(path, name), written)? else {
                continue;
            };
            // Mark before touching the next sibling: a later failure must not
            // leave this child clean under a parent that still names its old hash.
            if prior != Some(hash) {
                if let DirState::Loaded { modified, .. } = self.dir_mut(id)? {
                    *modified = true;
                }
            }
        }

        match self.dir(id)? {
            DirState::Loaded { modified: true, .. } => {}
            _ => return Ok(None),
        }

        let mut records = Vec::with_capacity(children.len());
        for (name, child) in children {
            records.push(match self.node(child)? {
                Node::File { size, hash } => TreeRecord::File {
                    name,
                    size: *size,
                    hash: *hash,
                },
                Node::Directory(state) => {
                    let hash = state
                        .hash()
                        .ok_or_else(|| TreeError::Uncommitted(child_path(path, &name)))?;
                    TreeRecord::Directory { name, hash }
                }
            });
        }
        let payload = encode_records(records).map_err(|source| TreeError::Encode {
            path: path.to_string(),
            source,
        })?;
        let hash = self.store.write_object(ObjectKind::Tree, &payload)?;
        *written += 1;

        if let DirState::Loaded {
            hash: current,
            modified,
            ..
        } = self.dir_mut(id)?
        {
            *current = Some(hash);
            *modified = false;
        }
        debug!(path, tree = %hash.short_hex(), "wrote directory");
        Ok(Some(hash))
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    /// Follow `segments` from the root, creating missing folders when
    /// `create` is set. Returns `None` for a missing folder otherwise.
    fn walk(&mut self, segments: &[&str], create: bool) -> TreeResult<Option<NodeId>> {
        let mut current = self.root;
        for (i, segment) in segments.iter().enumerate() {
            current = match self.lookup(current, segment)? {
                Some(child) => {
                    if matches!(self.node(child)?, Node::File { .. }) {
                        return Err(TreeError::NotAFolder(join_path(&segments[..=i])));
                    }
                    child
                }
                None if create => {
                    let child = self.alloc(Node::Directory(DirState::empty()));
                    self.insert(current, segment, child)?;
                    child
                }
                None => return Ok(None),
            };
        }
        Ok(Some(current))
    }

    fn lookup(&mut self, dir: NodeId, name: &str) -> TreeResult<Option<NodeId>> {
        Ok(self.entries(dir)?.get(name).copied())
    }

    /// Insert into a directory and mark it modified. Returns the displaced id.
    fn insert(&mut self, dir: NodeId, name: &str, child: NodeId) -> TreeResult<Option<NodeId>> {
        let (entries, modified) = self.entries_mut(dir)?;
        *modified = true;
        Ok(entries.insert(name.to_string(), child))
    }

    fn entries(&mut self, dir: NodeId) -> TreeResult<&BTreeMap<String, NodeId>> {
        self.ensure_loaded(dir)?;
        match self.dir(dir)? {
            DirState::Loaded { entries, .. } => Ok(entries),
            DirState::Unloaded { .. } => Err(TreeError::StaleNode(dir)),
        }
    }

    fn entries_mut(
        &mut self,
        dir: NodeId,
    ) -> TreeResult<(&mut BTreeMap<String, NodeId>, &mut bool)> {
        self.ensure_loaded(dir)?;
        match self.dir_mut(dir)? {
            DirState::Loaded {
                entries, modified, ..
            } => Ok((entries, modified)),
            DirState::Unloaded { .. } => Err(TreeError::StaleNode(dir)),
        }
    }

    /// Materialize an unloaded directory from the store.
    fn ensure_loaded(&mut self, dir: NodeId) -> TreeResult<()> {
        let hash = match self.dir(dir)? {
            DirState::Unloaded { hash } => *hash,
            DirState::Loaded { .. } => return Ok(()),
        };
        let payload = self.store.read_object(ObjectKind::Tree, &hash)?;
        let records =
            decode_records(&payload).map_err(|source| TreeError::CorruptTree { id: hash, source })?;

        let mut entries = BTreeMap::new();
        for record in records {
            let (name, node) = match record {
                TreeRecord::Directory { name, hash } => {
                    (name, Node::Directory(DirState::Unloaded { hash }))
                }
                TreeRecord::File { name, size, hash } => (name, Node::File { size, hash }),
            };
            entries.insert(name, self.alloc(node));
        }
        debug!(tree = %hash.short_hex(), entries = entries.len(), "loaded directory");

        *self.dir_mut(dir)? = DirState::Loaded {
            entries,
            hash: Some(hash),
            modified: false,
        };
        Ok(())
    }

    fn entry(&self, id: NodeId, name: &str) -> TreeResult<Entry> {
        Ok(match self.node(id)? {
            Node::Directory(state) => Entry::Directory {
                id,
                name: name.to_string(),
                hash: state.hash(),
            },
            Node::File { size, hash } => Entry::File {
                id,
                name: name.to_string(),
                size: *size,
                hash: *hash,
            },
        })
    }

    fn node(&self, id: NodeId) -> TreeResult<&Node> {
        self.nodes
            .get(id.0)
            .and_then(Option::as_ref)
            .ok_or(TreeError::StaleNode(id))
    }

    fn dir(&self, id: NodeId) -> TreeResult<&DirState> {
        match self.node(id)? {
            Node::Directory(state) => Ok(state),
            Node::File { .. } => Err(TreeError::StaleNode(id)),
        }
    }

    fn dir_mut(&mut self, id: NodeId) -> TreeResult<&mut DirState> {
        match self.nodes.get_mut(id.0).and_then(Option::as_mut) {
            Some(Node::Directory(state)) => Ok(state),
            _ => Err(TreeError::StaleNode(id)),
        }
    }

    fn alloc(&mut self, node: Node) -> NodeId {
        match self.free.pop() {
            Some(slot) => {
                self.nodes[slot] = Some(node);
                NodeId(slot)
            }
            None => {
                self.nodes.push(Some(node));
                NodeId(self.nodes.len() - 1)
            }
        }
    }

    /// Free `id` and its loaded descendants.
    fn release(&mut self, id: NodeId) {
        let mut pending = vec![id];
        while let Some(id) = pending.pop() {
            match self.nodes.get_mut(id.0).and_then(Option::take) {
                Some(Node::Directory(DirState::Loaded { entries, .. })) => {
                    pending.extend(entries.into_values());
                }
                Some(_) => {}
                None => continue,
            }
            self.free.push(id.0);
        }
    }
}

impl std::fmt::Debug for DarcTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DarcTree")
            .field("root_hash", &self.root_hash())
            .field("live_nodes", &self.nodes.iter().flatten().count())
            .field("dirty", &self.is_dirty())
            .finish()
    }
}

fn child_path(parent: &str, name: &str) -> String {
    if parent == "/" {
        format!("/{name}")
    } else {
        format!("{parent}/{name}")
    }
}

fn normalize(path: &str) -> String {
    split_path(path)
        .map(|segments| join_path(&segments))
        .unwrap_or_else(|_| path.to_string())
}
