use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use darc_types::ObjectId;

use crate::error::StoreResult;
use crate::traits::{BlobStore, RawObject};

/// In-memory, HashMap-based blob store.
///
/// Intended for tests and embedding. Encoded objects are held behind a
/// `RwLock`. The store counts `open` and `store_encoded` calls so callers
/// can assert how much I/O an operation caused.
pub struct InMemoryBlobStore {
    objects: RwLock<HashMap<ObjectId, Vec<u8>>>,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl InMemoryBlobStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
            reads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
        }
    }

    /// Number of objects currently stored.
    pub fn len(&self) -> usize {
        self.objects.read().expect("lock poisoned").len()
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.objects.read().expect("lock poisoned").is_empty()
    }

    /// Number of `open` calls since creation or the last reset.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Number of `store_encoded` calls since creation or the last reset.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn reset_counters(&self) {
        self.reads.store(0, Ordering::SeqCst);
        self.writes.store(0, Ordering::SeqCst);
    }

    /// Raw encoded bytes of an object, bypassing the counters.
    pub fn raw(&self, id: &ObjectId) -> Option<Vec<u8>> {
        self.objects.read().expect("lock poisoned").get(id).cloned()
    }

    /// Place arbitrary bytes under `id`, replacing anything there.
    ///
    /// Bypasses the counters and the immutability rule; meant for
    /// simulating damaged storage.
    pub fn put_raw(&self, id: ObjectId, bytes: Vec<u8>) {
        self.objects.write().expect("lock poisoned").insert(id, bytes);
    }

    /// Return a sorted list of all object ids in the store.
    pub fn all_ids(&self) -> Vec<ObjectId> {
        let map = self.objects.read().expect("lock poisoned");
        let mut ids: Vec<ObjectId> = map.keys().copied().collect();
        ids.sort();
        ids
    }
}

impl Default for InMemoryBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BlobStore for InMemoryBlobStore {
    fn open(&self, id: &ObjectId) -> StoreResult<Option<RawObject>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let map = self.objects.read().expect("lock poisoned");
        Ok(map
            .get(id)
            .map(|bytes| Box::new(Cursor::new(bytes.clone())) as RawObject))
    }

    fn exists(&self, id: &ObjectId) -> StoreResult<bool> {
        let map = self.objects.read().expect("lock poisoned");
        Ok(map.contains_key(id))
    }

    fn store_encoded(&self, id: &ObjectId, encoded: &mut dyn Read) -> StoreResult<ObjectId> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut bytes = Vec::new();
        encoded.read_to_end(&mut bytes)?;
        let mut map = self.objects.write().expect("lock poisoned");
        // Idempotent: the first bytes stored under an id win.
        map.entry(*id).or_insert(bytes);
        Ok(*id)
    }
}

impl std::fmt::Debug for InMemoryBlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryBlobStore")
            .field("object_count", &self.len())
            .field("reads", &self.reads())
            .field("writes", &self.writes())
            .finish()
    }
}
