use std::io::{Read, Seek, SeekFrom};

use darc_codec::{encode_bytes, encode_object, ObjectReader};
use darc_types::{ObjectId, ObjectKind};

use crate::error::{StoreError, StoreResult};

/// Encoded objects up to this size stay in memory while being staged.
const SCRATCH_SPOOL_LIMIT: usize = 1024 * 1024;

/// Boxed raw stream of an encoded (compressed) object.
pub type RawObject = Box<dyn Read + Send>;

/// Content-addressed blob store.
///
/// All implementations must satisfy these invariants:
/// - Objects are immutable once written. The same id always maps to the
///   same bytes.
/// - Storing an object that already exists is a successful no-op.
/// - Concurrent writers of the same id both succeed.
/// - The store never decodes objects on the write path; callers hand over
///   fully encoded bytes together with the digest they computed.
pub trait BlobStore: Send + Sync {
    /// Open the raw encoded bytes of an object.
    ///
    /// Returns `Ok(None)` if the object does not exist.
    fn open(&self, id: &ObjectId) -> StoreResult<Option<RawObject>>;

    /// Check whether an object exists in the store.
    fn exists(&self, id: &ObjectId) -> StoreResult<bool>;

    /// Persist an already encoded object under `id`.
    ///
    /// `encoded` yields the compressed envelope whose digest the caller
    /// computed as `id`. Returns `id` as the object's permanent identifier.
    fn store_encoded(&self, id: &ObjectId, encoded: &mut dyn Read) -> StoreResult<ObjectId>;

    /// Encode and store an in-memory payload.
    fn write_object(&self, kind: ObjectKind, data: &[u8]) -> StoreResult<ObjectId> {
        let (encoded, id) = encode_bytes(kind, data)?;
        self.store_encoded(&id, &mut encoded.as_slice())
    }

    /// Encode and store `length` bytes read from `payload`.
    ///
    /// The envelope is staged in a scratch buffer that spills to a temporary
    /// file for large objects, since the id is only known once the payload
    /// has been hashed.
    fn write_stream(
        &self,
        kind: ObjectKind,
        length: u64,
        payload: &mut dyn Read,
    ) -> StoreResult<ObjectId> {
        let mut scratch = tempfile::spooled_tempfile(SCRATCH_SPOOL_LIMIT);
        let id = encode_object(kind, length, payload, &mut scratch)?;
        scratch.seek(SeekFrom::Start(0))?;
        self.store_encoded(&id, &mut scratch)
    }

    /// Open a verifying reader over an object of the given kind.
    fn open_verified(&self, kind: ObjectKind, id: &ObjectId) -> StoreResult<ObjectReader<RawObject>> {
        let raw = self.open(id)?.ok_or(StoreError::NotFound(*id))?;
        Ok(ObjectReader::open(raw, kind, Some(*id))?)
    }

    /// Read and verify a whole object payload.
    fn read_object(&self, kind: ObjectKind, id: &ObjectId) -> StoreResult<Vec<u8>> {
        Ok(self.open_verified(kind, id)?.read_to_end_verified()?)
    }
}
