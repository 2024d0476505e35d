use std::io::{self, Read, Write};

use darc_types::{ObjectId, ObjectKind};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use sha1::{Digest, Sha1};

use crate::error::{CodecError, CodecResult};
use crate::header::ObjectHeader;

/// Compute an object's identity without compressing it.
pub fn hash_object(kind: ObjectKind, data: &[u8]) -> ObjectId {
    let mut hasher = Sha1::new();
    hasher.update(ObjectHeader::new(kind, data.len() as u64).encode());
    hasher.update(data);
    ObjectId::from_digest(hasher.finalize().into())
}

/// Stream `length` bytes from `payload` into a deflated envelope on `out`.
///
/// The digest is computed over the uncompressed header and payload as they
/// pass through. `payload` must yield exactly `length` bytes.
pub fn encode_object<R: Read, W: Write>(
    kind: ObjectKind,
    length: u64,
    mut payload: R,
    out: W,
) -> CodecResult<ObjectId> {
    let encoder = ZlibEncoder::new(out, Compression::default());
    let mut writer = HashingWriter::new(encoder);

    writer.write_all(&ObjectHeader::new(kind, length).encode())?;
    let copied = io::copy(&mut (&mut payload).take(length), &mut writer)?;
    if copied != length {
        return Err(CodecError::LengthMismatch {
            declared: length,
            actual: copied,
        });
    }
    let mut probe = [0u8; 1];
    if payload.read(&mut probe)? != 0 {
        return Err(CodecError::LengthMismatch {
            declared: length,
            actual: length + 1,
        });
    }

    let (encoder, id) = writer.finish();
    encoder.finish()?;
    Ok(id)
}

/// Encode an in-memory payload. Returns the compressed envelope and its id.
pub fn encode_bytes(kind: ObjectKind, data: &[u8]) -> CodecResult<(Vec<u8>, ObjectId)> {
    let mut out = Vec::new();
    let id = encode_object(kind, data.len() as u64, data, &mut out)?;
    Ok((out, id))
}

/// Writer adapter that hashes everything written through it.
struct HashingWriter<W> {
    inner: W,
    hasher: Sha1,
}

impl<W: Write> HashingWriter<W> {
    fn new(inner: W) -> Self {
        Self {
            inner,
            hasher: Sha1::new(),
        }
    }

    fn finish(self) -> (W, ObjectId) {
        (self.inner, ObjectId::from_digest(self.hasher.finalize().into()))
    }
}

impl<W: Write> Write for HashingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
